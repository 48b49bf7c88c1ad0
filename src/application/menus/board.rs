use crate::domain::{MenuError, Participant};
use crate::infra::channel::{
    Embed, InteractionChannel, MessageContent, MessageHandle, Symbol,
};

/// Who resolved an option: an explicit selector, the timeout fallback, or
/// an automatic assignment of the last remaining option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    Selector(Participant),
    Timeout,
    Auto,
}

impl Attribution {
    pub fn label(&self) -> String {
        match self {
            Self::Selector(p) => p.name.clone(),
            Self::Timeout => "timeout".to_string(),
            Self::Auto => "auto".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
enum SlotState {
    Open,
    Resolved {
        mark: Symbol,
        action: &'static str,
        by: Attribution,
    },
}

#[derive(Debug, Clone)]
struct Slot {
    symbol: Symbol,
    option: String,
    state: SlotState,
}

/// The shared mutable rendering behind every option menu: a symbol per
/// option plus its resolution state.
///
/// The board is owned by a single menu task. Resolving an option removes
/// its symbol from the remaining set in the same step that records the
/// resolution, so a reaction racing in for a just-resolved slot is no
/// longer in any allowed-symbol set and is rejected.
pub struct OptionsBoard {
    title: String,
    description: String,
    slots: Vec<Slot>,
    footer: Option<String>,
    handle: Option<MessageHandle>,
}

impl OptionsBoard {
    pub fn new(
        title: impl Into<String>,
        option_name: &str,
        options: &[String],
    ) -> Result<Self, MenuError> {
        if options.len() > Symbol::MAX_OPTIONS {
            return Err(MenuError::TooManyOptions {
                max: Symbol::MAX_OPTIONS,
                got: options.len(),
            });
        }
        let slots = options
            .iter()
            .enumerate()
            .map(|(idx, option)| Slot {
                symbol: Symbol::letter(idx).expect("option count checked above"),
                option: option.clone(),
                state: SlotState::Open,
            })
            .collect();
        Ok(Self {
            title: title.into(),
            description: format!("Click the corresponding reaction to select {option_name}."),
            slots,
            footer: None,
            handle: None,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn handle(&self) -> Option<MessageHandle> {
        self.handle
    }

    pub fn set_footer(&mut self, text: impl Into<String>) {
        self.footer = Some(text.into());
    }

    /// Symbols of the options still open, in board order.
    pub fn remaining(&self) -> Vec<Symbol> {
        self.slots
            .iter()
            .filter(|s| matches!(s.state, SlotState::Open))
            .map(|s| s.symbol)
            .collect()
    }

    pub fn remaining_len(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s.state, SlotState::Open))
            .count()
    }

    pub fn option_of(&self, symbol: Symbol) -> Result<&str, MenuError> {
        self.slots
            .iter()
            .find(|s| s.symbol == symbol)
            .map(|s| s.option.as_str())
            .ok_or(MenuError::UnknownSymbol(symbol.0))
    }

    /// Attribution recorded for `option`, if it has been resolved.
    pub fn attribution_of(&self, option: &str) -> Option<&Attribution> {
        self.slots.iter().find_map(|s| match &s.state {
            SlotState::Resolved { by, .. } if s.option == option => Some(by),
            _ => None,
        })
    }

    /// Marks `symbol`'s option as resolved and returns the option. A
    /// second resolution of the same slot is rejected.
    pub fn resolve(
        &mut self,
        symbol: Symbol,
        mark: Symbol,
        action: &'static str,
        by: Attribution,
    ) -> Result<String, MenuError> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.symbol == symbol)
            .ok_or(MenuError::UnknownSymbol(symbol.0))?;
        if !matches!(slot.state, SlotState::Open) {
            return Err(MenuError::OptionAlreadyResolved(slot.option.clone()));
        }
        slot.state = SlotState::Resolved { mark, action, by };
        Ok(slot.option.clone())
    }

    fn content(&self) -> MessageContent {
        let lines: Vec<String> = self
            .slots
            .iter()
            .map(|slot| match &slot.state {
                SlotState::Open => format!("{} {}", slot.symbol, slot.option),
                SlotState::Resolved { mark, action, by } => {
                    format!("{} ~~{}~~ *{}ed by {}*", mark, slot.option, action, by.label())
                }
            })
            .collect();
        let mut embed =
            Embed::new(self.title.clone(), self.description.clone()).field("Options", lines.join("\n"));
        if let Some(footer) = &self.footer {
            embed = embed.footer(footer.clone());
        }
        MessageContent::embed(embed)
    }

    /// Posts the board, optionally with an intro line above the embed.
    pub async fn post(
        &mut self,
        channel: &dyn InteractionChannel,
        intro: Option<String>,
    ) -> Result<MessageHandle, MenuError> {
        let mut content = self.content();
        content.text = intro;
        let handle = channel.post_message(content).await?;
        self.handle = Some(handle);
        Ok(handle)
    }

    /// Re-renders the board into the posted message. A failed edit falls
    /// back to posting the plain-text rendering; board state is unaffected.
    pub async fn sync(&self, channel: &dyn InteractionChannel) {
        let Some(handle) = self.handle else {
            return;
        };
        let content = self.content();
        if let Err(err) = channel.edit_message(handle, content.clone()).await {
            log::warn!("board edit failed, posting plain text instead: {err}");
            let _ = channel
                .post_message(MessageContent::text(content.plain_fallback()))
                .await;
        }
    }

    /// Replaces the board message with a final result rendering.
    pub async fn finish(&self, channel: &dyn InteractionChannel, content: MessageContent) {
        match self.handle {
            Some(handle) => {
                if let Err(err) = channel.edit_message(handle, content.clone()).await {
                    log::warn!("result edit failed, posting plain text instead: {err}");
                    let _ = channel
                        .post_message(MessageContent::text(content.plain_fallback()))
                        .await;
                }
            }
            None => {
                let _ = channel.post_message(content).await;
            }
        }
    }
}

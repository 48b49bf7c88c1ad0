use std::time::Duration;

use super::board::{Attribution, OptionsBoard};
use crate::domain::{MenuError, Participant};
use crate::infra::channel::{InteractionChannel, MessageContent, Symbol};

/// Menu where a single selector picks one option.
///
/// A timeout resolves to `None`; the caller decides the default (typically
/// the first option) and renders it with [`SingleSelectionMenu::finish`].
pub struct SingleSelectionMenu<'a> {
    channel: &'a dyn InteractionChannel,
    selector: Participant,
    option_name: String,
    board: OptionsBoard,
    timeout: Duration,
}

impl<'a> SingleSelectionMenu<'a> {
    pub fn new(
        channel: &'a dyn InteractionChannel,
        selector: Participant,
        title: impl Into<String>,
        option_name: impl Into<String>,
        options: &[String],
        timeout: Duration,
    ) -> Result<Self, MenuError> {
        if options.len() < 2 {
            return Err(MenuError::NotEnoughOptions {
                min: 2,
                got: options.len(),
            });
        }
        let option_name = option_name.into();
        let mut board = OptionsBoard::new(title, &option_name, options)?;
        board.set_footer(format!(
            "Only {} may select {}.",
            selector.name, option_name
        ));
        Ok(Self {
            channel,
            selector,
            option_name,
            board,
            timeout,
        })
    }

    pub async fn run(&mut self) -> Result<Option<String>, MenuError> {
        let handle = self.board.post(self.channel, None).await?;
        let reaction = self
            .channel
            .await_reaction(
                handle,
                std::slice::from_ref(&self.selector),
                &self.board.remaining(),
                self.timeout,
            )
            .await?;
        match reaction {
            Some(reaction) => {
                let option = self.board.resolve(
                    reaction.symbol,
                    Symbol::TICK,
                    "pick",
                    Attribution::Selector(reaction.participant),
                )?;
                self.finish(&option).await;
                Ok(Some(option))
            }
            None => Ok(None),
        }
    }

    /// Replaces the menu with the final selection text.
    pub async fn finish(&self, selection: &str) {
        self.board
            .finish(
                self.channel,
                MessageContent::text(format!(
                    "**{}** has been selected as {}.",
                    selection, self.option_name
                )),
            )
            .await;
    }
}

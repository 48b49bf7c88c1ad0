//! Interaction channel contract.
//!
//! The core never talks to a chat platform directly. Everything it needs —
//! posting and editing messages, collecting timed reactions, role changes,
//! channel lifecycle — goes through these traits, so the same state machine
//! drives a real transport or the in-memory one used in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{ChannelError, Participant};

/// Opaque reference to a posted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(Uuid);

impl MessageHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier of a channel; also the identifier of the session
/// hosted in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A reaction symbol. Option menus use the letter symbols; confirmation
/// and board marks use the fixed ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(pub char);

impl Symbol {
    pub const TICK: Symbol = Symbol('\u{2705}');
    pub const CROSS: Symbol = Symbol('\u{274E}');
    pub const VETOED: Symbol = Symbol('\u{26D4}');
    pub const BLUE: Symbol = Symbol('\u{1F537}');
    pub const ORANGE: Symbol = Symbol('\u{1F536}');

    /// Letter symbols only go up to T, the platform cap on reactions per
    /// message.
    pub const MAX_OPTIONS: usize = 20;

    /// The letter symbol for option `idx` (0 = A).
    pub fn letter(idx: usize) -> Option<Symbol> {
        if idx >= Self::MAX_OPTIONS {
            return None;
        }
        char::from_u32(0x1F1E6 + idx as u32).map(Symbol)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One field of an embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

/// Minimal embed model: title, description, fields, footer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
}

impl Embed {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            fields: Vec::new(),
            footer: None,
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(text.into());
        self
    }
}

/// Message body: plain text, an embed, or both (text above the embed).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageContent {
    pub text: Option<String>,
    pub embed: Option<Embed>,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            embed: None,
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            text: None,
            embed: Some(embed),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Plain-text rendering, used when embed delivery fails.
    pub fn plain_fallback(&self) -> String {
        let mut out = String::new();
        if let Some(text) = &self.text {
            out.push_str(text);
        }
        if let Some(embed) = &self.embed {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&embed.title);
            if !embed.description.is_empty() {
                out.push('\n');
                out.push_str(&embed.description);
            }
            for field in &embed.fields {
                out.push('\n');
                out.push_str(&field.name);
                out.push('\n');
                out.push_str(&field.value);
            }
            if let Some(footer) = &embed.footer {
                out.push('\n');
                out.push_str(footer);
            }
        }
        out
    }
}

/// A reaction received from an eligible participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub participant: Participant,
    pub symbol: Symbol,
}

/// A text reply received from an eligible participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextReply {
    pub participant: Participant,
    pub text: String,
}

/// Transport for one channel.
///
/// `await_reaction` is the single decision point for a pick-or-timeout
/// turn: it resolves exactly once, either with the first reaction matching
/// the participant and symbol filters or with `None` once the timeout
/// elapses, and later input for that turn is simply never observed.
#[async_trait]
pub trait InteractionChannel: Send + Sync {
    fn id(&self) -> ChannelId;

    async fn post_message(&self, content: MessageContent) -> Result<MessageHandle, ChannelError>;

    async fn edit_message(
        &self,
        handle: MessageHandle,
        content: MessageContent,
    ) -> Result<(), ChannelError>;

    async fn await_reaction(
        &self,
        handle: MessageHandle,
        participants: &[Participant],
        symbols: &[Symbol],
        timeout: Duration,
    ) -> Result<Option<Reaction>, ChannelError>;

    /// Waits for a plain text reply from one of `participants`. Unused by
    /// the core flows (score reports arrive as commands) but part of the
    /// transport contract.
    async fn await_text_reply(
        &self,
        participants: &[Participant],
        timeout: Duration,
    ) -> Result<Option<TextReply>, ChannelError>;

    async fn grant_role(&self, participant: &Participant, role: &str)
    -> Result<(), ChannelError>;

    async fn revoke_role(
        &self,
        participant: &Participant,
        role: &str,
    ) -> Result<(), ChannelError>;
}

/// Creates and deletes the channels sessions live in.
#[async_trait]
pub trait ChannelFactory: Send + Sync {
    async fn create_channel(&self, name: &str)
    -> Result<Arc<dyn InteractionChannel>, ChannelError>;

    async fn delete_channel(&self, id: &ChannelId) -> Result<(), ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letter_symbols() {
        assert_eq!(Symbol::letter(0), Some(Symbol('\u{1F1E6}')));
        assert_eq!(Symbol::letter(19), Some(Symbol('\u{1F1F9}')));
        assert_eq!(Symbol::letter(20), None);
    }

    #[test]
    fn test_plain_fallback_renders_embed() {
        let content = MessageContent::embed(
            Embed::new("Ready Up", "Click the reaction below.")
                .field("Players", "a\nb")
                .footer("60 seconds"),
        );
        let flat = content.plain_fallback();
        assert!(flat.contains("Ready Up"));
        assert!(flat.contains("Players"));
        assert!(flat.contains("60 seconds"));
    }
}

use std::time::Duration;
use tokio::time::Instant;

use crate::domain::{MenuError, Participant};
use crate::infra::channel::{Embed, InteractionChannel, MessageContent, MessageHandle, Symbol};

/// Tick-to-confirm menu for a group of members against one deadline.
///
/// Used for ready checks: each eligible member confirms by reacting with
/// the tick; whoever has not confirmed when the deadline passes is
/// returned to the caller.
pub struct ConfirmationMenu<'a> {
    channel: &'a dyn InteractionChannel,
    members: Vec<Participant>,
    title: String,
    action: String,
    timeout: Duration,
}

impl<'a> ConfirmationMenu<'a> {
    pub fn new(
        channel: &'a dyn InteractionChannel,
        members: Vec<Participant>,
        title: impl Into<String>,
        action: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            channel,
            members,
            title: title.into(),
            action: action.into(),
            timeout,
        }
    }

    /// Runs the menu to completion. Returns the members who did not
    /// confirm in time (empty on a clean pass).
    pub async fn run(self) -> Result<Vec<Participant>, MenuError> {
        if self.members.is_empty() {
            return Ok(Vec::new());
        }
        let mut confirmed = vec![false; self.members.len()];
        let handle = self
            .channel
            .post_message(self.render(&confirmed))
            .await?;

        let deadline = Instant::now() + self.timeout;
        let mut remaining = self.members.clone();
        while !remaining.is_empty() {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            match self
                .channel
                .await_reaction(handle, &remaining, &[Symbol::TICK], left)
                .await?
            {
                Some(reaction) => {
                    remaining.retain(|m| *m != reaction.participant);
                    if let Some(idx) = self
                        .members
                        .iter()
                        .position(|m| *m == reaction.participant)
                    {
                        confirmed[idx] = true;
                    }
                    self.sync(handle, &confirmed).await;
                }
                None => break,
            }
        }
        Ok(remaining)
    }

    fn render(&self, confirmed: &[bool]) -> MessageContent {
        let lines: Vec<String> = self
            .members
            .iter()
            .zip(confirmed)
            .map(|(member, done)| {
                let mark = if *done { Symbol::TICK } else { Symbol::CROSS };
                format!("{} {}", mark, member.name)
            })
            .collect();
        MessageContent::embed(
            Embed::new(
                self.title.clone(),
                format!(
                    "Click the reaction below to {}. You have {} seconds.",
                    self.action,
                    self.timeout.as_secs()
                ),
            )
            .field("Players", lines.join("\n")),
        )
    }

    async fn sync(&self, handle: MessageHandle, confirmed: &[bool]) {
        let content = self.render(confirmed);
        if let Err(err) = self.channel.edit_message(handle, content.clone()).await {
            log::warn!("confirmation edit failed, posting plain text instead: {err}");
            let _ = self
                .channel
                .post_message(MessageContent::text(content.plain_fallback()))
                .await;
        }
    }
}

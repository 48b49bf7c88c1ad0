use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use super::board::OptionsBoard;
use crate::domain::{MenuError, Participant};
use crate::infra::channel::{InteractionChannel, MessageContent, Symbol};

/// Simultaneous poll: every voter gets one vote inside the window.
///
/// The option with the most votes wins; ties are broken uniformly at
/// random among the tied options, and a voteless poll falls back to a
/// uniform-random option.
pub struct PollMenu<'a> {
    channel: &'a dyn InteractionChannel,
    voters: Vec<Participant>,
    option_name: String,
    board: OptionsBoard,
    timeout: Duration,
}

impl<'a> PollMenu<'a> {
    pub fn new(
        channel: &'a dyn InteractionChannel,
        voters: Vec<Participant>,
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
        if voters.len() < 2 {
            return Err(MenuError::NotEnoughVoters {
                min: 2,
                got: voters.len(),
            });
        }
        let option_name = option_name.into();
        let board = OptionsBoard::new(title, &option_name, options)?;
        Ok(Self {
            channel,
            voters,
            option_name,
            board,
            timeout,
        })
    }

    pub async fn run(&mut self) -> Result<String, MenuError> {
        let handle = self.board.post(self.channel, None).await?;
        let symbols = self.board.remaining();
        let mut votes: HashMap<Symbol, usize> = symbols.iter().map(|s| (*s, 0)).collect();

        let deadline = Instant::now() + self.timeout;
        let mut pending = self.voters.clone();
        while !pending.is_empty() {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            match self
                .channel
                .await_reaction(handle, &pending, &symbols, left)
                .await?
            {
                Some(reaction) => {
                    pending.retain(|v| *v != reaction.participant);
                    *votes.entry(reaction.symbol).or_default() += 1;
                }
                None => break,
            }
        }

        let winner = {
            let top = votes.values().copied().max().unwrap_or(0);
            let tied: Vec<Symbol> = if top == 0 {
                symbols.clone()
            } else {
                symbols
                    .iter()
                    .copied()
                    .filter(|s| votes[s] == top)
                    .collect()
            };
            let mut rng = rand::thread_rng();
            *tied.choose(&mut rng).expect("poll has options")
        };
        let option = self.board.option_of(winner)?.to_string();
        self.board
            .finish(
                self.channel,
                MessageContent::text(format!(
                    "**{}** has been voted as {}.",
                    option, self.option_name
                )),
            )
            .await;
        Ok(option)
    }
}

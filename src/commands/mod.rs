//! Chat command surface.
//!
//! Parses the `pug ...` commands a user can type and dispatches them
//! against the registry, returning the reply text a bot would post back.
//! Rejections here are ordinary replies, never faults.

use std::sync::Arc;
use thiserror::Error;

use crate::application::registry::SessionRegistry;
use crate::domain::{Participant, RegistryError, Score, ScoreError, SessionError};
use crate::infra::channel::ChannelId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PugCommand {
    Start,
    Stop,
    Join,
    Leave,
    Kick { name: String },
    Submit { rounds_for: u32, rounds_against: u32 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("not a pug command")]
    NotACommand,

    #[error("unknown subcommand: {0}")]
    UnknownSubcommand(String),

    #[error("Scores must be positive.")]
    NegativeScore,

    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parses one line of chat into a command. A leading `!` prefix is
/// accepted for bots that use one.
pub fn parse(input: &str) -> Result<PugCommand, CommandError> {
    let mut words = input.split_whitespace();
    match words.next() {
        Some("pug") | Some("!pug") => {}
        _ => return Err(CommandError::NotACommand),
    }
    match words.next() {
        Some("start") => Ok(PugCommand::Start),
        Some("stop") => Ok(PugCommand::Stop),
        Some("join") => Ok(PugCommand::Join),
        Some("leave") => Ok(PugCommand::Leave),
        Some("kick") => {
            let name = words
                .next()
                .ok_or(CommandError::Usage("pug kick <player>"))?;
            Ok(PugCommand::Kick {
                name: name.trim_start_matches('@').to_string(),
            })
        }
        Some("submit") => {
            let rounds_for = parse_score(words.next())?;
            let rounds_against = parse_score(words.next())?;
            Ok(PugCommand::Submit {
                rounds_for,
                rounds_against,
            })
        }
        Some(other) => Err(CommandError::UnknownSubcommand(other.to_string())),
        None => Err(CommandError::Usage("pug <start|stop|join|leave|kick|submit>")),
    }
}

fn parse_score(word: Option<&str>) -> Result<u32, CommandError> {
    let word = word.ok_or(CommandError::Usage(
        "pug submit <your score> <their score>",
    ))?;
    if word.starts_with('-') {
        return Err(CommandError::NegativeScore);
    }
    word.parse().map_err(|_| {
        CommandError::Usage("pug submit <your score> <their score>")
    })
}

/// Resolves commands against sessions and turns domain rejections into
/// user-facing reply text.
pub struct CommandDispatcher {
    registry: Arc<SessionRegistry>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub async fn dispatch(
        &self,
        channel: &ChannelId,
        author: &Participant,
        command: PugCommand,
    ) -> String {
        match command {
            PugCommand::Start => match self.registry.start_session(author.clone()).await {
                Ok(session) => format!("PUG started in {}.", session.id()),
                Err(err) => format!("Could not start a PUG: {err}"),
            },
            PugCommand::Stop => match self.registry.end_session(channel).await {
                Ok(()) => "Done.".to_string(),
                Err(RegistryError::NoSession(_)) => no_pug(channel),
                Err(err) => format!("Could not stop the PUG: {err}"),
            },
            PugCommand::Join => {
                let Some(session) = self.registry.get(channel) else {
                    return no_pug(channel);
                };
                match session.add_member(author.clone()).await {
                    Ok(_) => "Done.".to_string(),
                    Err(SessionError::AlreadyQueued(_)) => {
                        "You are already in that PUG.".to_string()
                    }
                    Err(err) => err.to_string(),
                }
            }
            PugCommand::Leave => {
                let Some(session) = self.registry.get(channel) else {
                    return no_pug(channel);
                };
                match session.remove_member(author).await {
                    Ok(_) => "Done.".to_string(),
                    Err(SessionError::NotInSession(_)) => "You are not in that PUG.".to_string(),
                    Err(err) => err.to_string(),
                }
            }
            PugCommand::Kick { name } => {
                let Some(session) = self.registry.get(channel) else {
                    return no_pug(channel);
                };
                let target = session
                    .queue()
                    .into_iter()
                    .find(|p| p.name == name)
                    .or_else(|| {
                        session.current_match().and_then(|m| {
                            m.teams()
                                .iter()
                                .flatten()
                                .find(|p| p.name == name)
                                .cloned()
                        })
                    });
                let Some(target) = target else {
                    return format!("*{name}* is not in that PUG.");
                };
                match session.remove_member(&target).await {
                    Ok(_) => format!(
                        "*{}* has been kicked from the PUG in {}.",
                        target.name, channel
                    ),
                    Err(err) => err.to_string(),
                }
            }
            PugCommand::Submit {
                rounds_for,
                rounds_against,
            } => {
                let Some(session) = self.registry.get(channel) else {
                    return no_pug(channel);
                };
                match session.submit_score(Score::new(rounds_for, rounds_against), author) {
                    Ok(_) => "Score has been submitted.".to_string(),
                    Err(SessionError::Score(ScoreError::NoActiveMatch)) => {
                        "There's no ongoing match for this PUG.".to_string()
                    }
                    Err(SessionError::Score(ScoreError::ReporterNotInMatch(_))) => {
                        "You are not in the match for this PUG.".to_string()
                    }
                    Err(SessionError::Score(ScoreError::AlreadySettled)) => {
                        "The match score has already been settled.".to_string()
                    }
                    Err(err) => err.to_string(),
                }
            }
        }
    }
}

fn no_pug(channel: &ChannelId) -> String {
    format!("There is no PUG running in {channel}.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SessionConfig;
    use crate::infra::memory_channel::MemoryHub;
    use crate::infra::store::MemoryStore;

    fn player(id: u64) -> Participant {
        Participant::new(id, format!("player-{id}"))
    }

    #[test]
    fn test_parse_basic_commands() {
        assert_eq!(parse("pug start").unwrap(), PugCommand::Start);
        assert_eq!(parse("!pug stop").unwrap(), PugCommand::Stop);
        assert_eq!(parse("pug join").unwrap(), PugCommand::Join);
        assert_eq!(parse("pug leave").unwrap(), PugCommand::Leave);
        assert_eq!(
            parse("pug kick @player-3").unwrap(),
            PugCommand::Kick {
                name: "player-3".into()
            }
        );
        assert_eq!(
            parse("pug submit 13 7").unwrap(),
            PugCommand::Submit {
                rounds_for: 13,
                rounds_against: 7
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(parse("karma @user").unwrap_err(), CommandError::NotACommand);
        assert_eq!(
            parse("pug dance").unwrap_err(),
            CommandError::UnknownSubcommand("dance".into())
        );
        assert_eq!(
            parse("pug submit -1 7").unwrap_err(),
            CommandError::NegativeScore
        );
        assert!(matches!(
            parse("pug submit 13").unwrap_err(),
            CommandError::Usage(_)
        ));
        assert!(matches!(
            parse("pug kick").unwrap_err(),
            CommandError::Usage(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_replies() {
        let hub = MemoryHub::new();
        let registry = SessionRegistry::new(
            hub.clone(),
            Arc::new(MemoryStore::new()),
            SessionConfig::default(),
        );
        let dispatcher = CommandDispatcher::new(registry.clone());

        let nowhere = ChannelId("nowhere".into());
        assert_eq!(
            dispatcher
                .dispatch(&nowhere, &player(1), PugCommand::Join)
                .await,
            "There is no PUG running in #nowhere."
        );

        let reply = dispatcher
            .dispatch(&nowhere, &player(1), PugCommand::Start)
            .await;
        assert_eq!(reply, "PUG started in #pug-1.");
        let id = ChannelId("pug-1".into());

        assert_eq!(
            dispatcher
                .dispatch(&id, &player(2), PugCommand::Join)
                .await,
            "Done."
        );
        assert_eq!(
            dispatcher
                .dispatch(&id, &player(2), PugCommand::Join)
                .await,
            "You are already in that PUG."
        );
        assert_eq!(
            dispatcher
                .dispatch(&id, &player(3), PugCommand::Leave)
                .await,
            "You are not in that PUG."
        );
        assert_eq!(
            dispatcher
                .dispatch(
                    &id,
                    &player(2),
                    PugCommand::Submit {
                        rounds_for: 13,
                        rounds_against: 7
                    }
                )
                .await,
            "There's no ongoing match for this PUG."
        );
        assert_eq!(
            dispatcher
                .dispatch(
                    &id,
                    &player(9),
                    PugCommand::Kick {
                        name: "player-2".into()
                    }
                )
                .await,
            "*player-2* has been kicked from the PUG in #pug-1."
        );
        assert_eq!(
            dispatcher
                .dispatch(&id, &player(1), PugCommand::Stop)
                .await,
            "Done."
        );
        assert_eq!(
            dispatcher
                .dispatch(&id, &player(1), PugCommand::Stop)
                .await,
            "There is no PUG running in #pug-1."
        );
    }
}

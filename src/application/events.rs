//! Session lifecycle events.
//!
//! External collaborators (voice-channel managers, stat recorders,
//! notifiers) subscribe to a typed broadcast stream instead of hooking a
//! framework-wide dispatch: every integration point is explicit.

use tokio::sync::broadcast;

use crate::domain::{Participant, Score};
use crate::infra::channel::ChannelId;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    SessionStarted {
        session: ChannelId,
        owner: Participant,
    },
    SessionEnded {
        session: ChannelId,
    },
    MemberJoined {
        session: ChannelId,
        member: Participant,
        queue_len: usize,
    },
    MemberLeft {
        session: ChannelId,
        member: Participant,
        queue_len: usize,
    },
    /// The queue crossed the match threshold and a ready check is starting.
    QuorumReached {
        session: ChannelId,
    },
    MatchStarted {
        session: ChannelId,
        map: String,
        teams: [Vec<Participant>; 2],
    },
    MatchEnded {
        session: ChannelId,
        score: Option<Score>,
    },
}

/// Broadcast bus for [`SessionEvent`]s. Cloning shares the stream.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        log::debug!("event: {event:?}");
        // Nobody listening is fine; events are advisory.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(128)
    }
}

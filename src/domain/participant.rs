use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity reference for a queue member.
///
/// The core never owns identity: a `Participant` only carries the user id
/// assigned by the chat platform and a display name for rendering. Equality
/// is by id so a display-name change does not duplicate a player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: u64,
    pub name: String,
}

impl Participant {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Mention string used in channel notices.
    pub fn mention(&self) -> String {
        format!("@{}", self.name)
    }
}

impl PartialEq for Participant {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Participant {}

impl std::hash::Hash for Participant {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::map_pool::MapPool;

/// Number of players in a full match.
pub const MATCH_SIZE: usize = 10;
/// Number of players per team.
pub const TEAM_SIZE: usize = 5;

/// Lifecycle phase of a PUG session.
///
/// `Filling` is the initial phase; `Ended` is terminal. Every other phase
/// implies the queue held at least [`MATCH_SIZE`] players when the session
/// moved into `Readying`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PugPhase {
    #[default]
    Filling,
    Readying,
    TeamSelection,
    MapSelection,
    MatchRunning,
    Submitting,
    Ended,
}

impl PugPhase {
    /// A match cycle (ready check through score submission) is in flight.
    pub fn match_in_progress(self) -> bool {
        !matches!(self, PugPhase::Filling | PugPhase::Ended)
    }
}

impl fmt::Display for PugPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filling => write!(f, "filling"),
            Self::Readying => write!(f, "readying"),
            Self::TeamSelection => write!(f, "team_selection"),
            Self::MapSelection => write!(f, "map_selection"),
            Self::MatchRunning => write!(f, "match_running"),
            Self::Submitting => write!(f, "submitting"),
            Self::Ended => write!(f, "ended"),
        }
    }
}

impl FromStr for PugPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "filling" => Ok(Self::Filling),
            "readying" => Ok(Self::Readying),
            "team_selection" => Ok(Self::TeamSelection),
            "map_selection" => Ok(Self::MapSelection),
            "match_running" => Ok(Self::MatchRunning),
            "submitting" => Ok(Self::Submitting),
            "ended" => Ok(Self::Ended),
            _ => Err(format!("unknown phase: {s}")),
        }
    }
}

/// How teams are assigned once ten players are ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TeamMethod {
    #[default]
    Captains,
    Random,
}

impl fmt::Display for TeamMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Captains => write!(f, "Captains"),
            Self::Random => write!(f, "Random"),
        }
    }
}

impl FromStr for TeamMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "captains" => Ok(Self::Captains),
            "random" => Ok(Self::Random),
            _ => Err(format!("unknown team method: {s}")),
        }
    }
}

/// How the match map is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MapMethod {
    #[default]
    Veto,
    Vote,
}

impl fmt::Display for MapMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Veto => write!(f, "Veto"),
            Self::Vote => write!(f, "Vote"),
        }
    }
}

impl FromStr for MapMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "veto" => Ok(Self::Veto),
            "vote" => Ok(Self::Vote),
            _ => Err(format!("unknown map method: {s}")),
        }
    }
}

/// What happens to the losing team after a settled match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoserPolicy {
    #[default]
    LosersLeave,
    LosersStay,
}

impl fmt::Display for LoserPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LosersLeave => write!(f, "Losers Leave"),
            Self::LosersStay => write!(f, "Losers Stay"),
        }
    }
}

impl FromStr for LoserPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', " ").as_str() {
            "losers leave" | "leave" => Ok(Self::LosersLeave),
            "losers stay" | "stay" => Ok(Self::LosersStay),
            _ => Err(format!("unknown loser policy: {s}")),
        }
    }
}

/// Options chosen by the session owner during initial setup.
///
/// Immutable once chosen; the session rejects a second set attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub map_pool: MapPool,
    pub team_method: TeamMethod,
    pub map_method: MapMethod,
    pub loser_policy: LoserPolicy,
}

/// Tunable timings for a session: 60s ready checks and selection turns,
/// 30s setup menus, a 60s rest between back-to-back matches and a 5 minute
/// grace before a temporary channel is deleted.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ready_timeout: Duration,
    pub turn_timeout: Duration,
    pub vote_timeout: Duration,
    pub setup_timeout: Duration,
    pub rest_between_matches: Duration,
    pub channel_delete_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(60),
            turn_timeout: Duration::from_secs(60),
            vote_timeout: Duration::from_secs(60),
            setup_timeout: Duration::from_secs(30),
            rest_between_matches: Duration::from_secs(60),
            channel_delete_delay: Duration::from_secs(300),
        }
    }
}

impl SessionConfig {
    /// Uniformly scaled-down timings, handy for simulations and tests.
    pub fn scaled(millis: u64) -> Self {
        let d = Duration::from_millis(millis);
        Self {
            ready_timeout: d,
            turn_timeout: d,
            vote_timeout: d,
            setup_timeout: d,
            rest_between_matches: d,
            channel_delete_delay: d,
        }
    }
}

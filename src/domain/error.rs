//! Domain error types for the PUG core.
//!
//! User input errors (duplicate joins, ineligible score reporters, picks of
//! an already-resolved option) surface as rejected-operation results here,
//! never as faults. Timeouts are not errors at all; they are ordinary
//! state-machine inputs handled by the menus.

use thiserror::Error;

/// Errors from queue and phase operations on a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0} is already in this PUG")]
    AlreadyQueued(String),

    #[error("{0} is not in this PUG")]
    NotInSession(String),

    #[error("this PUG has ended")]
    Ended,

    #[error("session settings have already been chosen")]
    SettingsAlreadyChosen,

    #[error("a match needs {needed} players, only {have} are queued")]
    NotEnoughPlayers { needed: usize, have: usize },

    #[error("map pool {0} is empty")]
    EmptyMapPool(String),

    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error("selection menu failed: {0}")]
    Menu(#[from] MenuError),

    #[error("session operation failed: {0}")]
    OperationFailed(#[from] anyhow::Error),
}

/// Errors from the selection menu family.
#[derive(Debug, Error)]
pub enum MenuError {
    #[error("menu needs at least {min} options, got {got}")]
    NotEnoughOptions { min: usize, got: usize },

    #[error("option menus support at most {max} options, got {got}")]
    TooManyOptions { max: usize, got: usize },

    #[error("a poll needs at least {min} voters, got {got}")]
    NotEnoughVoters { min: usize, got: usize },

    #[error("cannot keep {picks} picks out of {options} options")]
    TooManyPicks { picks: usize, options: usize },

    #[error("turn-based selection needs an even option count, got {0}")]
    OddOptionCount(usize),

    #[error("option {0} has already been resolved")]
    OptionAlreadyResolved(String),

    #[error("unknown option symbol {0}")]
    UnknownSymbol(char),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Errors from score submission on a match record.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("the match score has already been settled")]
    AlreadySettled,

    #[error("{0} is not in the match for this PUG")]
    ReporterNotInMatch(String),

    #[error("there is no ongoing match for this PUG")]
    NoActiveMatch,
}

/// Errors from the interaction channel transport.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("message delivery failed: {0}")]
    Delivery(String),

    #[error("unknown message handle")]
    UnknownMessage,

    #[error("channel is closed")]
    Closed,
}

/// Errors from the settings store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("value for {0} could not be encoded: {1}")]
    Encode(String, String),

    #[error("store write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the session registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a PUG is already running in {0}")]
    AlreadyRunning(String),

    #[error("there is no PUG running in {0}")]
    NoSession(String),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Unified error type for callers that handle every domain error the same
/// way, mirroring the per-concern enums above.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("menu error: {0}")]
    Menu(#[from] MenuError),

    #[error("score error: {0}")]
    Score(#[from] ScoreError),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

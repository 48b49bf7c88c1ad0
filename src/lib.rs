//! tenman: a pick-up-game (PUG) session manager.
//!
//! Models a ten-player matchmaking session as an explicit state machine:
//! queueing, ready checks with timeout kicks and refills, captain drafts or
//! random teams, map vetoes or votes, and score settlement by matching
//! reports from both teams. The chat platform sits behind the
//! [`infra::channel::InteractionChannel`] contract, so the core runs the
//! same against a real transport or the bundled in-memory one.

pub mod application;
pub mod commands;
pub mod domain;
pub mod infra;
pub mod state;

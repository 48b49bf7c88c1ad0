//! Selection menu family.
//!
//! Every menu collects choices over a shared options board rendered into
//! the channel: reactions from eligible participants resolve options, every
//! wait carries a deadline, and the pick-or-timeout decision for a turn is
//! made exactly once.

mod board;
mod confirm;
mod poll;
mod single;
mod turn_based;

pub use board::{Attribution, OptionsBoard};
pub use confirm::ConfirmationMenu;
pub use poll::PollMenu;
pub use single::SingleSelectionMenu;
pub use turn_based::{TurnBasedSelectionMenu, TurnBasedVetoMenu};

#[cfg(test)]
mod tests;

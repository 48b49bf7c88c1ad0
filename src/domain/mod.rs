//! Domain types for the tenman PUG core.
//! Defines the queue/phase model, match records, map pools and domain errors.

pub mod error;
pub mod map_pool;
pub mod match_record;
pub mod participant;
pub mod session;

pub use error::*;
pub use map_pool::*;
pub use match_record::*;
pub use participant::*;
pub use session::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_phase_display_parse() {
        assert_eq!(PugPhase::Filling.to_string(), "filling");
        assert_eq!(PugPhase::from_str("READYING").unwrap(), PugPhase::Readying);
        assert!(PugPhase::from_str("warmup").is_err());
    }

    #[test]
    fn test_team_method_display_parse() {
        assert_eq!(TeamMethod::Captains.to_string(), "Captains");
        assert_eq!(TeamMethod::from_str("random").unwrap(), TeamMethod::Random);
    }

    #[test]
    fn test_loser_policy_display_parse() {
        assert_eq!(LoserPolicy::LosersLeave.to_string(), "Losers Leave");
        assert_eq!(
            LoserPolicy::from_str("losers stay").unwrap(),
            LoserPolicy::LosersStay
        );
    }
}

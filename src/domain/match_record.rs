use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::ScoreError;
use super::participant::Participant;
use super::session::TEAM_SIZE;

/// A round score as reported by one team, oriented as (for, against).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub rounds_for: u32,
    pub rounds_against: u32,
}

impl Score {
    pub fn new(rounds_for: u32, rounds_against: u32) -> Self {
        Self {
            rounds_for,
            rounds_against,
        }
    }

    /// The same score seen from the other team's side.
    pub fn flipped(self) -> Self {
        Self {
            rounds_for: self.rounds_against,
            rounds_against: self.rounds_for,
        }
    }

    pub fn is_draw(self) -> bool {
        self.rounds_for == self.rounds_against
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.rounds_for, self.rounds_against)
    }
}

/// Result of a single score submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The report was recorded; no agreement yet.
    Recorded,
    /// This report produced agreement and fixed the final score.
    Settled(Score),
}

/// The in-progress match owned by a session: two teams, the selected map
/// and the per-team score report ledger.
///
/// Reports are append-only. The score settles at the first report index
/// where both teams' normalized reports agree; once settled, the final
/// score is fixed and further submissions are rejected.
#[derive(Debug, Clone)]
pub struct MatchRecord {
    teams: [Vec<Participant>; 2],
    map: String,
    reports: [Vec<Score>; 2],
    settled: Option<Score>,
}

impl MatchRecord {
    pub fn new(teams: [Vec<Participant>; 2], map: impl Into<String>) -> Self {
        debug_assert!(
            teams.iter().all(|t| t.len() == TEAM_SIZE),
            "a match takes two teams of {TEAM_SIZE}"
        );
        Self {
            teams,
            map: map.into(),
            reports: [Vec::new(), Vec::new()],
            settled: None,
        }
    }

    pub fn teams(&self) -> &[Vec<Participant>; 2] {
        &self.teams
    }

    pub fn map(&self) -> &str {
        &self.map
    }

    pub fn settled_score(&self) -> Option<Score> {
        self.settled
    }

    /// Raw reports for one team, already normalized to team 0 orientation.
    pub fn reports(&self, team: usize) -> &[Score] {
        &self.reports[team]
    }

    /// Index of the team `member` plays on.
    pub fn team_of(&self, member: &Participant) -> Option<usize> {
        self.teams.iter().position(|t| t.contains(member))
    }

    pub fn has_member(&self, member: &Participant) -> bool {
        self.team_of(member).is_some()
    }

    /// Drops a member from their team. Returns false if they are not in
    /// the match. Mid-match removal is an anomaly the caller logs.
    pub fn remove_member(&mut self, member: &Participant) -> bool {
        for team in self.teams.iter_mut() {
            if let Some(pos) = team.iter().position(|p| p == member) {
                team.remove(pos);
                return true;
            }
        }
        false
    }

    /// Records `reporter`'s team's view of the score.
    ///
    /// Scores are normalized to team 0 orientation before they are
    /// appended, so agreement is checked on directly comparable pairs.
    pub fn submit_score(
        &mut self,
        score: Score,
        reporter: &Participant,
    ) -> Result<SubmitOutcome, ScoreError> {
        if self.settled.is_some() {
            return Err(ScoreError::AlreadySettled);
        }
        let team = self
            .team_of(reporter)
            .ok_or_else(|| ScoreError::ReporterNotInMatch(reporter.name.clone()))?;
        let normalized = if team == 1 { score.flipped() } else { score };
        self.reports[team].push(normalized);
        if let Some(agreed) = self.agreed_pair() {
            self.settled = Some(agreed);
            return Ok(SubmitOutcome::Settled(agreed));
        }
        Ok(SubmitOutcome::Recorded)
    }

    /// The losing team's index, once settled. `None` while unsettled and
    /// for a drawn final score.
    pub fn losing_team(&self) -> Option<usize> {
        let score = self.settled?;
        if score.is_draw() {
            return None;
        }
        if score.rounds_for < score.rounds_against {
            Some(0)
        } else {
            Some(1)
        }
    }

    // Agreement is index-wise: both teams must have reported the same
    // normalized pair at the same position in their ledgers.
    fn agreed_pair(&self) -> Option<Score> {
        let [ours, theirs] = &self.reports;
        ours.iter()
            .zip(theirs.iter())
            .find(|(a, b)| a == b)
            .map(|(a, _)| *a)
    }
}

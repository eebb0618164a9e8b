//! `ComponentStats`: per-file aggregate history.

use super::attempt::Outcome;
use serde::{Deserialize, Serialize};

/// Per-file modification/failure history used to derive avoidance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentStats {
    pub modification_count: u32,
    pub failure_count: u32,
    pub success_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<Outcome>,
}

impl ComponentStats {
    /// `shouldAvoid = modificationCount >= 5 ∧ failureCount >= 4`.
    pub fn should_avoid(&self) -> bool {
        self.modification_count >= 5 && self.failure_count >= 4
    }

    pub fn record(&mut self, outcome: Outcome) {
        self.modification_count += 1;
        if outcome.is_failure() {
            self.failure_count += 1;
        } else if matches!(outcome, Outcome::Success) {
            self.success_count += 1;
        }
        self.last_outcome = Some(outcome);
    }
}

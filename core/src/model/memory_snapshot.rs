//! `MemorySnapshot`: the single long-lived state document.

use super::attempt::{AttemptRecord, Outcome};
use super::component_stats::ComponentStats;
use super::score_history::ScoreHistoryEntry;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Owns every attempt and score entry ever recorded for a project, plus the
/// derived per-file stats and avoided-component set.
///
/// Exclusively mutated by `MemoryStore`; every other component holds a
/// read-only `&MemorySnapshot` view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub attempts: Vec<AttemptRecord>,
    pub score_history: Vec<ScoreHistoryEntry>,
    pub component_stats: BTreeMap<String, ComponentStats>,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt and update the per-file aggregates it touched.
    pub fn record_attempt(&mut self, attempt: AttemptRecord) {
        for path in &attempt.touched_files {
            self.component_stats
                .entry(path.clone())
                .or_default()
                .record(attempt.outcome);
        }
        self.attempts.push(attempt);
    }

    pub fn record_score(&mut self, entry: ScoreHistoryEntry) {
        self.score_history.push(entry);
    }

    /// Derived `avoidedComponents` set: every file whose stats say
    /// `should_avoid()`.
    pub fn avoided_components(&self) -> BTreeSet<String> {
        self.component_stats
            .iter()
            .filter(|(_, stats)| stats.should_avoid())
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Attempts whose outcome marks them unsafe to retry
    /// (`broke_build` or `failed`).
    pub fn failed_attempts(&self) -> impl Iterator<Item = &AttemptRecord> {
        self.attempts
            .iter()
            .filter(|a| matches!(a.outcome, Outcome::BrokeBuild | Outcome::Failed))
    }

    /// Score trend over the last two recorded entries.
    pub fn trend(&self) -> Trend {
        let last_two: Vec<&ScoreHistoryEntry> = self.score_history.iter().rev().take(2).collect();
        match last_two.as_slice() {
            [latest, previous] => {
                let delta = latest.after_score - previous.after_score;
                if delta > 0.1 {
                    Trend::Improving
                } else if delta < -0.1 {
                    Trend::Regressing
                } else {
                    Trend::Flat
                }
            }
            [only] => {
                if only.delta > 0.1 {
                    Trend::Improving
                } else if only.delta < -0.1 {
                    Trend::Regressing
                } else {
                    Trend::Flat
                }
            }
            _ => Trend::Flat,
        }
    }

    pub fn last_delta(&self) -> Option<f64> {
        self.score_history.last().map(|e| e.delta)
    }
}

/// Coarse score direction used in `ContextSummary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Improving,
    Flat,
    Regressing,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Improving => "IMPROVING",
            Self::Flat => "FLAT",
            Self::Regressing => "REGRESSING",
        };
        write!(f, "{s}")
    }
}

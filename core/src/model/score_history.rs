//! `ScoreHistoryEntry`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreHistoryEntry {
    pub iteration: u32,
    pub before_score: f64,
    pub after_score: f64,
    pub delta: f64,
    pub target_reached: bool,
}

impl ScoreHistoryEntry {
    pub fn new(iteration: u32, before_score: f64, after_score: f64, target: f64) -> Self {
        Self {
            iteration,
            before_score,
            after_score,
            delta: after_score - before_score,
            target_reached: after_score >= target,
        }
    }
}

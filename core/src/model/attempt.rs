//! `AttemptRecord`: one past Recommendation execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome taxonomy for a single recommendation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failed,
    NoEffect,
    BrokeBuild,
    RejectedByFilter,
    RejectedByHuman,
    RejectedByValidator,
    Cancelled,
}

impl Outcome {
    /// Outcomes that mark a component as a repeated-failure target for
    /// `ComponentStats::should_avoid`.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::BrokeBuild)
    }
}

/// A single recorded Recommendation execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub iteration: u32,
    pub recommendation_id: String,
    pub recommendation_title: String,
    pub outcome: Outcome,
    pub touched_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn new(
        iteration: u32,
        recommendation_id: impl Into<String>,
        recommendation_title: impl Into<String>,
        outcome: Outcome,
    ) -> Self {
        Self {
            iteration,
            recommendation_id: recommendation_id.into(),
            recommendation_title: recommendation_title.into(),
            outcome,
            touched_files: Vec::new(),
            reason: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_touched_files(mut self, files: Vec<String>) -> Self {
        self.touched_files = files;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

//! `IterationResult`: the full record of one pass through the state machine.

use super::design_spec::DesignSpec;
use super::file_change::FileChange;
use super::hybrid_score::HybridScore;
use super::validation_result::ValidationResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationResult {
    pub iteration: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub before_screenshot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_spec: Option<DesignSpec>,
    pub file_changes: Vec<FileChange>,
    pub validations: Vec<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<HybridScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<String>,
    pub next_action: String,
}

impl IterationResult {
    pub fn new(iteration: u32, before_screenshot: impl Into<String>) -> Self {
        Self {
            iteration,
            started_at: Utc::now(),
            finished_at: None,
            before_screenshot: before_screenshot.into(),
            after_screenshot: None,
            design_spec: None,
            file_changes: Vec::new(),
            validations: Vec::new(),
            score: None,
            reflection: None,
            next_action: "capture".to_string(),
        }
    }

    pub fn finish(&mut self, next_action: impl Into<String>) {
        self.finished_at = Some(Utc::now());
        self.next_action = next_action.into();
    }
}

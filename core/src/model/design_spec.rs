//! `DesignSpec`: vision-adapter output.

use super::recommendation::Recommendation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Current score + issues + recommendations + detected project context,
/// as returned by a `VisionAdapter::analyze` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignSpec {
    pub current_score: f64,
    pub issues: Vec<Issue>,
    pub recommendations: Vec<Recommendation>,
    pub project_context: Vec<String>,
}

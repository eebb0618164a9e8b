//! `ChangePlan`/`PlannedChange`.

use serde::{Deserialize, Serialize};

/// One MicroEditToolkit invocation specification, emitted by DiscoveryAgent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedChange {
    /// Relative to the project root.
    pub file: String,
    /// 1-based.
    pub line: usize,
    /// Name of a `MicroEditToolkit` operation (see `crate::toolkit::ToolName`).
    pub tool: String,
    /// Verbatim current content of `line`, as read by DiscoveryAgent.
    pub expected_current_line: String,
    /// Tool-specific parameters (shape depends on `tool`).
    pub params: serde_json::Value,
}

/// An ordered sequence of `PlannedChange`, emitted for exactly one
/// Recommendation. Pure data: constructing or inspecting a ChangePlan never
/// touches the filesystem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangePlan {
    pub recommendation_id: String,
    pub changes: Vec<PlannedChange>,
}

impl ChangePlan {
    pub fn new(recommendation_id: impl Into<String>) -> Self {
        Self {
            recommendation_id: recommendation_id.into(),
            changes: Vec::new(),
        }
    }

    /// Every `PlannedChange.file` is present in `candidates`: DiscoveryAgent
    /// must never plan edits outside the files it was actually shown.
    pub fn targets_are_subset_of(&self, candidates: &[String]) -> bool {
        self.changes.iter().all(|c| candidates.iter().any(|f| f == &c.file))
    }

    /// Every `PlannedChange.tool` names a tool the toolkit exposes.
    pub fn tools_are_known(&self, known_tools: &[&str]) -> bool {
        self.changes
            .iter()
            .all(|c| known_tools.contains(&c.tool.as_str()))
    }
}

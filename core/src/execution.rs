//! C5: ExecutionAgent, phase 2 of the edit pipeline. Applies a
//! `ChangePlan` strictly in order via `MicroEditToolkit`. Never retries a
//! `PlannedChange` with different parameters and never falls back to a raw
//! file write.

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::model::{ChangePlan, FileChange, ValidationResult};
use crate::toolkit::MicroEditToolkit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Applied,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedChangeOutcome {
    pub file: String,
    pub line: usize,
    pub tool: String,
    pub status: ChangeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub outcomes: Vec<PlannedChangeOutcome>,
    pub file_changes: Vec<FileChange>,
    /// Every validator verdict collected upstream in the orchestrator's
    /// Discovery -> Validate pass, valid and rejected alike. Empty for
    /// reports built directly by `ExecutionAgent`, which runs after
    /// validation and never sees the validator itself.
    #[serde(default)]
    pub validations: Vec<ValidationResult>,
}

impl ExecutionReport {
    pub fn all_applied(&self) -> bool {
        !self.outcomes.is_empty()
            && self.outcomes.iter().all(|o| o.status == ChangeStatus::Applied)
    }

    pub fn touched_files(&self) -> Vec<String> {
        self.file_changes.iter().map(|c| c.file.clone()).collect()
    }
}

pub struct ExecutionAgent<'a> {
    toolkit: &'a MicroEditToolkit,
}

impl<'a> ExecutionAgent<'a> {
    pub fn new(toolkit: &'a MicroEditToolkit) -> Self {
        Self { toolkit }
    }

    #[instrument(skip(self, plan))]
    pub async fn execute(&self, plan: &ChangePlan) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        for change in &plan.changes {
            let result = self.toolkit.apply_change(change).await;
            match result {
                Ok(file_change) => {
                    report.outcomes.push(PlannedChangeOutcome {
                        file: change.file.clone(),
                        line: change.line,
                        tool: change.tool.clone(),
                        status: ChangeStatus::Applied,
                        reason: None,
                    });
                    report.file_changes.push(file_change);
                }
                Err(crate::error::Error::LineMismatch { .. }) => {
                    warn!(file = %change.file, line = change.line, "line mismatch, skipping planned change");
                    report.outcomes.push(PlannedChangeOutcome {
                        file: change.file.clone(),
                        line: change.line,
                        tool: change.tool.clone(),
                        status: ChangeStatus::Skipped,
                        reason: Some("line mismatch even after fallback search".to_string()),
                    });
                }
                Err(e) => {
                    warn!(file = %change.file, line = change.line, error = %e, "planned change failed");
                    report.outcomes.push(PlannedChangeOutcome {
                        file: change.file.clone(),
                        line: change.line,
                        tool: change.tool.clone(),
                        status: ChangeStatus::Failed,
                        reason: Some(e.to_string()),
                    });
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PlannedChange;
    use crate::paths::Paths;

    fn toolkit(dir: &std::path::Path) -> MicroEditToolkit {
        MicroEditToolkit::new(Paths::new(dir), 5, std::time::Duration::from_secs(30))
    }

    #[tokio::test]
    async fn applies_changes_in_order() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("Header.tsx"),
            "<button class=\"px-2 py-1 bg-blue-500\">Go</button>\n",
        )
        .await
        .unwrap();

        let toolkit = toolkit(dir.path());
        let agent = ExecutionAgent::new(&toolkit);

        let mut plan = ChangePlan::new("r1");
        plan.changes.push(PlannedChange {
            file: "Header.tsx".into(),
            line: 1,
            tool: "updateClassName".into(),
            expected_current_line: "<button class=\"px-2 py-1 bg-blue-500\">Go</button>".into(),
            params: serde_json::json!({
                "oldClassAttrValue": "px-2 py-1 bg-blue-500",
                "newClassAttrValue": "px-2 py-1 bg-blue-600 hover:bg-blue-700",
            }),
        });

        let report = agent.execute(&plan).await;
        assert!(report.all_applied());
        assert_eq!(report.file_changes.len(), 1);
    }

    #[tokio::test]
    async fn line_mismatch_is_skipped_but_other_changes_still_run() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("Two.tsx"),
            "<a class=\"missing-token\">Link</a>\n<span>Submit</span>\n",
        )
        .await
        .unwrap();

        let toolkit = toolkit(dir.path());
        let agent = ExecutionAgent::new(&toolkit);

        let mut plan = ChangePlan::new("r1");
        // This one won't find its expected token anywhere within the fallback radius.
        plan.changes.push(PlannedChange {
            file: "Two.tsx".into(),
            line: 1,
            tool: "updateClassName".into(),
            expected_current_line: "nope".into(),
            params: serde_json::json!({
                "oldClassAttrValue": "this-token-does-not-exist-anywhere",
                "newClassAttrValue": "replacement",
            }),
        });
        plan.changes.push(PlannedChange {
            file: "Two.tsx".into(),
            line: 2,
            tool: "updateTextContent".into(),
            expected_current_line: "<span>Submit</span>".into(),
            params: serde_json::json!({
                "oldText": "Submit",
                "newText": "Save",
            }),
        });

        let report = agent.execute(&plan).await;
        assert_eq!(report.outcomes[0].status, ChangeStatus::Skipped);
        assert_eq!(report.outcomes[1].status, ChangeStatus::Applied);
        assert_eq!(report.file_changes.len(), 1);
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("X.tsx"), "hi\n").await.unwrap();
        let toolkit = toolkit(dir.path());
        let agent = ExecutionAgent::new(&toolkit);

        let mut plan = ChangePlan::new("r1");
        plan.changes.push(PlannedChange {
            file: "X.tsx".into(),
            line: 1,
            tool: "rewriteWholeFile".into(),
            expected_current_line: "hi".into(),
            params: serde_json::json!({}),
        });

        let report = agent.execute(&plan).await;
        assert_eq!(report.outcomes[0].status, ChangeStatus::Failed);
    }
}

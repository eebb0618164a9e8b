//! C4: DiscoveryAgent, phase 1 of the edit pipeline. Read-only: never
//! mutates the filesystem.

use std::time::Duration;

use tracing::instrument;

use crate::adapters::ImplementationAdapter;
use crate::discovery_fs::CandidateFile;
use crate::error::{Error, Result};
use crate::model::{ChangePlan, Recommendation};
use crate::toolkit::TOOL_NAMES;

pub struct DiscoveryAgent<'a> {
    adapter: &'a dyn ImplementationAdapter,
    timeout: Duration,
}

impl<'a> DiscoveryAgent<'a> {
    pub fn new(adapter: &'a dyn ImplementationAdapter, timeout: Duration) -> Self {
        Self { adapter, timeout }
    }

    #[instrument(skip(self, recommendation, candidates))]
    pub async fn discover(
        &self,
        recommendation: &Recommendation,
        candidates: &[CandidateFile],
    ) -> Result<ChangePlan> {
        if candidates.is_empty() {
            return Err(Error::NoCandidateFiles);
        }

        let plan = match tokio::time::timeout(
            self.timeout,
            self.adapter.plan(recommendation, candidates),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::model_error(
                    "discovery",
                    format!("plan call timed out after {:?}", self.timeout),
                ))
            }
        };

        let candidate_paths: Vec<String> = candidates.iter().map(|c| c.path.clone()).collect();
        if !plan.targets_are_subset_of(&candidate_paths) {
            return Err(Error::PlanMalformed(format!(
                "ChangePlan for {} targets a file outside the candidate set",
                recommendation.id
            )));
        }
        if !plan.tools_are_known(TOOL_NAMES) {
            return Err(Error::PlanMalformed(format!(
                "ChangePlan for {} names an unknown tool",
                recommendation.id
            )));
        }

        Ok(plan)
    }
}

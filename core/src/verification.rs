//! C9: VerificationAgent, runs the build command after ExecutionAgent
//! commits changes; rolls back on failure.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::adapters::BuildAdapter;
use crate::error::{Error, Result};
use crate::toolkit::MicroEditToolkit;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub success: bool,
    pub stderr: String,
    pub duration_ms: u64,
    pub rolled_back: bool,
}

pub struct VerificationAgent<'a> {
    adapter: &'a dyn BuildAdapter,
    toolkit: &'a MicroEditToolkit,
    timeout: Duration,
}

impl<'a> VerificationAgent<'a> {
    pub fn new(adapter: &'a dyn BuildAdapter, toolkit: &'a MicroEditToolkit, timeout: Duration) -> Self {
        Self { adapter, toolkit, timeout }
    }

    #[instrument(skip(self))]
    pub async fn verify(&self, project_root: &std::path::Path) -> Result<VerificationReport> {
        let report = match tokio::time::timeout(self.timeout, self.adapter.build(project_root)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::external_unavailable(
                    "build",
                    format!("build call timed out after {:?}", self.timeout),
                ))
            }
        };

        if report.success {
            self.toolkit.commit_iteration().await?;
            return Ok(VerificationReport {
                success: true,
                stderr: report.stderr,
                duration_ms: report.duration_ms,
                rolled_back: false,
            });
        }

        warn!(stderr = %report.stderr, "build failed, rolling back iteration");
        self.toolkit.rollback_iteration().await?;
        Ok(VerificationReport {
            success: false,
            stderr: report.stderr,
            duration_ms: report.duration_ms,
            rolled_back: true,
        })
    }
}

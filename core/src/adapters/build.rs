use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub success: bool,
    pub stderr: String,
    pub duration_ms: u64,
}

/// Runs the configured build command against a project root and reports
/// its exit status and a tail of stderr. Never mutates project files.
#[async_trait]
pub trait BuildAdapter: Send + Sync {
    async fn build(&self, project_root: &std::path::Path) -> Result<BuildReport>;
}

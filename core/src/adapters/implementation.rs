use async_trait::async_trait;

use crate::error::Result;
use crate::model::{ChangePlan, Recommendation};

/// Produces a `ChangePlan` for one recommendation over a fixed candidate
/// file set. Used by `DiscoveryAgent` only; the adapter never writes files
/// and has no other method; `ExecutionAgent` talks exclusively to
/// `MicroEditToolkit`.
#[async_trait]
pub trait ImplementationAdapter: Send + Sync {
    async fn plan(
        &self,
        recommendation: &Recommendation,
        candidates: &[crate::discovery_fs::CandidateFile],
    ) -> Result<ChangePlan>;
}

use async_trait::async_trait;

use crate::error::Result;
use crate::model::Recommendation;

#[derive(Debug, Clone)]
pub struct ApprovalRequest<'a> {
    pub recommendations: &'a [Recommendation],
    /// Average impact x effort, scaled to roughly [0, 100].
    pub risk: f64,
    pub cost_cents: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ApprovalDecision {
    pub approved: Vec<Recommendation>,
    pub skip_iteration: bool,
}

/// An external decision source consulted by `ApprovalGate`: a human
/// prompt, a CI policy, or a pass-through oracle. A timeout on `request`
/// must be surfaced by the implementation as `skip_iteration = true`, not
/// as an error.
#[async_trait]
pub trait ApprovalSource: Send + Sync {
    async fn request(&self, request: ApprovalRequest<'_>) -> Result<ApprovalDecision>;
}

//! C7: ApprovalGate, risk/cost assessment plus a policy-gated external
//! decision.

use tracing::instrument;

use crate::adapters::{ApprovalDecision, ApprovalRequest, ApprovalSource};
use crate::config::{ApprovalConfig, ApprovalPolicy};
use crate::error::Result;
use crate::model::Recommendation;

pub struct ApprovalGate<'a> {
    config: &'a ApprovalConfig,
    source: &'a dyn ApprovalSource,
}

/// Flat per-character cost estimate for a recommendation's prompt-bearing
/// fields, in hundredths of a cent. A stand-in for a real pricing model,
/// which lives in the implementation adapter's domain.
const COST_CENTS_PER_RECOMMENDATION: u32 = 2;

impl<'a> ApprovalGate<'a> {
    pub fn new(config: &'a ApprovalConfig, source: &'a dyn ApprovalSource) -> Self {
        Self { config, source }
    }

    pub fn risk(recommendations: &[Recommendation]) -> f64 {
        if recommendations.is_empty() {
            return 0.0;
        }
        let total: f64 = recommendations
            .iter()
            .map(|r| f64::from(r.impact) * f64::from(r.effort))
            .sum();
        total / recommendations.len() as f64
    }

    fn estimated_cost_cents(recommendations: &[Recommendation]) -> u32 {
        recommendations.len() as u32 * COST_CENTS_PER_RECOMMENDATION
    }

    fn requires_approval(&self, risk: f64, is_first_iteration: bool) -> bool {
        match self.config.policy {
            ApprovalPolicy::Always => true,
            ApprovalPolicy::Never => false,
            ApprovalPolicy::FirstIteration => is_first_iteration,
            ApprovalPolicy::HighRisk => risk >= self.config.risk_threshold,
        }
    }

    #[instrument(skip(self, recommendations))]
    pub async fn evaluate(
        &self,
        recommendations: Vec<Recommendation>,
        is_first_iteration: bool,
    ) -> Result<ApprovalDecision> {
        let risk = Self::risk(&recommendations);
        let cost_cents = Self::estimated_cost_cents(&recommendations);

        if !self.requires_approval(risk, is_first_iteration) {
            return Ok(ApprovalDecision {
                approved: recommendations,
                skip_iteration: false,
            });
        }

        self.source
            .request(ApprovalRequest {
                recommendations: &recommendations,
                risk,
                cost_cents,
            })
            .await
    }
}

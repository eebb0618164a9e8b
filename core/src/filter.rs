//! C6: RecommendationFilter, applied to `DesignSpec.recommendations`
//! before approval. Deterministic given memory and a threshold; never
//! touches the filesystem or an adapter.

use tracing::instrument;

use crate::memory::MemoryStore;
use crate::model::{MemorySnapshot, Recommendation};

#[derive(Debug, Clone)]
pub struct Rejection {
    pub recommendation: Recommendation,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub approved: Vec<Recommendation>,
    pub rejected: Vec<Rejection>,
}

pub struct RecommendationFilter {
    roi_threshold: f64,
}

impl RecommendationFilter {
    pub fn new(roi_threshold: f64) -> Self {
        Self { roi_threshold }
    }

    #[instrument(skip(self, recommendations, memory, store))]
    pub fn filter(
        &self,
        recommendations: Vec<Recommendation>,
        memory: &MemorySnapshot,
        store: &MemoryStore,
    ) -> FilterOutcome {
        let avoided = memory.avoided_components();
        let mut outcome = FilterOutcome::default();

        for recommendation in recommendations {
            if let Some(reason) = self.rejection_reason(&recommendation, memory, store, &avoided) {
                outcome.rejected.push(Rejection {
                    recommendation,
                    reason,
                });
            } else {
                outcome.approved.push(recommendation);
            }
        }

        debug_assert!(outcome
            .approved
            .iter()
            .all(|a| !outcome.rejected.iter().any(|r| r.recommendation.id == a.id)));

        outcome
    }

    fn rejection_reason(
        &self,
        recommendation: &Recommendation,
        memory: &MemorySnapshot,
        store: &MemoryStore,
        avoided: &std::collections::BTreeSet<String>,
    ) -> Option<String> {
        if let Some(attempt) = store.was_attempted(recommendation, memory) {
            return Some(format!(
                "matches a previous attempt with outcome {:?} (recommendation {})",
                attempt.outcome, attempt.recommendation_id
            ));
        }

        if let Some(target) = &recommendation.target {
            if avoided.contains(target) {
                return Some(format!("target {target} is in the avoided-components list"));
            }
        }

        let roi = recommendation.roi();
        if roi < self.roi_threshold {
            return Some(format!(
                "ROI {roi:.2} is below threshold {:.2}",
                self.roi_threshold
            ));
        }

        None
    }
}

//! `HybridScore`: fusion of vision + measured metrics.

use serde::{Deserialize, Serialize};

/// Sub-scores over the three metrics categories, each already mapped to a
/// 0-10 scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsBreakdown {
    pub performance: f64,
    pub accessibility: f64,
    pub best_practices: f64,
}

impl MetricsBreakdown {
    /// Fixed weights: performance 0.4, accessibility 0.4, best-practices 0.2
    ///.
    pub fn weighted(&self, weights: (f64, f64, f64)) -> f64 {
        self.performance * weights.0
            + self.accessibility * weights.1
            + self.best_practices * weights.2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridScore {
    pub composite_score: f64,
    pub vision_score: f64,
    pub metrics_score: f64,
    /// In [0,1].
    pub confidence: f64,
    pub breakdown: MetricsBreakdown,
}

impl HybridScore {
    /// `composite = vision*w_v + metrics*w_m` with `w_v + w_m == 1`;
    /// `confidence = 1 - |vision - metrics| / 10`.
    pub fn compute(
        vision_score: f64,
        metrics_score: f64,
        breakdown: MetricsBreakdown,
        vision_weight: f64,
        metrics_weight: f64,
    ) -> Self {
        let composite_score = vision_score * vision_weight + metrics_score * metrics_weight;
        let confidence = 1.0 - (vision_score - metrics_score).abs() / 10.0;
        Self {
            composite_score,
            vision_score,
            metrics_score,
            confidence,
            breakdown,
        }
    }
}

//! C10: HybridScorer, fuses an independent vision call and metrics call
//! into one `HybridScore`.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::instrument;

use crate::adapters::{CoreWebVitals, MetricsAdapter, MetricsSnapshot, Screenshot, VisionAdapter};
use crate::error::{Error, Result};
use crate::model::{DesignSpec, HybridScore, MetricsBreakdown};

/// Fixed weights across the three metrics categories.
const PERFORMANCE_WEIGHT: f64 = 0.4;
const ACCESSIBILITY_WEIGHT: f64 = 0.4;
const BEST_PRACTICES_WEIGHT: f64 = 0.2;

pub struct HybridScorer<'a> {
    vision: &'a dyn VisionAdapter,
    metrics: &'a dyn MetricsAdapter,
    vision_weight: f64,
    metrics_weight: f64,
    vision_timeout: Duration,
    metrics_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ScoringOutput {
    pub design_spec: DesignSpec,
    pub score: HybridScore,
    pub insights: Vec<String>,
}

impl<'a> HybridScorer<'a> {
    pub fn new(
        vision: &'a dyn VisionAdapter,
        metrics: &'a dyn MetricsAdapter,
        vision_weight: f64,
        metrics_weight: f64,
        vision_timeout: Duration,
        metrics_timeout: Duration,
    ) -> Self {
        Self {
            vision,
            metrics,
            vision_weight,
            metrics_weight,
            vision_timeout,
            metrics_timeout,
        }
    }

    #[instrument(skip(self, screenshot, memory_context, project_context, avoided_components))]
    pub async fn score(
        &self,
        screenshot: &Screenshot,
        url: &str,
        memory_context: &str,
        project_context: &[String],
        avoided_components: &BTreeSet<String>,
    ) -> Result<ScoringOutput> {
        let vision_call = tokio::time::timeout(
            self.vision_timeout,
            self.vision
                .analyze(screenshot, memory_context, project_context, avoided_components),
        );
        let metrics_call = tokio::time::timeout(self.metrics_timeout, self.metrics.capture(url));

        let (design_spec, metrics_snapshot) = tokio::try_join!(
            async {
                vision_call
                    .await
                    .map_err(|_| Error::model_error("vision", "analyze call timed out"))?
            },
            async {
                metrics_call
                    .await
                    .map_err(|_| Error::external_unavailable("metrics", "capture call timed out"))?
            },
        )?;

        Ok(self.compose(&design_spec, &metrics_snapshot))
    }

    fn compose(&self, design_spec: &DesignSpec, metrics: &MetricsSnapshot) -> ScoringOutput {
        let breakdown = MetricsBreakdown {
            performance: performance_subscore(&metrics.core_web_vitals),
            accessibility: accessibility_subscore(metrics),
            best_practices: best_practices_subscore(metrics),
        };
        let metrics_score =
            breakdown.weighted((PERFORMANCE_WEIGHT, ACCESSIBILITY_WEIGHT, BEST_PRACTICES_WEIGHT));

        let score = HybridScore::compute(
            design_spec.current_score,
            metrics_score,
            breakdown,
            self.vision_weight,
            self.metrics_weight,
        );

        let mut insights: Vec<String> = design_spec
            .issues
            .iter()
            .map(|issue| issue.description.clone())
            .collect();
        insights.extend(metrics.accessibility.violations.iter().cloned());
        insights.extend(metrics.console.errors.iter().cloned());
        insights.sort();
        insights.dedup();

        ScoringOutput {
            design_spec: design_spec.clone(),
            score,
            insights,
        }
    }
}

/// Linear falloff between a "perfect" threshold and a "zero" threshold;
/// above the zero threshold the sub-score floors at 0.
fn linear_falloff(value: f64, perfect_at_or_below: f64, zero_at_or_above: f64) -> f64 {
    if value <= perfect_at_or_below {
        10.0
    } else if value >= zero_at_or_above {
        0.0
    } else {
        let span = zero_at_or_above - perfect_at_or_below;
        10.0 * (1.0 - (value - perfect_at_or_below) / span)
    }
}

/// Performance sub-score: the average of LCP, CLS, and TTFB sub-scores,
/// each mapped with its own linear falloff.
fn performance_subscore(vitals: &CoreWebVitals) -> f64 {
    let lcp = linear_falloff(vitals.lcp, 2500.0, 4000.0);
    let cls = linear_falloff(vitals.cls, 0.1, 0.25);
    let ttfb = linear_falloff(vitals.ttfb, 800.0, 1800.0);
    (lcp + cls + ttfb) / 3.0
}

fn accessibility_subscore(metrics: &MetricsSnapshot) -> f64 {
    let penalty = metrics.accessibility.violations.len() as f64 * 2.0
        + metrics.accessibility.contrast_issues.len() as f64 * 1.0
        + metrics.accessibility.warnings.len() as f64 * 0.5;
    (10.0 - penalty).clamp(0.0, 10.0)
}

fn best_practices_subscore(metrics: &MetricsSnapshot) -> f64 {
    let penalty =
        metrics.console.errors.len() as f64 * 2.0 + metrics.console.warnings.len() as f64 * 0.5;
    (10.0 - penalty).clamp(0.0, 10.0)
}

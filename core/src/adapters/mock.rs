//! Deterministic, in-memory adapter fixtures for tests. These are not a
//! production adapter: every method is driven from a fixed value or a
//! pre-scripted queue handed to it at construction time, with no I/O.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::discovery_fs::CandidateFile;
use crate::error::Result;
use crate::model::{ChangePlan, DesignSpec, Recommendation};

use super::{
    ApprovalDecision, ApprovalRequest, ApprovalSource, BuildAdapter, BuildReport, CaptureAdapter,
    ImplementationAdapter, MetricsAdapter, MetricsSnapshot, Screenshot, ScreenshotRequest,
    VisionAdapter,
};

/// Always returns the same screenshot, regardless of the request.
pub struct FixedCapture {
    pub screenshot: Screenshot,
}

impl FixedCapture {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            screenshot: Screenshot {
                data: vec![],
                path: path.into(),
                width: 1280,
                height: 800,
                taken_at: Utc::now(),
            },
        }
    }
}

#[async_trait]
impl CaptureAdapter for FixedCapture {
    async fn capture(&self, _request: ScreenshotRequest) -> Result<Screenshot> {
        Ok(self.screenshot.clone())
    }
}

/// Plays back a fixed sequence of `DesignSpec`s, one per call; repeats the
/// last one once the queue is empty. Useful for scripting a vision adapter
/// across several iterations in a single test.
pub struct ScriptedVision {
    queue: Mutex<VecDeque<DesignSpec>>,
    last: Mutex<DesignSpec>,
}

impl ScriptedVision {
    pub fn new(specs: impl IntoIterator<Item = DesignSpec>) -> Self {
        let queue: VecDeque<DesignSpec> = specs.into_iter().collect();
        let last = queue
            .back()
            .cloned()
            .unwrap_or_else(|| DesignSpec {
                current_score: 0.0,
                issues: vec![],
                recommendations: vec![],
                project_context: vec![],
            });
        Self {
            queue: Mutex::new(queue),
            last: Mutex::new(last),
        }
    }
}

#[async_trait]
impl VisionAdapter for ScriptedVision {
    async fn analyze(
        &self,
        _screenshot: &Screenshot,
        _memory_context: &str,
        _project_context: &[String],
        _avoided_components: &std::collections::BTreeSet<String>,
    ) -> Result<DesignSpec> {
        let mut queue = self.queue.lock().unwrap();
        match queue.pop_front() {
            Some(spec) => {
                *self.last.lock().unwrap() = spec.clone();
                Ok(spec)
            }
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }
}

/// Always returns the same metrics snapshot.
pub struct FixedMetrics {
    pub snapshot: MetricsSnapshot,
}

impl FixedMetrics {
    pub fn new(snapshot: MetricsSnapshot) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl MetricsAdapter for FixedMetrics {
    async fn capture(&self, _url: &str) -> Result<MetricsSnapshot> {
        Ok(self.snapshot.clone())
    }
}

/// Always succeeds or always fails, per construction.
pub struct FixedBuild {
    pub report: BuildReport,
}

impl FixedBuild {
    pub fn success() -> Self {
        Self {
            report: BuildReport { success: true, stderr: String::new(), duration_ms: 1 },
        }
    }

    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            report: BuildReport { success: false, stderr: stderr.into(), duration_ms: 1 },
        }
    }
}

#[async_trait]
impl BuildAdapter for FixedBuild {
    async fn build(&self, _project_root: &std::path::Path) -> Result<BuildReport> {
        Ok(self.report.clone())
    }
}

/// Approves every recommendation it's handed, never skips.
pub struct AutoApproveAll;

#[async_trait]
impl ApprovalSource for AutoApproveAll {
    async fn request(&self, request: ApprovalRequest<'_>) -> Result<ApprovalDecision> {
        Ok(ApprovalDecision {
            approved: request.recommendations.to_vec(),
            skip_iteration: false,
        })
    }
}

/// Rejects everything and requests the iteration be skipped.
pub struct RejectAll;

#[async_trait]
impl ApprovalSource for RejectAll {
    async fn request(&self, _request: ApprovalRequest<'_>) -> Result<ApprovalDecision> {
        Ok(ApprovalDecision { approved: vec![], skip_iteration: true })
    }
}

/// Returns an empty `ChangePlan` for every recommendation: a specialist
/// that matches everything and does nothing.
pub struct NoopImplementation;

#[async_trait]
impl ImplementationAdapter for NoopImplementation {
    async fn plan(
        &self,
        recommendation: &Recommendation,
        _candidates: &[CandidateFile],
    ) -> Result<ChangePlan> {
        Ok(ChangePlan::new(recommendation.id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dimension;

    fn recommendation() -> Recommendation {
        Recommendation {
            id: "r1".into(),
            dimension: Dimension::Spacing,
            title: "t".into(),
            description: "d".into(),
            impact: 5,
            effort: 2,
            code_hint: None,
            target: None,
        }
    }

    #[tokio::test]
    async fn scripted_vision_repeats_last_entry_after_queue_drains() {
        let first = DesignSpec { current_score: 5.0, issues: vec![], recommendations: vec![], project_context: vec![] };
        let second = DesignSpec { current_score: 8.0, issues: vec![], recommendations: vec![], project_context: vec![] };
        let vision = ScriptedVision::new(vec![first, second.clone()]);

        let screenshot = FixedCapture::new("a.png").screenshot.clone();
        let avoided = std::collections::BTreeSet::new();

        let one = vision.analyze(&screenshot, "", &[], &avoided).await.unwrap();
        assert_eq!(one.current_score, 5.0);
        let two = vision.analyze(&screenshot, "", &[], &avoided).await.unwrap();
        assert_eq!(two.current_score, 8.0);
        let three = vision.analyze(&screenshot, "", &[], &avoided).await.unwrap();
        assert_eq!(three.current_score, second.current_score);
    }

    #[tokio::test]
    async fn auto_approve_all_approves_every_recommendation() {
        let recs = vec![recommendation()];
        let request = ApprovalRequest { recommendations: &recs, risk: 10.0, cost_cents: 2 };
        let decision = AutoApproveAll.request(request).await.unwrap();
        assert_eq!(decision.approved.len(), 1);
        assert!(!decision.skip_iteration);
    }

    #[tokio::test]
    async fn reject_all_skips_the_iteration() {
        let recs = vec![recommendation()];
        let request = ApprovalRequest { recommendations: &recs, risk: 10.0, cost_cents: 2 };
        let decision = RejectAll.request(request).await.unwrap();
        assert!(decision.approved.is_empty());
        assert!(decision.skip_iteration);
    }
}

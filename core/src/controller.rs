//! C12: IterationController, the outer state machine. Drives
//! Capture -> Analyze -> Filter -> Approve -> Route -> Execute -> Verify
//! -> Evaluate -> Reflect -> PersistMemory, repeating until a terminal
//! condition is reached.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::adapters::{
    ApprovalSource, BuildAdapter, CaptureAdapter, MetricsAdapter, ScreenshotRequest, VisionAdapter,
};
use crate::approval::ApprovalGate;
use crate::config::Config;
use crate::discovery_fs::discover_candidates;
use crate::error::{Error, Result};
use crate::filter::RecommendationFilter;
use crate::memory::MemoryStore;
use crate::model::{AttemptRecord, FileChange, IterationResult, Outcome, ScoreHistoryEntry};
use crate::orchestrator::Orchestrator;
use crate::paths::Paths;
use crate::reflection::ReflectionAgent;
use crate::scorer::HybridScorer;
use crate::toolkit::MicroEditToolkit;
use crate::validator::ChangeValidator;
use crate::verification::VerificationAgent;

/// Why the controller stopped iterating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TerminalState {
    TargetReached { iteration: u32, composite_score: f64 },
    IterationsExhausted { iterations_run: u32 },
    Plateaued { iteration: u32 },
    Cancelled { iteration: u32 },
    UnrecoverableError { iteration: u32, message: String },
}

const BACKOFF_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(200);

pub struct IterationController {
    config: Config,
    capture: Box<dyn CaptureAdapter>,
    vision: Box<dyn VisionAdapter>,
    metrics: Box<dyn MetricsAdapter>,
    build: Box<dyn BuildAdapter>,
    approval_source: Box<dyn ApprovalSource>,
    orchestrator: Orchestrator,
    memory: MemoryStore,
    toolkit: MicroEditToolkit,
    paths: Paths,
    validator: ChangeValidator,
    filter: RecommendationFilter,
    reflection: ReflectionAgent,
    cancel: Arc<AtomicBool>,
}

impl IterationController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        capture: Box<dyn CaptureAdapter>,
        vision: Box<dyn VisionAdapter>,
        metrics: Box<dyn MetricsAdapter>,
        build: Box<dyn BuildAdapter>,
        approval_source: Box<dyn ApprovalSource>,
        orchestrator: Orchestrator,
    ) -> Self {
        let paths = Paths::new(config.project_path.clone());
        let toolkit = MicroEditToolkit::new(
            paths.clone(),
            config.line_fallback_radius,
            config.timeouts.execution(),
        );
        let validator = ChangeValidator::new(
            config.constraints.clone(),
            config.design_system.clone(),
            paths.clone(),
        );
        let filter = RecommendationFilter::new(config.recommendation_roi_threshold);
        let reflection = ReflectionAgent::new(config.regression_threshold, config.target_score, config.plateau);
        let memory = MemoryStore::new(config.output_dir.clone(), config.match_strategy);

        Self {
            config,
            capture,
            vision,
            metrics,
            build,
            approval_source,
            orchestrator,
            memory,
            toolkit,
            paths,
            validator,
            filter,
            reflection,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A cloneable handle callers can use to request cooperative
    /// cancellation; checked at every stage boundary.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<TerminalState> {
        let mut history: Vec<IterationResult> = Vec::new();

        for iteration in 1..=self.config.max_iterations {
            if self.cancel.load(Ordering::SeqCst) {
                let terminal = TerminalState::Cancelled { iteration };
                self.write_report(&history, terminal.clone()).await?;
                return Ok(terminal);
            }

            match self.run_iteration(iteration).await {
                Ok((result, Some(terminal))) => {
                    history.push(result);
                    self.write_report(&history, terminal.clone()).await?;
                    return Ok(terminal);
                }
                Ok((result, None)) => {
                    history.push(result);
                    continue;
                }
                Err(e) => {
                    warn!(iteration, error = %e, "unrecoverable error, stopping");
                    let terminal = TerminalState::UnrecoverableError {
                        iteration,
                        message: e.to_string(),
                    };
                    self.write_report(&history, terminal.clone()).await?;
                    return Ok(terminal);
                }
            }
        }

        let terminal = TerminalState::IterationsExhausted {
            iterations_run: self.config.max_iterations,
        };
        self.write_report(&history, terminal.clone()).await?;
        Ok(terminal)
    }

    /// Assembles and persists `report.json`/`REPORT.md` for the run so far.
    async fn write_report(&self, history: &[IterationResult], terminal: TerminalState) -> Result<()> {
        let report = crate::report::RunReport::new(
            self.config.project_path.clone(),
            terminal,
            history.to_vec(),
        );
        report.write(&self.config.output_dir).await?;
        Ok(())
    }

    /// Run one iteration. Returns the iteration's own record plus
    /// `Some(terminal)` when this iteration decides the run is over, or
    /// `None` to continue to the next iteration.
    async fn run_iteration(&self, iteration: u32) -> Result<(IterationResult, Option<TerminalState>)> {
        let snapshot = self.memory.load().await?;
        let avoided = self.memory.get_avoided_components(&snapshot);
        let context = self.memory.get_context_summary(&snapshot);
        let previous_composite = snapshot.score_history.last().map(|e| e.after_score);

        let screenshot = self
            .with_backoff(|| {
                self.timed(
                    self.config.timeouts.screenshot(),
                    "capture",
                    self.capture.capture(ScreenshotRequest {
                        url: self.config.frontend_url.clone(),
                        config: self.config.screenshot.clone(),
                    }),
                )
            })
            .await?;

        let mut result = IterationResult::new(iteration, screenshot.path.clone());

        let scorer = HybridScorer::new(
            self.vision.as_ref(),
            self.metrics.as_ref(),
            self.config.scoring_weights.vision,
            self.config.scoring_weights.metrics,
            self.config.timeouts.vision(),
            self.config.timeouts.metrics(),
        );
        let before_scoring = self
            .with_backoff(|| scorer.score(&screenshot, &self.config.frontend_url, &context, &[], &avoided))
            .await?;
        result.design_spec = Some(before_scoring.design_spec.clone());

        if self.cancel.load(Ordering::SeqCst) {
            return Ok((result, Some(TerminalState::Cancelled { iteration })));
        }

        let filter_outcome = self.filter.filter(
            before_scoring.design_spec.recommendations.clone(),
            &snapshot,
            &self.memory,
        );

        if filter_outcome.approved.is_empty() {
            result.finish("no_candidates");
            self.persist_no_change(iteration, &snapshot, before_scoring.score.composite_score)
                .await?;
            return Ok((result, None));
        }

        let approval_gate = ApprovalGate::new(&self.config.approval, self.approval_source.as_ref());
        let decision = approval_gate
            .evaluate(filter_outcome.approved, iteration == 1)
            .await?;

        if decision.skip_iteration || decision.approved.is_empty() {
            result.finish("rejected_by_human");
            self.persist_no_change(iteration, &snapshot, before_scoring.score.composite_score)
                .await?;
            return Ok((result, None));
        }

        if self.cancel.load(Ordering::SeqCst) {
            return Ok((result, Some(TerminalState::Cancelled { iteration })));
        }

        let candidates = discover_candidates(
            &self.paths,
            &self.config.candidate_extensions,
            self.config.max_candidate_file_bytes,
        )?;

        let execution = self
            .orchestrator
            .run(
                decision.approved.clone(),
                |_| candidates.clone(),
                &self.toolkit,
                &self.validator,
                &self.config.constraints,
            )
            .await;
        result.file_changes = execution.file_changes.clone();
        result.validations = execution.validations.clone();

        if execution.file_changes.is_empty() {
            result.finish("no_effective_changes");
            self.record_attempts(iteration, &decision.approved, Outcome::NoEffect, &[])
                .await?;
            self.persist_no_change(iteration, &snapshot, before_scoring.score.composite_score)
                .await?;
            return Ok((result, None));
        }

        let verification = VerificationAgent::new(
            self.build.as_ref(),
            &self.toolkit,
            self.config.timeouts.build(),
        )
        .verify(&self.config.project_path)
        .await?;

        if !verification.success {
            result.finish("broke_build");
            let touched: Vec<String> = execution.touched_files();
            self.record_attempts(iteration, &decision.approved, Outcome::BrokeBuild, &touched)
                .await?;
            self.persist_no_change(iteration, &snapshot, before_scoring.score.composite_score)
                .await?;
            return Ok((result, None));
        }

        let after_screenshot = self
            .with_backoff(|| {
                self.timed(
                    self.config.timeouts.screenshot(),
                    "capture",
                    self.capture.capture(ScreenshotRequest {
                        url: self.config.frontend_url.clone(),
                        config: self.config.screenshot.clone(),
                    }),
                )
            })
            .await?;
        result.after_screenshot = Some(after_screenshot.path.clone());

        let after_scoring = self
            .with_backoff(|| {
                scorer.score(&after_screenshot, &self.config.frontend_url, &context, &[], &avoided)
            })
            .await?;
        result.score = Some(after_scoring.score);

        let score_entry = ScoreHistoryEntry::new(
            iteration,
            before_scoring.score.composite_score,
            after_scoring.score.composite_score,
            self.config.target_score,
        );

        let reflection = self.reflection.reflect(&result, previous_composite, &snapshot);
        result.reflection = Some(reflection.lessons.join("; "));

        if reflection.should_rollback {
            info!(iteration, "score regressed past the floor, reverting committed changes");
            self.revert_file_changes(&execution.file_changes).await?;
            result.finish("regressed");
            self.record_attempts(
                iteration,
                &decision.approved,
                Outcome::Failed,
                &execution.touched_files(),
            )
            .await?;
            self.persist_no_change(iteration, &snapshot, before_scoring.score.composite_score)
                .await?;
            return Ok((result, None));
        }

        result.finish("continue");
        let touched = execution.touched_files();
        self.memory
            .mutate(|s| {
                for recommendation in &decision.approved {
                    s.record_attempt(
                        AttemptRecord::new(
                            iteration,
                            recommendation.id.clone(),
                            recommendation.title.clone(),
                            Outcome::Success,
                        )
                        .with_touched_files(touched.clone()),
                    );
                }
                s.record_score(score_entry);
            })
            .await?;

        if score_entry.target_reached {
            return Ok((
                result,
                Some(TerminalState::TargetReached {
                    iteration,
                    composite_score: after_scoring.score.composite_score,
                }),
            ));
        }

        if !reflection.should_continue {
            return Ok((result, Some(TerminalState::Plateaued { iteration })));
        }

        Ok((result, None))
    }

    async fn persist_no_change(
        &self,
        iteration: u32,
        _snapshot: &crate::model::MemorySnapshot,
        composite: f64,
    ) -> Result<()> {
        self.memory
            .mutate(|s| {
                s.record_score(ScoreHistoryEntry::new(
                    iteration,
                    composite,
                    composite,
                    self.config.target_score,
                ));
            })
            .await?;
        Ok(())
    }

    async fn record_attempts(
        &self,
        iteration: u32,
        recommendations: &[crate::model::Recommendation],
        outcome: Outcome,
        touched_files: &[String],
    ) -> Result<()> {
        let touched = touched_files.to_vec();
        self.memory
            .mutate(|s| {
                for recommendation in recommendations {
                    s.record_attempt(
                        AttemptRecord::new(
                            iteration,
                            recommendation.id.clone(),
                            recommendation.title.clone(),
                            outcome,
                        )
                        .with_touched_files(touched.clone()),
                    );
                }
            })
            .await?;
        Ok(())
    }

    /// Restore each file to its pre-iteration content. Used only for a
    /// post-build score regression: by this point `VerificationAgent`
    /// has already committed (deleting the toolkit's in-memory backups),
    /// so reverting means writing `FileChange.original_content` straight
    /// back rather than replaying the toolkit's backup-based rollback.
    async fn revert_file_changes(&self, file_changes: &[FileChange]) -> Result<()> {
        for change in file_changes {
            let resolved: PathBuf = self.paths.resolve(&change.file)?;
            tokio::fs::write(&resolved, &change.original_content)
                .await
                .map_err(|e| crate::error::Error::FileIO(e.to_string()))?;
        }
        Ok(())
    }

    /// Bounds a single adapter call to `duration`, mapping expiry to an
    /// `ExternalUnavailable` error so it participates in `with_backoff`'s
    /// retry logic like any other transient failure.
    async fn timed<T>(
        &self,
        duration: Duration,
        adapter: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(duration, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::external_unavailable(
                adapter,
                format!("timed out after {duration:?}"),
            )),
        }
    }

    /// Bounded exponential backoff for transient adapter errors
    /// (`ExternalUnavailable`, `ModelError`). Non-transient errors return
    /// immediately.
    async fn with_backoff<T, F, Fut>(&self, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = BACKOFF_BASE;
        for attempt in 0..BACKOFF_ATTEMPTS {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt + 1 < BACKOFF_ATTEMPTS => {
                    warn!(attempt, error = %e, "transient error, retrying after backoff");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
        unreachable!("loop always returns on the last attempt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{
        ApprovalDecision, BuildReport, CoreWebVitals, MetricsSnapshot, Screenshot,
    };
    use crate::discovery_fs::CandidateFile;
    use crate::model::{ChangePlan, DesignSpec, Dimension, PlannedChange, Recommendation};
    use crate::orchestrator::Specialist;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    fn config(dir: &std::path::Path) -> Config {
        Config {
            project_path: dir.to_path_buf(),
            output_dir: dir.join("out"),
            max_iterations: 3,
            target_score: 9.5,
            ..Default::default()
        }
    }

    struct FixedCapture;
    #[async_trait]
    impl CaptureAdapter for FixedCapture {
        async fn capture(&self, _request: ScreenshotRequest) -> Result<Screenshot> {
            Ok(Screenshot {
                data: vec![],
                path: "shot.png".into(),
                width: 1280,
                height: 800,
                taken_at: chrono::Utc::now(),
            })
        }
    }

    /// Returns one recommendation on the first call, none thereafter, so
    /// the loop naturally runs dry without a target/plateau signal.
    struct OneShotVision {
        calls: AtomicU32,
        score: f64,
    }

    #[async_trait]
    impl VisionAdapter for OneShotVision {
        async fn analyze(
            &self,
            _screenshot: &Screenshot,
            _memory_context: &str,
            _project_context: &[String],
            _avoided: &std::collections::BTreeSet<String>,
        ) -> Result<DesignSpec> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let recommendations = if call == 0 {
                vec![Recommendation {
                    id: "r1".into(),
                    dimension: Dimension::ColorContrast,
                    title: "improve button contrast".into(),
                    description: "d".into(),
                    impact: 8,
                    effort: 2,
                    code_hint: None,
                    target: Some("Button.tsx".into()),
                }]
            } else {
                vec![]
            };
            Ok(DesignSpec {
                current_score: self.score,
                issues: vec![],
                recommendations,
                project_context: vec![],
            })
        }
    }

    struct FixedMetrics;
    #[async_trait]
    impl MetricsAdapter for FixedMetrics {
        async fn capture(&self, _url: &str) -> Result<MetricsSnapshot> {
            Ok(MetricsSnapshot {
                core_web_vitals: CoreWebVitals { lcp: 1500.0, cls: 0.02, ttfb: 200.0, inp: None },
                ..Default::default()
            })
        }
    }

    struct AlwaysGreenBuild;
    #[async_trait]
    impl BuildAdapter for AlwaysGreenBuild {
        async fn build(&self, _project_root: &std::path::Path) -> Result<BuildReport> {
            Ok(BuildReport { success: true, stderr: String::new(), duration_ms: 5 })
        }
    }

    struct AutoApprove;
    #[async_trait]
    impl ApprovalSource for AutoApprove {
        async fn request(
            &self,
            request: crate::adapters::ApprovalRequest<'_>,
        ) -> Result<ApprovalDecision> {
            Ok(ApprovalDecision {
                approved: request.recommendations.to_vec(),
                skip_iteration: false,
            })
        }
    }

    struct ButtonSpecialist;
    #[async_trait]
    impl crate::adapters::ImplementationAdapter for ButtonSpecialist {
        async fn plan(
            &self,
            recommendation: &Recommendation,
            _candidates: &[CandidateFile],
        ) -> Result<ChangePlan> {
            let mut plan = ChangePlan::new(recommendation.id.clone());
            plan.changes.push(PlannedChange {
                file: "Button.tsx".into(),
                line: 1,
                tool: "updateClassName".into(),
                expected_current_line: String::new(),
                params: serde_json::json!({
                    "oldClassAttrValue": "px-2 bg-blue-500",
                    "newClassAttrValue": "px-2 bg-blue-600",
                }),
            });
            Ok(plan)
        }
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(vec![Specialist::new(
            "generic",
            "catch-all",
            |_: &Recommendation| 1,
            ButtonSpecialist,
        )])
    }

    async fn write_project(dir: &std::path::Path) {
        tokio::fs::write(dir.join("Button.tsx"), "<button class=\"px-2 bg-blue-500\">Go</button>\n")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn happy_path_applies_change_and_exhausts_iterations() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path()).await;

        let controller = IterationController::new(
            config(dir.path()),
            Box::new(FixedCapture),
            Box::new(OneShotVision { calls: AtomicU32::new(0), score: 7.0 }),
            Box::new(FixedMetrics),
            Box::new(AlwaysGreenBuild),
            Box::new(AutoApprove),
            orchestrator(),
        );

        let terminal = controller.run().await.unwrap();
        assert!(matches!(terminal, TerminalState::IterationsExhausted { .. }));

        let on_disk = tokio::fs::read_to_string(dir.path().join("Button.tsx")).await.unwrap();
        assert!(on_disk.contains("bg-blue-600"));
    }

    struct FailingBuild;
    #[async_trait]
    impl BuildAdapter for FailingBuild {
        async fn build(&self, _project_root: &std::path::Path) -> Result<BuildReport> {
            Ok(BuildReport { success: false, stderr: "type error".into(), duration_ms: 5 })
        }
    }

    #[tokio::test]
    async fn build_failure_rolls_back_and_records_broke_build() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path()).await;
        let original = tokio::fs::read_to_string(dir.path().join("Button.tsx")).await.unwrap();

        let controller = IterationController::new(
            config(dir.path()),
            Box::new(FixedCapture),
            Box::new(OneShotVision { calls: AtomicU32::new(0), score: 7.0 }),
            Box::new(FixedMetrics),
            Box::new(FailingBuild),
            Box::new(AutoApprove),
            orchestrator(),
        );

        controller.run().await.unwrap();

        let on_disk = tokio::fs::read_to_string(dir.path().join("Button.tsx")).await.unwrap();
        assert_eq!(on_disk, original);

        let snapshot = controller.memory.load().await.unwrap();
        assert!(snapshot
            .attempts
            .iter()
            .any(|a| a.outcome == Outcome::BrokeBuild));
    }

    struct RejectingApproval(Mutex<u32>);
    #[async_trait]
    impl ApprovalSource for RejectingApproval {
        async fn request(
            &self,
            _request: crate::adapters::ApprovalRequest<'_>,
        ) -> Result<ApprovalDecision> {
            *self.0.lock().unwrap() += 1;
            Ok(ApprovalDecision { approved: vec![], skip_iteration: true })
        }
    }

    #[tokio::test]
    async fn human_rejection_short_circuits_without_touching_files() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path()).await;
        let original = tokio::fs::read_to_string(dir.path().join("Button.tsx")).await.unwrap();

        let mut cfg = config(dir.path());
        cfg.approval.policy = crate::config::ApprovalPolicy::Always;

        let controller = IterationController::new(
            cfg,
            Box::new(FixedCapture),
            Box::new(OneShotVision { calls: AtomicU32::new(0), score: 7.0 }),
            Box::new(FixedMetrics),
            Box::new(AlwaysGreenBuild),
            Box::new(RejectingApproval(Mutex::new(0))),
            orchestrator(),
        );

        controller.run().await.unwrap();

        let on_disk = tokio::fs::read_to_string(dir.path().join("Button.tsx")).await.unwrap();
        assert_eq!(on_disk, original);
    }

    struct SlowCapture;
    #[async_trait]
    impl CaptureAdapter for SlowCapture {
        async fn capture(&self, _request: ScreenshotRequest) -> Result<Screenshot> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Screenshot {
                data: vec![],
                path: "shot.png".into(),
                width: 1280,
                height: 800,
                taken_at: chrono::Utc::now(),
            })
        }
    }

    #[tokio::test]
    async fn capture_exceeding_its_timeout_is_retried_then_reported_unrecoverable() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path()).await;

        let mut cfg = config(dir.path());
        cfg.timeouts.screenshot_secs = 0;

        let controller = IterationController::new(
            cfg,
            Box::new(SlowCapture),
            Box::new(OneShotVision { calls: AtomicU32::new(0), score: 7.0 }),
            Box::new(FixedMetrics),
            Box::new(AlwaysGreenBuild),
            Box::new(AutoApprove),
            orchestrator(),
        );

        let terminal = controller.run().await.unwrap();
        assert!(matches!(terminal, TerminalState::UnrecoverableError { .. }));
    }

    #[tokio::test]
    async fn cancellation_is_observed_before_the_next_iteration() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path()).await;

        let controller = IterationController::new(
            config(dir.path()),
            Box::new(FixedCapture),
            Box::new(OneShotVision { calls: AtomicU32::new(0), score: 7.0 }),
            Box::new(FixedMetrics),
            Box::new(AlwaysGreenBuild),
            Box::new(AutoApprove),
            orchestrator(),
        );
        controller.cancel_handle().store(true, Ordering::SeqCst);

        let terminal = controller.run().await.unwrap();
        assert!(matches!(terminal, TerminalState::Cancelled { iteration: 1 }));
    }
}

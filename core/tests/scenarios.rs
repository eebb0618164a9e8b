//! End-to-end scenarios driving the full `IterationController` state
//! machine against a real (tempdir) project, using the reference adapters
//! from `viztrtr_core::adapters::mock`. Build/run with
//! `--features test-adapters`.
//!
//! Complements the inline scenarios already covered in
//! `controller.rs`'s own unit tests (happy path, build-failure rollback,
//! human rejection) with the ones that need memory/validator state seeded
//! ahead of time: reaching the target score on the first iteration, a
//! design-system violation rejected before any write, a previously
//! avoided component filtered out before approval, and cancellation.

use std::sync::atomic::Ordering;

use async_trait::async_trait;

use viztrtr_core::adapters::mock::{
    AutoApproveAll, FixedBuild, FixedCapture, FixedMetrics, ScriptedVision,
};
use viztrtr_core::discovery_fs::CandidateFile;
use viztrtr_core::orchestrator::{Orchestrator, Specialist};
use viztrtr_core::{
    ChangePlan, Config, DesignSpec, Dimension, ImplementationAdapter, IterationController,
    Recommendation, TerminalState,
};

fn recommendation(id: &str, title: &str, target: &str) -> Recommendation {
    Recommendation {
        id: id.into(),
        dimension: Dimension::Spacing,
        title: title.into(),
        description: "d".into(),
        impact: 6,
        effort: 2,
        code_hint: None,
        target: Some(target.into()),
    }
}

fn design_spec(score: f64, recommendations: Vec<Recommendation>) -> DesignSpec {
    DesignSpec { current_score: score, issues: vec![], recommendations, project_context: vec![] }
}

async fn write_button(dir: &std::path::Path) {
    tokio::fs::write(dir.join("Button.tsx"), "<button class=\"px-2 bg-blue-500\">Go</button>\n")
        .await
        .unwrap();
}

fn base_config(dir: &std::path::Path) -> Config {
    Config {
        project_path: dir.to_path_buf(),
        output_dir: dir.join("out"),
        max_iterations: 2,
        target_score: 9.9,
        ..Default::default()
    }
}

/// Plans a single `updateClassName` on `Button.tsx`, regardless of the
/// recommendation handed to it.
struct ButtonClassNameSpecialist;

#[async_trait]
impl ImplementationAdapter for ButtonClassNameSpecialist {
    async fn plan(
        &self,
        recommendation: &Recommendation,
        _candidates: &[CandidateFile],
    ) -> viztrtr_core::Result<ChangePlan> {
        let mut plan = ChangePlan::new(recommendation.id.clone());
        plan.changes.push(viztrtr_core::PlannedChange {
            file: "Button.tsx".into(),
            line: 1,
            tool: "updateClassName".into(),
            expected_current_line: String::new(),
            params: serde_json::json!({
                "oldClassAttrValue": "px-2 bg-blue-500",
                "newClassAttrValue": "px-2 bg-blue-600 hover:bg-blue-700 focus:ring-2 focus:ring-offset-2",
            }),
        });
        Ok(plan)
    }
}

fn button_orchestrator() -> Orchestrator {
    Orchestrator::new(vec![Specialist::new(
        "generic",
        "catch-all",
        |_: &Recommendation| 1,
        ButtonClassNameSpecialist,
    )])
}

#[tokio::test]
async fn target_reached_on_first_iteration_stops_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    write_button(dir.path()).await;

    let mut config = base_config(dir.path());
    config.target_score = 8.0;

    let vision = ScriptedVision::new(vec![
        design_spec(6.0, vec![recommendation("r1", "tighten button spacing", "Button.tsx")]),
        design_spec(9.0, vec![]),
    ]);

    let controller = IterationController::new(
        config,
        Box::new(FixedCapture::new("shot.png")),
        Box::new(vision),
        Box::new(FixedMetrics::new(Default::default())),
        Box::new(FixedBuild::success()),
        Box::new(AutoApproveAll),
        button_orchestrator(),
    );

    let terminal = controller.run().await.unwrap();
    assert!(matches!(terminal, TerminalState::TargetReached { iteration: 1, .. }));

    let report_json = tokio::fs::read_to_string(dir.path().join("out/report.json")).await.unwrap();
    assert!(report_json.contains("\"TargetReached\""));
}

#[tokio::test]
async fn design_system_violation_is_rejected_before_any_write() {
    let dir = tempfile::tempdir().unwrap();
    write_button(dir.path()).await;
    let original = tokio::fs::read_to_string(dir.path().join("Button.tsx")).await.unwrap();

    let mut config = base_config(dir.path());
    config.max_iterations = 1;
    // The specialist's change introduces `bg-blue-600`; deny-list it so
    // the validator rejects the change before ExecutionAgent ever sees it.
    config.design_system.deny = vec!["bg-blue-600".to_string()];

    let vision = ScriptedVision::new(vec![design_spec(
        6.0,
        vec![recommendation("r1", "widen the hit target", "Button.tsx")],
    )]);

    let controller = IterationController::new(
        config,
        Box::new(FixedCapture::new("shot.png")),
        Box::new(vision),
        Box::new(FixedMetrics::new(Default::default())),
        Box::new(FixedBuild::success()),
        Box::new(AutoApproveAll),
        button_orchestrator(),
    );

    let terminal = controller.run().await.unwrap();
    assert!(matches!(terminal, TerminalState::IterationsExhausted { .. }));

    let on_disk = tokio::fs::read_to_string(dir.path().join("Button.tsx")).await.unwrap();
    assert_eq!(on_disk, original, "a scope-rejected change must never be written");
}

#[tokio::test]
async fn previously_avoided_component_is_filtered_out_before_approval() {
    let dir = tempfile::tempdir().unwrap();
    write_button(dir.path()).await;
    let original = tokio::fs::read_to_string(dir.path().join("Button.tsx")).await.unwrap();

    let mut config = base_config(dir.path());
    config.max_iterations = 1;

    // Seed enough prior broke-build attempts against Button.tsx that
    // `ComponentStats::should_avoid` trips (>=5 modifications, >=4
    // failures) before the controller ever runs.
    let memory = viztrtr_core::MemoryStore::new(config.output_dir.clone(), config.match_strategy);
    memory
        .mutate(|snapshot| {
            for i in 0..5 {
                let outcome = if i < 4 {
                    viztrtr_core::Outcome::BrokeBuild
                } else {
                    viztrtr_core::Outcome::Success
                };
                snapshot.record_attempt(
                    viztrtr_core::AttemptRecord::new(i, format!("old-{i}"), "old attempt".into(), outcome)
                        .with_touched_files(vec!["Button.tsx".to_string()]),
                );
            }
        })
        .await
        .unwrap();

    let vision = ScriptedVision::new(vec![design_spec(
        6.0,
        vec![recommendation("r-new", "restyle the primary button", "Button.tsx")],
    )]);

    let controller = IterationController::new(
        config,
        Box::new(FixedCapture::new("shot.png")),
        Box::new(vision),
        Box::new(FixedMetrics::new(Default::default())),
        Box::new(FixedBuild::success()),
        Box::new(AutoApproveAll),
        button_orchestrator(),
    );

    let terminal = controller.run().await.unwrap();
    assert!(matches!(terminal, TerminalState::IterationsExhausted { .. }));

    let on_disk = tokio::fs::read_to_string(dir.path().join("Button.tsx")).await.unwrap();
    assert_eq!(on_disk, original, "an avoided component must never be touched again");
}

#[tokio::test]
async fn cooperative_cancellation_stops_before_a_second_iteration_runs() {
    let dir = tempfile::tempdir().unwrap();
    write_button(dir.path()).await;

    let mut config = base_config(dir.path());
    config.max_iterations = 5;

    let vision = ScriptedVision::new(vec![design_spec(6.0, vec![])]);

    let controller = IterationController::new(
        config,
        Box::new(FixedCapture::new("shot.png")),
        Box::new(vision),
        Box::new(FixedMetrics::new(Default::default())),
        Box::new(FixedBuild::success()),
        Box::new(AutoApproveAll),
        button_orchestrator(),
    );

    // Cancel from the very first iteration: the loop must observe it at
    // the next stage boundary rather than running to iteration exhaustion.
    let cancel = controller.cancel_handle();
    cancel.store(true, Ordering::SeqCst);

    let terminal = controller.run().await.unwrap();
    assert!(matches!(terminal, TerminalState::Cancelled { iteration: 1 }));
}

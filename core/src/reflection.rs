//! C11: ReflectionAgent, turns one iteration's result into lessons and a
//! continue/rollback/stop signal for the controller.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::PlateauConfig;
use crate::model::{IterationResult, MemorySnapshot, Trend};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReflectionDecision {
    pub lessons: Vec<String>,
    pub should_rollback: bool,
    pub should_continue: bool,
    pub next_steps: Vec<String>,
}

pub struct ReflectionAgent {
    pub regression_threshold: f64,
    pub target_score: f64,
    pub plateau: PlateauConfig,
}

impl ReflectionAgent {
    pub fn new(regression_threshold: f64, target_score: f64, plateau: PlateauConfig) -> Self {
        Self {
            regression_threshold,
            target_score,
            plateau,
        }
    }

    /// `previous_score` is the composite from the iteration before this
    /// one, if any (the first iteration has none to compare against).
    #[instrument(skip(self, iteration, memory))]
    pub fn reflect(
        &self,
        iteration: &IterationResult,
        previous_score: Option<f64>,
        memory: &MemorySnapshot,
    ) -> ReflectionDecision {
        let mut lessons = Vec::new();
        let mut next_steps = Vec::new();

        let composite = iteration.score.as_ref().map(|s| s.composite_score);
        let delta = match (composite, previous_score) {
            (Some(current), Some(previous)) => Some(current - previous),
            _ => None,
        };

        let regressed = delta.is_some_and(|d| d < self.regression_threshold);
        if regressed {
            lessons.push(format!(
                "composite score dropped by {:.2}, below the regression floor of {:.2}",
                delta.unwrap(),
                self.regression_threshold
            ));
            next_steps.push("roll back this iteration's file changes".to_string());
        }

        let target_reached = composite.is_some_and(|c| c >= self.target_score);
        if target_reached {
            lessons.push(format!(
                "composite score {:.2} reached the target of {:.2}",
                composite.unwrap(),
                self.target_score
            ));
        }

        let plateaued = self.is_plateaued(memory);
        if plateaued {
            lessons.push(format!(
                "score has moved less than {:.2} over the last {} iterations, plateau reached",
                self.plateau.epsilon, self.plateau.window_iterations
            ));
        }

        if !iteration.file_changes.is_empty() && !regressed {
            lessons.push(format!(
                "{} file change(s) applied cleanly this iteration",
                iteration.file_changes.len()
            ));
        }

        for rejected in iteration
            .validations
            .iter()
            .filter(|v| !v.valid)
        {
            for violation in &rejected.violations {
                next_steps.push(format!("revisit: {}", violation.message));
            }
        }

        match memory.trend() {
            Trend::Regressing => {
                next_steps.push("favor smaller, lower-effort recommendations next iteration".to_string())
            }
            Trend::Flat => next_steps.push("try a different dimension next iteration".to_string()),
            Trend::Improving => {}
        }

        let should_continue = !regressed && !target_reached && !plateaued;

        ReflectionDecision {
            lessons,
            should_rollback: regressed,
            should_continue,
            next_steps,
        }
    }

    /// True once the score has barely moved over the configured window.
    fn is_plateaued(&self, memory: &MemorySnapshot) -> bool {
        let window = self.plateau.window_iterations as usize;
        if window == 0 || memory.score_history.len() < window {
            return false;
        }
        let recent = &memory.score_history[memory.score_history.len() - window..];
        recent.iter().all(|entry| entry.delta.abs() < self.plateau.epsilon)
    }
}

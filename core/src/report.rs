//! End-of-run artifacts: `report.json` (the whole `RunReport`, machine
//! readable) and `REPORT.md` (a prose summary) written to `output_dir`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::controller::TerminalState;
use crate::error::{Error, Result};
use crate::model::IterationResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub project_path: PathBuf,
    pub terminal: TerminalState,
    pub iterations: Vec<IterationResult>,
}

impl RunReport {
    pub fn new(
        project_path: impl Into<PathBuf>,
        terminal: TerminalState,
        iterations: Vec<IterationResult>,
    ) -> Self {
        Self {
            project_path: project_path.into(),
            terminal,
            iterations,
        }
    }

    /// Composite score from the most recent iteration that reached a
    /// scoring stage, if any did.
    pub fn final_score(&self) -> Option<f64> {
        self.iterations
            .iter()
            .rev()
            .find_map(|it| it.score.as_ref())
            .map(|s| s.composite_score)
    }

    /// Writes both artifacts into `output_dir`, creating it if necessary,
    /// and returns the path to `REPORT.md`.
    pub async fn write(&self, output_dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| Error::FileIO(e.to_string()))?;

        let json_path = output_dir.join("report.json");
        let serialized = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(&json_path, serialized)
            .await
            .map_err(|e| Error::FileIO(e.to_string()))?;

        let markdown_path = output_dir.join("REPORT.md");
        tokio::fs::write(&markdown_path, self.to_markdown())
            .await
            .map_err(|e| Error::FileIO(e.to_string()))?;

        Ok(markdown_path)
    }

    fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# VIZTRTR run report\n\n");
        out.push_str(&format!("Project: `{}`\n\n", self.project_path.display()));
        out.push_str(&format!("Outcome: {}\n\n", describe_terminal(&self.terminal)));
        if let Some(score) = self.final_score() {
            out.push_str(&format!("Final composite score: {score:.2}\n\n"));
        }

        out.push_str("## Iterations\n\n");
        out.push_str("| # | action | composite | file changes |\n");
        out.push_str("|---|--------|-----------|---------------|\n");
        for it in &self.iterations {
            let composite = it
                .score
                .as_ref()
                .map(|s| format!("{:.2}", s.composite_score))
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                it.iteration,
                it.next_action,
                composite,
                it.file_changes.len()
            ));
        }

        let lessons: Vec<&str> = self
            .iterations
            .iter()
            .filter_map(|it| it.reflection.as_deref())
            .filter(|r| !r.is_empty())
            .collect();
        if !lessons.is_empty() {
            out.push_str("\n## Reflections\n\n");
            for (it, lesson) in self.iterations.iter().zip(lessons) {
                out.push_str(&format!("- iteration {}: {}\n", it.iteration, lesson));
            }
        }

        out
    }
}

fn describe_terminal(terminal: &TerminalState) -> String {
    match terminal {
        TerminalState::TargetReached { iteration, composite_score } => {
            format!("target reached at iteration {iteration} (score {composite_score:.2})")
        }
        TerminalState::IterationsExhausted { iterations_run } => {
            format!("iterations exhausted after {iterations_run}")
        }
        TerminalState::Plateaued { iteration } => format!("plateaued at iteration {iteration}"),
        TerminalState::Cancelled { iteration } => format!("cancelled at iteration {iteration}"),
        TerminalState::UnrecoverableError { iteration, message } => {
            format!("unrecoverable error at iteration {iteration}: {message}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IterationResult;

    #[tokio::test]
    async fn writes_json_and_markdown_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut iteration = IterationResult::new(1, "before.png");
        iteration.finish("continue");

        let report = RunReport::new(
            "/tmp/project",
            TerminalState::IterationsExhausted { iterations_run: 1 },
            vec![iteration],
        );

        let markdown_path = report.write(dir.path()).await.unwrap();
        assert_eq!(markdown_path, dir.path().join("REPORT.md"));

        let markdown = tokio::fs::read_to_string(&markdown_path).await.unwrap();
        assert!(markdown.contains("iterations exhausted after 1"));

        let json = tokio::fs::read_to_string(dir.path().join("report.json")).await.unwrap();
        assert!(json.contains("\"iterations_run\": 1"));
    }

    #[test]
    fn final_score_is_the_last_scored_iteration() {
        let mut first = IterationResult::new(1, "a.png");
        first.score = Some(crate::model::HybridScore::compute(
            7.0,
            7.0,
            crate::model::MetricsBreakdown::default(),
            0.5,
            0.5,
        ));
        let second = IterationResult::new(2, "b.png");

        let report = RunReport::new(
            "/tmp/project",
            TerminalState::IterationsExhausted { iterations_run: 2 },
            vec![first, second],
        );

        assert!((report.final_score().unwrap() - 7.0).abs() < 1e-9);
    }
}

//! C8: Orchestrator/router, groups approved recommendations by
//! specialist and runs Discovery -> Validate -> Execute once per
//! (specialist, recommendation), bounded by a concurrency cap.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::adapters::ImplementationAdapter;
use crate::config::Constraints;
use crate::discovery::DiscoveryAgent;
use crate::discovery_fs::CandidateFile;
use crate::error::Result;
use crate::execution::{ExecutionAgent, ExecutionReport};
use crate::model::Recommendation;
use crate::paths::Paths;
use crate::toolkit::MicroEditToolkit;
use crate::validator::ChangeValidator;

/// A registered implementor: a domain description for display/logging and
/// a predicate scoring how well a recommendation matches its domain.
/// Higher scores win; a score of 0 means "does not match".
pub struct Specialist {
    pub name: String,
    pub domain_description: String,
    pub predicate: Box<dyn Fn(&Recommendation) -> u32 + Send + Sync>,
    pub adapter: Box<dyn ImplementationAdapter>,
}

impl Specialist {
    pub fn new(
        name: impl Into<String>,
        domain_description: impl Into<String>,
        predicate: impl Fn(&Recommendation) -> u32 + Send + Sync + 'static,
        adapter: impl ImplementationAdapter + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            domain_description: domain_description.into(),
            predicate: Box::new(predicate),
            adapter: Box::new(adapter),
        }
    }
}

pub struct Orchestrator {
    specialists: Vec<Specialist>,
    default_specialist_index: usize,
    concurrency_cap: usize,
    discovery_timeout: Duration,
}

impl Orchestrator {
    /// `specialists` must be non-empty; `specialists[0]` is the default
    /// used when nothing matches, unless a different default is set via
    /// `with_default`.
    pub fn new(specialists: Vec<Specialist>) -> Self {
        let concurrency_cap = specialists.len().max(1);
        Self {
            specialists,
            default_specialist_index: 0,
            concurrency_cap,
            discovery_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_concurrency_cap(mut self, cap: usize) -> Self {
        self.concurrency_cap = cap.max(1);
        self
    }

    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    pub fn with_default(mut self, index: usize) -> Self {
        assert!(index < self.specialists.len());
        self.default_specialist_index = index;
        self
    }

    /// Highest-scoring specialist, falling back to the default when no
    /// predicate matches.
    fn route(&self, recommendation: &Recommendation) -> usize {
        let mut best_index = self.default_specialist_index;
        let mut best_score = 0u32;
        for (index, specialist) in self.specialists.iter().enumerate() {
            let score = (specialist.predicate)(recommendation);
            if score > best_score {
                best_score = score;
                best_index = index;
            }
        }
        best_index
    }

    /// Run Discovery -> Validate -> Execute for every approved
    /// recommendation, bounded by the concurrency cap, and combine the
    /// per-recommendation reports into one.
    ///
    /// `candidates` partitions the recommendation's writable file surface;
    /// the router assigns disjoint file sets wherever it groups
    /// recommendations onto distinct specialists, so collisions serialize
    /// naturally through the toolkit's per-path lock rather than needing
    /// extra bookkeeping here.
    #[instrument(skip_all)]
    pub async fn run(
        &self,
        recommendations: Vec<Recommendation>,
        candidates_for: impl Fn(&Recommendation) -> Vec<CandidateFile>,
        toolkit: &MicroEditToolkit,
        validator: &ChangeValidator,
        constraints: &Constraints,
    ) -> ExecutionReport {
        let semaphore = Arc::new(Semaphore::new(self.concurrency_cap));
        let mut touched_files: HashSet<String> = HashSet::new();

        let tasks = recommendations.into_iter().map(|recommendation| {
            let specialist_index = self.route(&recommendation);
            let specialist = &self.specialists[specialist_index];
            let candidates = candidates_for(&recommendation);
            let semaphore = Arc::clone(&semaphore);

            info!(
                specialist = specialist.name,
                recommendation = recommendation.id,
                "routed recommendation"
            );

            let discovery_timeout = self.discovery_timeout;

            async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                run_one(
                    specialist,
                    recommendation,
                    candidates,
                    toolkit,
                    validator,
                    constraints,
                    discovery_timeout,
                )
                .await
            }
        });

        let reports: Vec<ExecutionReport> = join_all(tasks).await;

        let mut combined = ExecutionReport::default();
        for report in reports {
            for file in report.touched_files() {
                if !touched_files.insert(file.clone()) {
                    warn!(file, "two specialists touched the same file in one iteration");
                }
            }
            combined.outcomes.extend(report.outcomes);
            combined.file_changes.extend(report.file_changes);
            combined.validations.extend(report.validations);
        }
        combined
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_one(
    specialist: &Specialist,
    recommendation: Recommendation,
    candidates: Vec<CandidateFile>,
    toolkit: &MicroEditToolkit,
    validator: &ChangeValidator,
    _constraints: &Constraints,
    discovery_timeout: Duration,
) -> ExecutionReport {
    let discovery = DiscoveryAgent::new(specialist.adapter.as_ref(), discovery_timeout);
    let plan = match discovery.discover(&recommendation, &candidates).await {
        Ok(plan) => plan,
        Err(e) => {
            warn!(error = %e, recommendation = recommendation.id, "discovery failed, skipping recommendation");
            return ExecutionReport::default();
        }
    };

    // Validate every target file's (original, modified) pair before any
    // write: simulate the planned change against current content.
    let mut approved_changes = plan.clone();
    approved_changes.changes.clear();
    let mut validations = Vec::new();

    for change in &plan.changes {
        let (current, modified) = match toolkit.preview(change).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(file = change.file, error = %e, "preview failed, excluded from execution");
                continue;
            }
        };
        let component_name = component_name_for(&change.file);
        let result = match validator
            .validate(
                &component_name,
                &current,
                &modified,
                recommendation.effort,
                recommendation.impact,
            )
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(file = change.file, error = %e, "validator I/O error, excluded from execution");
                continue;
            }
        };
        if result.valid {
            approved_changes.changes.push(change.clone());
        } else {
            warn!(
                file = change.file,
                violations = result.violations.len(),
                "change rejected by validator, excluded from execution"
            );
        }
        validations.push(result);
    }

    let execution = ExecutionAgent::new(toolkit);
    let mut report = execution.execute(&approved_changes).await;
    report.validations = validations;
    report
}

fn component_name_for(file: &str) -> String {
    std::path::Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChangePlan, Dimension};
    use async_trait::async_trait;

    fn recommendation(id: &str, title: &str) -> Recommendation {
        Recommendation {
            id: id.into(),
            dimension: Dimension::ColorContrast,
            title: title.into(),
            description: "d".into(),
            impact: 5,
            effort: 2,
            code_hint: None,
            target: None,
        }
    }

    struct NoopAdapter;

    #[async_trait]
    impl ImplementationAdapter for NoopAdapter {
        async fn plan(
            &self,
            recommendation: &Recommendation,
            _candidates: &[CandidateFile],
        ) -> Result<ChangePlan> {
            Ok(ChangePlan::new(recommendation.id.clone()))
        }
    }

    #[test]
    fn routes_to_highest_scoring_predicate() {
        let dark = Specialist::new(
            "dark-theme",
            "dark theme control panel",
            |r: &Recommendation| if r.title.contains("dark") { 10 } else { 0 },
            NoopAdapter,
        );
        let forms = Specialist::new(
            "forms",
            "form inputs",
            |r: &Recommendation| if r.title.contains("form") { 5 } else { 0 },
            NoopAdapter,
        );
        let orchestrator = Orchestrator::new(vec![dark, forms]);
        let index = orchestrator.route(&recommendation("r1", "fix dark mode contrast"));
        assert_eq!(index, 0);
    }

    #[test]
    fn falls_back_to_default_when_nothing_matches() {
        let dark = Specialist::new(
            "dark-theme",
            "dark theme control panel",
            |r: &Recommendation| if r.title.contains("dark") { 10 } else { 0 },
            NoopAdapter,
        );
        let generic = Specialist::new("generic", "catch-all", |_: &Recommendation| 0, NoopAdapter);
        let orchestrator = Orchestrator::new(vec![dark, generic]).with_default(1);
        let index = orchestrator.route(&recommendation("r1", "improve spacing"));
        assert_eq!(index, 1);
    }

    #[test]
    fn default_concurrency_cap_matches_specialist_count() {
        let a = Specialist::new("a", "a", |_: &Recommendation| 1, NoopAdapter);
        let b = Specialist::new("b", "b", |_: &Recommendation| 1, NoopAdapter);
        let orchestrator = Orchestrator::new(vec![a, b]);
        assert_eq!(orchestrator.concurrency_cap, 2);
    }
}

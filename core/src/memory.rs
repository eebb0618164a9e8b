//! C1: MemoryStore, a single locked JSON document at
//! `<output_dir>/memory/iteration-memory.json`, plus the prose context
//! summary handed to the vision adapter on the next iteration.

use std::path::PathBuf;
use std::time::Duration;

use tracing::instrument;

use crate::config::MatchStrategy;
use crate::error::{Error, Result};
use crate::model::{AttemptRecord, MemorySnapshot, Recommendation, ScoreHistoryEntry, Trend};

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(25);
const LOCK_MAX_ATTEMPTS: u32 = 200;

pub struct MemoryStore {
    document_path: PathBuf,
    lock_path: PathBuf,
    match_strategy: MatchStrategy,
}

impl MemoryStore {
    pub fn new(output_dir: impl Into<PathBuf>, match_strategy: MatchStrategy) -> Self {
        let memory_dir = output_dir.into().join("memory");
        Self {
            document_path: memory_dir.join("iteration-memory.json"),
            lock_path: memory_dir.join("iteration-memory.json.lock"),
            match_strategy,
        }
    }

    /// Read the current snapshot, or an empty one if the document does not
    /// exist yet. Does not take the lock: a concurrent writer mid-rename is
    /// never observed as a half-written file, since writes go through a
    /// temp-file-then-rename just like the toolkit's.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<MemorySnapshot> {
        match tokio::fs::read(&self.document_path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(MemorySnapshot::new()),
            Err(e) => Err(Error::MemoryStorage(e.to_string())),
        }
    }

    /// Load, apply `mutator`, and persist the result, holding an advisory
    /// lock for the whole read-modify-write so two controller instances
    /// never interleave on the same document.
    #[instrument(skip(self, mutator))]
    pub async fn mutate<F>(&self, mutator: F) -> Result<MemorySnapshot>
    where
        F: FnOnce(&mut MemorySnapshot),
    {
        let _guard = self.acquire_lock().await?;
        let mut snapshot = self.load().await?;
        mutator(&mut snapshot);
        self.write(&snapshot).await?;
        Ok(snapshot)
    }

    pub async fn record_attempt(&self, attempt: AttemptRecord) -> Result<MemorySnapshot> {
        self.mutate(|snapshot| snapshot.record_attempt(attempt)).await
    }

    pub async fn record_score(&self, entry: ScoreHistoryEntry) -> Result<MemorySnapshot> {
        self.mutate(|snapshot| snapshot.record_score(entry)).await
    }

    /// The prior failed/broke-build attempt `recommendation` matches, per
    /// the configured match strategy, if any.
    pub fn was_attempted<'a>(
        &self,
        recommendation: &Recommendation,
        snapshot: &'a MemorySnapshot,
    ) -> Option<&'a AttemptRecord> {
        snapshot.failed_attempts().find(|attempt| match self.match_strategy {
            MatchStrategy::IdEquality => attempt.recommendation_id == recommendation.id,
            MatchStrategy::FuzzyTitle => {
                normalize_title(&attempt.recommendation_title) == recommendation.normalized_title()
            }
        })
    }

    pub fn get_avoided_components(&self, snapshot: &MemorySnapshot) -> std::collections::BTreeSet<String> {
        snapshot.avoided_components()
    }

    /// Prose summary handed to the vision adapter as `memory_context`:
    /// trend, recent attempts, failed attempts to never retry, and
    /// components to avoid with their rationale.
    pub fn get_context_summary(&self, snapshot: &MemorySnapshot) -> String {
        let mut out = String::new();

        let trend = snapshot.trend();
        match snapshot.last_delta() {
            Some(delta) => {
                out.push_str(&format!("Score trend: {trend} (last delta {delta:+.2}).\n"));
            }
            None => out.push_str("Score trend: no history yet.\n"),
        }

        if matches!(trend, Trend::Regressing) {
            out.push_str("The last change regressed the score; prefer smaller, lower-risk edits.\n");
        }

        let recent: Vec<&AttemptRecord> = snapshot.attempts.iter().rev().take(5).collect();
        if !recent.is_empty() {
            out.push_str("\nRecent attempts:\n");
            for attempt in recent.iter().rev() {
                out.push_str(&format!(
                    "- [{}] {} ({:?})\n",
                    attempt.iteration, attempt.recommendation_title, attempt.outcome
                ));
            }
        }

        let failed: Vec<&AttemptRecord> = snapshot.failed_attempts().collect();
        if !failed.is_empty() {
            out.push_str("\nFAILED ATTEMPTS - DO NOT RETRY:\n");
            for attempt in &failed {
                out.push_str(&format!(
                    "- {} ({:?}{})\n",
                    attempt.recommendation_title,
                    attempt.outcome,
                    attempt
                        .reason
                        .as_ref()
                        .map(|r| format!(": {r}"))
                        .unwrap_or_default()
                ));
            }
        }

        let frequent: Vec<(&String, &crate::model::ComponentStats)> = snapshot
            .component_stats
            .iter()
            .filter(|(_, stats)| stats.modification_count >= 3)
            .collect();
        if !frequent.is_empty() {
            out.push_str("\nFrequently modified components:\n");
            for (path, stats) in &frequent {
                out.push_str(&format!(
                    "- {path}: {} modifications, {} failures\n",
                    stats.modification_count, stats.failure_count
                ));
            }
        }

        let avoided = snapshot.avoided_components();
        if !avoided.is_empty() {
            out.push_str("\nCOMPONENTS TO AVOID:\n");
            for path in &avoided {
                let stats = &snapshot.component_stats[path];
                out.push_str(&format!(
                    "- {path}: {} of {} attempts failed, treat as high-risk\n",
                    stats.failure_count, stats.modification_count
                ));
            }
        }

        out
    }

    async fn write(&self, snapshot: &MemorySnapshot) -> Result<()> {
        let dir = self
            .document_path
            .parent()
            .ok_or_else(|| Error::MemoryStorage("memory document has no parent directory".into()))?;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::MemoryStorage(e.to_string()))?;

        let serialized = serde_json::to_vec_pretty(snapshot)?;
        let tmp_path = {
            let mut name = self.document_path.as_os_str().to_os_string();
            name.push(".viztrtr-tmp");
            PathBuf::from(name)
        };
        tokio::fs::write(&tmp_path, &serialized)
            .await
            .map_err(|e| Error::MemoryStorage(e.to_string()))?;
        tokio::fs::rename(&tmp_path, &self.document_path)
            .await
            .map_err(|e| Error::MemoryStorage(e.to_string()))
    }

    /// Advisory cross-process lock via a sibling `.lock` file created with
    /// O_EXCL semantics (`create_new`). No file-locking crate is pulled in
    /// for this: a single `create_new`/retry loop is all the guarantee a
    /// single-writer-at-a-time document needs.
    async fn acquire_lock(&self) -> Result<LockGuard> {
        if let Some(dir) = self.lock_path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| Error::MemoryStorage(e.to_string()))?;
        }

        for _ in 0..LOCK_MAX_ATTEMPTS {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.lock_path)
                .await
            {
                Ok(_) => return Ok(LockGuard { path: self.lock_path.clone() }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    tokio::time::sleep(LOCK_RETRY_INTERVAL).await;
                }
                Err(e) => return Err(Error::MemoryStorage(e.to_string())),
            }
        }

        Err(Error::MemoryStorage(format!(
            "timed out waiting for lock at {}",
            self.lock_path.display()
        )))
    }
}

/// Releases the advisory lock file on drop, best-effort.
struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dimension, Outcome};

    fn recommendation(id: &str, title: &str) -> Recommendation {
        Recommendation {
            id: id.into(),
            dimension: Dimension::Spacing,
            title: title.into(),
            description: "d".into(),
            impact: 5,
            effort: 3,
            code_hint: None,
            target: None,
        }
    }

    #[tokio::test]
    async fn load_on_missing_document_returns_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path(), MatchStrategy::IdEquality);
        let snapshot = store.load().await.unwrap();
        assert!(snapshot.attempts.is_empty());
    }

    #[tokio::test]
    async fn record_attempt_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path(), MatchStrategy::IdEquality);
        store
            .record_attempt(AttemptRecord::new(1, "r1", "Fix spacing", Outcome::Success))
            .await
            .unwrap();

        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded.attempts.len(), 1);
        assert_eq!(reloaded.attempts[0].recommendation_id, "r1");
    }

    #[tokio::test]
    async fn id_equality_strategy_requires_exact_id_match() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path(), MatchStrategy::IdEquality);
        let snapshot = store
            .record_attempt(AttemptRecord::new(1, "r1", "Fix spacing", Outcome::Failed))
            .await
            .unwrap();

        assert!(store.was_attempted(&recommendation("r1", "Different title"), &snapshot).is_some());
        assert!(store.was_attempted(&recommendation("r2", "Fix spacing"), &snapshot).is_none());
    }

    #[tokio::test]
    async fn fuzzy_title_strategy_ignores_id_and_punctuation() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path(), MatchStrategy::FuzzyTitle);
        let snapshot = store
            .record_attempt(AttemptRecord::new(1, "r1", "Fix Button Spacing!", Outcome::BrokeBuild))
            .await
            .unwrap();

        assert!(store
            .was_attempted(&recommendation("different-id", "fix button spacing"), &snapshot)
            .is_some());
    }

    #[tokio::test]
    async fn context_summary_lists_failed_attempts_and_avoided_components() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path(), MatchStrategy::IdEquality);

        for _ in 0..4 {
            store
                .record_attempt(
                    AttemptRecord::new(1, "r1", "Rework header", Outcome::BrokeBuild)
                        .with_touched_files(vec!["Header.tsx".into()]),
                )
                .await
                .unwrap();
        }
        let snapshot = store
            .record_attempt(
                AttemptRecord::new(1, "r1", "Rework header", Outcome::Success)
                    .with_touched_files(vec!["Header.tsx".into()]),
            )
            .await
            .unwrap();

        let summary = store.get_context_summary(&snapshot);
        assert!(summary.contains("FAILED ATTEMPTS"));
        assert!(summary.contains("COMPONENTS TO AVOID"));
        assert!(summary.contains("Header.tsx"));
    }

    #[tokio::test]
    async fn concurrent_mutations_do_not_lose_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(MemoryStore::new(dir.path(), MatchStrategy::IdEquality));

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .record_attempt(AttemptRecord::new(1, format!("r{i}"), "t", Outcome::Success))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = store.load().await.unwrap();
        assert_eq!(snapshot.attempts.len(), 8);
    }
}

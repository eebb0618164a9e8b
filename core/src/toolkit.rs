//! C2: MicroEditToolkit, the only writer to project files.
//!
//! Four atomic, single-line, single-purpose edit operations. This is the
//! chokepoint that guarantees no agent can rewrite a file wholesale: every
//! other component that wants to touch a file goes through one of these
//! four methods.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::error::{Error, Result};
use crate::model::{FileChange, PlannedChange};
use crate::paths::Paths;

/// Names of the four exposed operations, used by ChangePlan/PlannedChange
/// and validated against by DiscoveryAgent.
pub const TOOL_NAMES: &[&str] = &[
    "updateClassName",
    "appendToClassName",
    "updateStyleValue",
    "updateTextContent",
];

/// Result of locating a target line, possibly via the ±N fallback search.
struct Located {
    line_index: usize,
    original_content: String,
}

pub struct MicroEditToolkit {
    paths: Paths,
    fallback_radius: usize,
    /// Bound on a single `apply_change` call, guarding against a stuck
    /// lock holder rather than any expected slowness in local file I/O.
    timeout: Duration,
    /// Original path -> backup path, in first-touch order, for this
    /// iteration only.
    backups: Mutex<HashMap<PathBuf, PathBuf>>,
    backup_order: Mutex<Vec<PathBuf>>,
    /// Per-path write serialization.
    path_locks: std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl MicroEditToolkit {
    pub fn new(paths: Paths, fallback_radius: usize, timeout: Duration) -> Self {
        Self {
            paths,
            fallback_radius,
            timeout,
            backups: Mutex::new(HashMap::new()),
            backup_order: Mutex::new(Vec::new()),
            path_locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, path: &Path) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .path_locks
            .lock()
            .map_err(|_| Error::Internal("path lock map poisoned".into()))?;
        Ok(locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    async fn ensure_backup(&self, resolved: &Path, content: &str) -> Result<()> {
        let mut backups = self.backups.lock().await;
        if backups.contains_key(resolved) {
            return Ok(());
        }
        let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S%.f");
        let backup_path = {
            let mut name = resolved.as_os_str().to_os_string();
            name.push(format!(".viztrtr-backup-{timestamp}"));
            PathBuf::from(name)
        };
        tokio::fs::write(&backup_path, content)
            .await
            .map_err(|e| Error::FileIO(e.to_string()))?;
        backups.insert(resolved.to_path_buf(), backup_path.clone());
        self.backup_order.lock().await.push(resolved.to_path_buf());
        Ok(())
    }

    async fn read_resolved(&self, path: &str) -> Result<(PathBuf, String)> {
        let resolved = self.paths.resolve(path)?;
        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| Error::FileIO(e.to_string()))?;
        Ok((resolved, content))
    }

    /// Locate a line containing `needle` (whitespace-insensitive), starting
    /// at 1-based `line`, falling back to a ±`fallback_radius` search. When
    /// `expected_current_line` is non-empty, a candidate must also match it
    /// exactly (whitespace-insensitive); this is the stale-line guard: a
    /// plan whose target line changed underneath it still contains the
    /// needle token but no longer matches the line discovery last read.
    fn locate(&self, content: &str, line: usize, needle: &str, expected_current_line: &str) -> Result<Located> {
        let lines: Vec<&str> = content.lines().collect();
        if line == 0 {
            return Err(Error::LineMismatch {
                path: String::new(),
                line,
                radius: self.fallback_radius,
            });
        }
        let target_index = line - 1;
        let matches = |candidate: &str| {
            normalize_ws(candidate).contains(&normalize_ws(needle))
                && (expected_current_line.is_empty()
                    || normalize_ws(candidate) == normalize_ws(expected_current_line))
        };

        if let Some(text) = lines.get(target_index) {
            if matches(text) {
                return Ok(Located {
                    line_index: target_index,
                    original_content: (*text).to_string(),
                });
            }
        }

        for delta in 1..=self.fallback_radius {
            for candidate in [target_index.checked_sub(delta), Some(target_index + delta)]
                .into_iter()
                .flatten()
            {
                if let Some(text) = lines.get(candidate) {
                    if matches(text) {
                        return Ok(Located {
                            line_index: candidate,
                            original_content: (*text).to_string(),
                        });
                    }
                }
            }
        }

        Err(Error::LineMismatch {
            path: String::new(),
            line,
            radius: self.fallback_radius,
        })
    }

    /// Compute the modified line and line index for a `PlannedChange`
    /// without writing anything, so `ChangeValidator` can inspect the
    /// resulting (original, modified) pair before `ExecutionAgent` commits
    /// it for real. Reuses the exact locate/transform logic the real
    /// operations use, so a plan that previews clean is guaranteed to
    /// apply identically absent a concurrent external edit.
    pub async fn preview(&self, change: &PlannedChange) -> Result<(String, String)> {
        let (_, content) = self.read_resolved(&change.file).await?;
        let (line_index, new_line) = self.locate_and_transform(&content, change)?;
        let new_full = compose_new_full(&content, line_index, &new_line);
        Ok((content, new_full))
    }

    /// The single dispatch point every edit operation funnels through,
    /// whether called via `preview`/`apply_change` from a `PlannedChange`
    /// or via one of the four convenience wrappers below. Checks
    /// `change.expected_current_line` (when given) as part of locating the
    /// target line, so a plan whose line changed underneath it is rejected
    /// rather than silently applied against the wrong content.
    fn locate_and_transform(&self, content: &str, change: &PlannedChange) -> Result<(usize, String)> {
        let malformed = |key: &str| {
            Error::PlanMalformed(format!("missing string parameter `{key}` for tool {}", change.tool))
        };
        let mismatch = || Error::LineMismatch {
            path: change.file.clone(),
            line: change.line,
            radius: self.fallback_radius,
        };
        let expected = change.expected_current_line.as_str();
        match change.tool.as_str() {
            "updateClassName" => {
                let old = change.params.get("oldClassAttrValue").and_then(|v| v.as_str()).ok_or_else(|| malformed("oldClassAttrValue"))?;
                let new = change.params.get("newClassAttrValue").and_then(|v| v.as_str()).ok_or_else(|| malformed("newClassAttrValue"))?;
                let located = self.locate(content, change.line, old, expected).map_err(|_| mismatch())?;
                let replaced = replace_attr_value(&located.original_content, old, new).ok_or_else(mismatch)?;
                Ok((located.line_index, replaced))
            }
            "appendToClassName" => {
                let additional = change.params.get("additionalClasses").and_then(|v| v.as_str()).ok_or_else(|| malformed("additionalClasses"))?;
                let located = self.locate(content, change.line, "class", expected).map_err(|_| mismatch())?;
                let current_value = extract_attr_value(&located.original_content).ok_or_else(mismatch)?;
                let mut tokens: Vec<&str> = current_value.split_whitespace().collect();
                let existing: std::collections::HashSet<&str> = tokens.iter().copied().collect();
                let to_add: Vec<&str> = additional.split_whitespace().filter(|t| !existing.contains(t)).collect();
                tokens.extend(to_add);
                let new_value = tokens.join(" ");
                let replaced = replace_attr_value(&located.original_content, &current_value, &new_value)
                    .unwrap_or_else(|| located.original_content.clone());
                Ok((located.line_index, replaced))
            }
            "updateStyleValue" => {
                let property = change.params.get("property").and_then(|v| v.as_str()).ok_or_else(|| malformed("property"))?;
                let new_value = change.params.get("newValue").and_then(|v| v.as_str()).ok_or_else(|| malformed("newValue"))?;
                let located = self.locate(content, change.line, property, expected).map_err(|_| mismatch())?;
                let pattern = Regex::new(&format!(r"({}\s*:\s*)([^;\"'}}]+)", regex::escape(property)))
                    .map_err(|e| Error::Internal(e.to_string()))?;
                if !pattern.is_match(&located.original_content) {
                    return Err(mismatch());
                }
                let replaced = pattern
                    .replace(&located.original_content, |caps: &regex::Captures| format!("{}{}", &caps[1], new_value))
                    .to_string();
                Ok((located.line_index, replaced))
            }
            "updateTextContent" => {
                let old = change.params.get("oldText").and_then(|v| v.as_str()).ok_or_else(|| malformed("oldText"))?;
                let new = change.params.get("newText").and_then(|v| v.as_str()).ok_or_else(|| malformed("newText"))?;
                let located = self.locate(content, change.line, old, expected).map_err(|_| mismatch())?;
                if !located.original_content.contains(old) {
                    return Err(mismatch());
                }
                let replaced = located.original_content.replacen(old, new, 1);
                Ok((located.line_index, replaced))
            }
            other => Err(Error::PlanMalformed(format!("unknown tool {other}"))),
        }
    }

    /// Apply a planned change: locate its target line (verifying
    /// `expected_current_line` when given), transform it, and write the
    /// result. The one path every caller, `ExecutionAgent` included,
    /// commits a change through.
    #[instrument(skip(self, change))]
    pub async fn apply_change(&self, change: &PlannedChange) -> Result<FileChange> {
        match tokio::time::timeout(self.timeout, self.apply_change_inner(change)).await {
            Ok(result) => result,
            Err(_) => Err(Error::external_unavailable(
                "execution",
                format!("apply_change timed out after {:?}", self.timeout),
            )),
        }
    }

    async fn apply_change_inner(&self, change: &PlannedChange) -> Result<FileChange> {
        let lock = self.lock_for(Path::new(&change.file))?;
        let _guard = lock.lock().await;

        let (resolved, content) = self.read_resolved(&change.file).await?;
        let (line_index, new_line) = self.locate_and_transform(&content, change)?;
        self.write_line(&change.file, &resolved, &content, line_index, new_line, &change.tool)
            .await
    }

    async fn write_line(
        &self,
        path: &str,
        resolved: &Path,
        original_full: &str,
        line_index: usize,
        new_line: String,
        tool: &str,
    ) -> Result<FileChange> {
        let new_full = compose_new_full(original_full, line_index, &new_line);

        if new_full == *original_full {
            // appendToClassName idempotence: nothing changed, still a
            // well-formed no-op FileChange rather than a write.
            return Ok(FileChange::new(
                path,
                original_full,
                new_full,
                line_index + 1,
                tool,
            ));
        }

        self.ensure_backup(resolved, original_full).await?;

        let tmp_path = {
            let mut name = resolved.as_os_str().to_os_string();
            name.push(".viztrtr-tmp");
            PathBuf::from(name)
        };
        tokio::fs::write(&tmp_path, &new_full)
            .await
            .map_err(|e| Error::FileIO(e.to_string()))?;
        tokio::fs::rename(&tmp_path, resolved)
            .await
            .map_err(|e| Error::FileIO(e.to_string()))?;

        info!(file = path, line = line_index + 1, tool, "applied micro-edit");
        Ok(FileChange::new(
            path,
            original_full,
            new_full,
            line_index + 1,
            tool,
        ))
    }

    /// `updateClassName(path, line, oldClassAttrValue, newClassAttrValue)`.
    pub async fn update_class_name(
        &self,
        path: &str,
        line: usize,
        old_class_value: &str,
        new_class_value: &str,
    ) -> Result<FileChange> {
        self.apply_change(&PlannedChange {
            file: path.to_string(),
            line,
            tool: "updateClassName".to_string(),
            expected_current_line: String::new(),
            params: serde_json::json!({
                "oldClassAttrValue": old_class_value,
                "newClassAttrValue": new_class_value,
            }),
        })
        .await
    }

    /// `appendToClassName(path, line, additionalClasses)`. Idempotent over
    /// already-present tokens.
    pub async fn append_to_class_name(
        &self,
        path: &str,
        line: usize,
        additional_classes: &str,
    ) -> Result<FileChange> {
        self.apply_change(&PlannedChange {
            file: path.to_string(),
            line,
            tool: "appendToClassName".to_string(),
            expected_current_line: String::new(),
            params: serde_json::json!({ "additionalClasses": additional_classes }),
        })
        .await
    }

    /// `updateStyleValue(path, line, property, newValue)`.
    pub async fn update_style_value(
        &self,
        path: &str,
        line: usize,
        property: &str,
        new_value: &str,
    ) -> Result<FileChange> {
        self.apply_change(&PlannedChange {
            file: path.to_string(),
            line,
            tool: "updateStyleValue".to_string(),
            expected_current_line: String::new(),
            params: serde_json::json!({
                "property": property,
                "newValue": new_value,
            }),
        })
        .await
    }

    /// `updateTextContent(path, line, oldText, newText)`.
    pub async fn update_text_content(
        &self,
        path: &str,
        line: usize,
        old_text: &str,
        new_text: &str,
    ) -> Result<FileChange> {
        self.apply_change(&PlannedChange {
            file: path.to_string(),
            line,
            tool: "updateTextContent".to_string(),
            expected_current_line: String::new(),
            params: serde_json::json!({
                "oldText": old_text,
                "newText": new_text,
            }),
        })
        .await
    }

    /// Restore every file touched this iteration from its backup, in
    /// reverse touch order, then delete the backups.
    #[instrument(skip(self))]
    pub async fn rollback_iteration(&self) -> Result<()> {
        warn!("rolling back iteration");
        let order = self.backup_order.lock().await.clone();
        let backups = self.backups.lock().await.clone();
        for path in order.iter().rev() {
            if let Some(backup) = backups.get(path) {
                let content = tokio::fs::read_to_string(backup)
                    .await
                    .map_err(|e| Error::FileIO(e.to_string()))?;
                tokio::fs::write(path, content)
                    .await
                    .map_err(|e| Error::FileIO(e.to_string()))?;
                let _ = tokio::fs::remove_file(backup).await;
            }
        }
        self.backups.lock().await.clear();
        self.backup_order.lock().await.clear();
        Ok(())
    }

    /// Delete backups for this iteration without restoring them
    ///. A no-op if called without a prior touch, and a
    /// no-op if called again after `rollback_iteration` already cleared
    /// the backup set.
    #[instrument(skip(self))]
    pub async fn commit_iteration(&self) -> Result<()> {
        let backups = self.backups.lock().await.clone();
        for backup in backups.values() {
            let _ = tokio::fs::remove_file(backup).await;
        }
        self.backups.lock().await.clear();
        self.backup_order.lock().await.clear();
        Ok(())
    }
}

fn compose_new_full(original_full: &str, line_index: usize, new_line: &str) -> String {
    let mut lines: Vec<&str> = original_full.lines().collect();
    lines[line_index] = new_line;
    let trailing_newline = original_full.ends_with('\n');
    let mut new_full = lines.join("\n");
    if trailing_newline {
        new_full.push('\n');
    }
    new_full
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the value of a `class="..."` or `className="..."` attribute.
fn extract_attr_value(line: &str) -> Option<String> {
    let re = Regex::new(r#"class(?:Name)?\s*=\s*"([^"]*)""#).ok()?;
    re.captures(line).map(|c| c[1].to_string())
}

/// Replace an attribute value (matched loosely on its old value) with a
/// new value, preserving whichever attribute name (`class`/`className`) was
/// used.
fn replace_attr_value(line: &str, old_value: &str, new_value: &str) -> Option<String> {
    let re = Regex::new(r#"(class(?:Name)?\s*=\s*")([^"]*)(")"#).ok()?;
    if let Some(caps) = re.captures(line) {
        let current = &caps[2];
        if normalize_ws(current) == normalize_ws(old_value) || old_value.is_empty() {
            let replaced = format!("{}{}{}", &caps[1], new_value, &caps[3]);
            return Some(re.replace(line, regex::NoExpand(&replaced)).to_string());
        }
    }
    // Fall back to a plain substring replace for non-JSX style attributes.
    if line.contains(old_value) {
        return Some(line.replacen(old_value, new_value, 1));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn toolkit_for(dir: &std::path::Path) -> MicroEditToolkit {
        MicroEditToolkit::new(Paths::new(dir), 5, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn update_class_name_replaces_whole_value() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("Header.tsx");
        tokio::fs::write(&file, "<button class=\"px-2 py-1 bg-blue-500\">Go</button>\n")
            .await
            .unwrap();

        let toolkit = toolkit_for(dir.path()).await;
        let change = toolkit
            .update_class_name(
                "Header.tsx",
                1,
                "px-2 py-1 bg-blue-500",
                "px-2 py-1 bg-blue-600 hover:bg-blue-700",
            )
            .await
            .unwrap();

        assert!(change.new_content.contains("bg-blue-600 hover:bg-blue-700"));
        let on_disk = tokio::fs::read_to_string(&file).await.unwrap();
        assert_eq!(on_disk, change.new_content);
    }

    #[tokio::test]
    async fn append_to_class_name_is_idempotent() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("Button.tsx");
        tokio::fs::write(&file, "<div class=\"flex items-center\">\n")
            .await
            .unwrap();

        let toolkit = toolkit_for(dir.path()).await;
        let first = toolkit
            .append_to_class_name("Button.tsx", 1, "gap-2")
            .await
            .unwrap();
        assert!(first.new_content.contains("gap-2"));

        let after_first = tokio::fs::read_to_string(&file).await.unwrap();

        let second = toolkit
            .append_to_class_name("Button.tsx", 1, "gap-2")
            .await
            .unwrap();
        assert_eq!(second.new_content, after_first);
        let after_second = tokio::fs::read_to_string(&file).await.unwrap();
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn update_style_value_rewrites_one_property() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("Card.tsx");
        tokio::fs::write(&file, "<div style={{ color: 'red', padding: '4px' }}>\n")
            .await
            .unwrap();

        let toolkit = toolkit_for(dir.path()).await;
        let change = toolkit
            .update_style_value("Card.tsx", 1, "color", "'blue'")
            .await
            .unwrap();
        assert!(change.new_content.contains("color: 'blue'"));
        assert!(change.new_content.contains("padding: '4px'"));
    }

    #[tokio::test]
    async fn update_text_content_replaces_span() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("Label.tsx");
        tokio::fs::write(&file, "<span>Submit</span>\n").await.unwrap();

        let toolkit = toolkit_for(dir.path()).await;
        let change = toolkit
            .update_text_content("Label.tsx", 1, "Submit", "Save changes")
            .await
            .unwrap();
        assert!(change.new_content.contains("Save changes"));
    }

    #[tokio::test]
    async fn line_mismatch_falls_back_within_radius() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("Nav.tsx");
        tokio::fs::write(
            &file,
            "line1\nline2\n<a class=\"text-sm\">Home</a>\nline4\nline5\n",
        )
        .await
        .unwrap();

        let toolkit = toolkit_for(dir.path()).await;
        // Discovery claimed line 1, but the real line is 3 (within radius 5).
        let change = toolkit
            .update_class_name("Nav.tsx", 1, "text-sm", "text-base")
            .await
            .unwrap();
        assert_eq!(change.line, 3);
    }

    #[tokio::test]
    async fn line_mismatch_outside_radius_fails_without_mutating() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("Far.tsx");
        let mut content = String::new();
        for i in 0..20 {
            content.push_str(&format!("line {i}\n"));
        }
        content.push_str("<a class=\"far-token\">X</a>\n");
        tokio::fs::write(&file, &content).await.unwrap();

        let toolkit = toolkit_for(dir.path()).await;
        let result = toolkit
            .update_class_name("Far.tsx", 1, "far-token", "near-token")
            .await;
        assert!(result.is_err());
        let on_disk = tokio::fs::read_to_string(&file).await.unwrap();
        assert_eq!(on_disk, content);
    }

    #[tokio::test]
    async fn rollback_restores_original_content() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("Rollback.tsx");
        let original = "<div class=\"a b\">X</div>\n".to_string();
        tokio::fs::write(&file, &original).await.unwrap();

        let toolkit = toolkit_for(dir.path()).await;
        toolkit
            .update_class_name("Rollback.tsx", 1, "a b", "a b c")
            .await
            .unwrap();

        toolkit.rollback_iteration().await.unwrap();

        let on_disk = tokio::fs::read_to_string(&file).await.unwrap();
        assert_eq!(on_disk, original);
    }

    #[tokio::test]
    async fn commit_after_rollback_is_a_no_op() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("Commit.tsx");
        tokio::fs::write(&file, "<div class=\"a\">X</div>\n").await.unwrap();

        let toolkit = toolkit_for(dir.path()).await;
        toolkit
            .update_class_name("Commit.tsx", 1, "a", "a b")
            .await
            .unwrap();
        toolkit.rollback_iteration().await.unwrap();
        // Should not error even though there is nothing left to commit.
        toolkit.commit_iteration().await.unwrap();
    }

    #[tokio::test]
    async fn stale_expected_current_line_is_rejected_even_when_needle_matches() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("Stale.tsx");
        tokio::fs::write(&file, "<button class=\"px-2 py-1 bg-blue-500\">Go</button>\n")
            .await
            .unwrap();

        let toolkit = toolkit_for(dir.path()).await;
        let change = PlannedChange {
            file: "Stale.tsx".into(),
            line: 1,
            tool: "updateClassName".into(),
            expected_current_line: "<button class=\"px-2 py-1 bg-blue-500\">Something else</button>".into(),
            params: serde_json::json!({
                "oldClassAttrValue": "px-2 py-1 bg-blue-500",
                "newClassAttrValue": "px-2 py-1 bg-blue-600",
            }),
        };

        let result = toolkit.apply_change(&change).await;
        assert!(matches!(result, Err(Error::LineMismatch { .. })));
        let on_disk = tokio::fs::read_to_string(&file).await.unwrap();
        assert!(on_disk.contains("bg-blue-500"));
    }

    #[tokio::test]
    async fn paths_outside_scope_are_rejected() {
        let dir = tempdir().unwrap();
        let toolkit = toolkit_for(dir.path()).await;
        let result = toolkit
            .update_class_name("../outside.tsx", 1, "a", "b")
            .await;
        assert!(result.is_err());
    }
}

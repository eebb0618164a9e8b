//! Shared file-discovery utility: a deterministic recursive scan over the
//! project root yielding candidate files for `DiscoveryAgent`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{Error, Result};
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateFile {
    /// Relative to the project root.
    pub path: String,
    pub directory: String,
    pub size_bytes: u64,
}

/// Recursively scan `paths.root()` for files whose extension is in
/// `extensions` and whose size is at most `max_bytes`, skipping blacklisted
/// directories. Result is grouped by directory and sorted lexicographically
/// by path.
#[instrument(skip(paths, extensions))]
pub fn discover_candidates(
    paths: &Paths,
    extensions: &[String],
    max_bytes: u64,
) -> Result<Vec<CandidateFile>> {
    let root = paths.root();
    let mut candidates = Vec::new();

    for entry in walkdir::WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_blacklisted_dir(e.path()))
    {
        let entry = entry.map_err(|e| Error::FileIO(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        if !extensions.iter().any(|e| e == &ext) {
            continue;
        }
        let metadata = entry.metadata().map_err(|e| Error::FileIO(e.to_string()))?;
        if metadata.len() > max_bytes {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        let directory = relative
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        candidates.push(CandidateFile {
            path: relative.to_string_lossy().replace('\\', "/"),
            directory,
            size_bytes: metadata.len(),
        });
    }

    candidates.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(candidates)
}

fn is_blacklisted_dir(path: &std::path::Path) -> bool {
    const BLACKLIST: &[&str] = &[
        "node_modules",
        "target",
        "dist",
        "build",
        ".next",
        ".git",
        ".hg",
        ".svn",
    ];
    path.components().any(|c| {
        let s = c.as_os_str().to_string_lossy();
        BLACKLIST.iter().any(|b| s == *b)
    })
}

/// Read a bounded prefix of a candidate file's content, for building a
/// line-numbered excerpt.
pub async fn read_candidate(paths: &Paths, candidate: &CandidateFile) -> Result<String> {
    let resolved: PathBuf = paths.resolve(&candidate.path)?;
    tokio::fs::read_to_string(&resolved)
        .await
        .map_err(|e| Error::FileIO(e.to_string()))
}

//! `FileChange`: produced by a successful MicroEditToolkit invocation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    pub file: String,
    pub original_content: String,
    pub new_content: String,
    pub line: usize,
    pub tool: String,
    /// Unified-style diff, produced with `similar`.
    pub diff: String,
}

impl FileChange {
    pub fn new(
        file: impl Into<String>,
        original_content: impl Into<String>,
        new_content: impl Into<String>,
        line: usize,
        tool: impl Into<String>,
    ) -> Self {
        let original_content = original_content.into();
        let new_content = new_content.into();
        let file = file.into();
        let diff = crate::diff::unified_diff(&file, &original_content, &new_content);
        Self {
            file,
            original_content,
            new_content,
            line,
            tool: tool.into(),
            diff,
        }
    }
}

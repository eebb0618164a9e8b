//! Error types for viztrtr-core.
//!
//! Subsystems never terminate the process: they return one of these
//! variants and let `IterationController` decide whether to continue,
//! roll back, or stop.

use thiserror::Error;

/// Result type alias using viztrtr-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during orchestration, editing, and verification.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid configuration. Fatal pre-flight (exit code 3).
    #[error("configuration error: {0}")]
    Config(String),

    /// Capture/vision/build/metrics adapter unreachable after backoff.
    #[error("external adapter unavailable: {adapter} - {message}")]
    ExternalUnavailable { adapter: String, message: String },

    /// ChangeValidator rejected a proposed edit.
    #[error("validation rejected: {0}")]
    ValidationReject(String),

    /// VerificationAgent's build step failed.
    #[error("build failed: {stderr}")]
    BuildFailure { stderr: String },

    /// An LLM call failed or returned output that failed schema validation.
    #[error("model error ({stage}): {message}")]
    ModelError { stage: String, message: String },

    /// Cooperative cancellation was observed at a stage boundary.
    #[error("operation cancelled")]
    Cancelled,

    /// A path resolved outside the configured project root.
    #[error("path outside project scope: {0}")]
    PathOutsideScope(String),

    /// A path matched the toolkit's dependency/VCS/secret blacklist.
    #[error("path is blacklisted: {0}")]
    PathBlacklisted(String),

    /// The "expected current" line content did not match, even with the
    /// fallback search radius.
    #[error("line mismatch in {path} at line {line} (fallback radius {radius} exhausted)")]
    LineMismatch {
        path: String,
        line: usize,
        radius: usize,
    },

    /// Filesystem I/O failure inside the toolkit.
    #[error("file I/O error: {0}")]
    FileIO(String),

    /// Filesystem/content I/O failure inside the validator.
    #[error("validator I/O error: {0}")]
    ValidatorIO(String),

    /// DiscoveryAgent was given an empty candidate file set.
    #[error("no candidate files for discovery")]
    NoCandidateFiles,

    /// DiscoveryAgent/ImplementationAdapter produced a malformed ChangePlan.
    #[error("malformed change plan: {0}")]
    PlanMalformed(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Memory document persistence error.
    #[error("memory storage error: {0}")]
    MemoryStorage(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Construct an `ExternalUnavailable` error.
    pub fn external_unavailable(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalUnavailable {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    /// Construct a `ModelError` tagged with the stage that produced it.
    pub fn model_error(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelError {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Whether this error should be treated as transient and retried with
    /// backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ExternalUnavailable { .. } | Self::ModelError { .. }
        )
    }
}

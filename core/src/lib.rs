//! # viztrtr-core
//!
//! Closed-loop control core for an autonomous UI-improvement pipeline.
//! A capture adapter hands `IterationController` a screenshot; a vision
//! adapter turns it into ranked recommendations; a filter and an approval
//! gate narrow those down; an orchestrator routes the survivors to
//! dimension specialists, each of which runs a read-only discovery pass,
//! a pre-write validation pass, and a constrained micro-edit execution
//! pass; a build adapter verifies the result; a hybrid scorer measures it;
//! a reflection pass writes down what was learned; and a memory store
//! persists all of it so the next iteration inherits the lesson.
//!
//! This crate owns the control flow and the data model. It never talks to
//! a browser, a vision model, a metrics backend, or a language model
//! directly; those live behind the trait objects in [`adapters`].

pub mod adapters;
pub mod approval;
pub mod config;
pub mod controller;
pub mod diff;
pub mod discovery;
pub mod discovery_fs;
pub mod error;
pub mod execution;
pub mod filter;
pub mod memory;
pub mod model;
pub mod orchestrator;
pub mod paths;
pub mod reflection;
pub mod report;
pub mod scorer;
pub mod toolkit;
pub mod validator;
pub mod verification;

pub use config::Config;
pub use controller::{IterationController, TerminalState};
pub use error::{Error, Result};
pub use paths::Paths;
pub use toolkit::MicroEditToolkit;
pub use validator::ChangeValidator;

pub use adapters::{
    ApprovalSource, BuildAdapter, CaptureAdapter, ImplementationAdapter, MetricsAdapter,
    VisionAdapter,
};
pub use approval::ApprovalGate;
pub use discovery::DiscoveryAgent;
pub use execution::{ExecutionAgent, ExecutionReport};
pub use filter::RecommendationFilter;
pub use memory::MemoryStore;
pub use orchestrator::Orchestrator;
pub use reflection::ReflectionAgent;
pub use scorer::HybridScorer;
pub use verification::VerificationAgent;

pub use model::{
    AttemptRecord, ChangePlan, ComponentStats, DesignSpec, Dimension, FileChange, HybridScore,
    InterfaceViolationKind, Issue, IterationResult, MemorySnapshot, MetricsBreakdown, Outcome,
    PlannedChange, Recommendation, ScoreHistoryEntry, Trend, ValidationKind, ValidationResult,
    ValidationViolation,
};

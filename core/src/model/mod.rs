//! Core data model.
//!
//! Every type here is plain data: construction helpers and small derived
//! queries live alongside the struct, but no type in this module performs
//! I/O or talks to an adapter.

mod attempt;
mod change_plan;
mod component_stats;
mod design_spec;
mod file_change;
mod hybrid_score;
mod iteration_result;
mod memory_snapshot;
mod recommendation;
mod score_history;
mod validation_result;

pub use attempt::{AttemptRecord, Outcome};
pub use change_plan::{ChangePlan, PlannedChange};
pub use component_stats::ComponentStats;
pub use design_spec::{DesignSpec, Issue};
pub use file_change::FileChange;
pub use hybrid_score::{HybridScore, MetricsBreakdown};
pub use iteration_result::IterationResult;
pub use memory_snapshot::{MemorySnapshot, Trend};
pub use recommendation::{Dimension, Recommendation};
pub use score_history::ScoreHistoryEntry;
pub use validation_result::{
    InterfaceViolationKind, ValidationKind, ValidationResult, ValidationViolation,
};

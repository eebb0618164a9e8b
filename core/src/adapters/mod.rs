//! External interface traits. Every adapter implementation (a real
//! browser driver, a vision model client, a bundler invocation, a metrics
//! harness) lives outside this crate; these traits are the only contract
//! between them and the control core.

mod approval;
mod build;
mod capture;
mod implementation;
mod metrics;
mod vision;

pub use approval::{ApprovalDecision, ApprovalRequest, ApprovalSource};
pub use build::{BuildAdapter, BuildReport};
pub use capture::{CaptureAdapter, Screenshot, ScreenshotRequest};
pub use implementation::ImplementationAdapter;
pub use metrics::{AccessibilitySnapshot, ConsoleSnapshot, CoreWebVitals, MetricsAdapter, MetricsSnapshot, NetworkSnapshot};
pub use vision::VisionAdapter;

#[cfg(any(test, feature = "test-adapters"))]
pub mod mock;

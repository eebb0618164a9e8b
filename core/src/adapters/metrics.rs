use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CoreWebVitals {
    /// Largest Contentful Paint, milliseconds.
    pub lcp: f64,
    /// Cumulative Layout Shift, unitless.
    pub cls: f64,
    /// Time to First Byte, milliseconds.
    pub ttfb: f64,
    /// Interaction to Next Paint, milliseconds. Not all adapters report it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inp: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessibilitySnapshot {
    pub violations: Vec<String>,
    pub warnings: Vec<String>,
    pub contrast_issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleSnapshot {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub request_count: u32,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub core_web_vitals: CoreWebVitals,
    pub accessibility: AccessibilitySnapshot,
    pub console: ConsoleSnapshot,
    pub network: NetworkSnapshot,
}

/// Captures Core Web Vitals, accessibility, console, and network counters
/// for a URL. Parsing the underlying tool's wire format is the adapter's
/// concern; this trait only sees the normalized snapshot.
#[async_trait]
pub trait MetricsAdapter: Send + Sync {
    async fn capture(&self, url: &str) -> Result<MetricsSnapshot>;
}

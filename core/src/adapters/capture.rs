use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ScreenshotConfig;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotRequest {
    pub url: String,
    pub config: ScreenshotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screenshot {
    /// Raw encoded image bytes (PNG), base64 at rest in `iteration_<N>`
    /// artifacts but passed as raw bytes here.
    pub data: Vec<u8>,
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub taken_at: DateTime<Utc>,
}

/// Owns the browser session used to capture the target URL. Implementations
/// must internally retry with bounded backoff on a post-rollback capture
/// until the configured selector yields a non-zero bounding box, or fall
/// back to a full-page capture.
#[async_trait]
pub trait CaptureAdapter: Send + Sync {
    async fn capture(&self, request: ScreenshotRequest) -> Result<Screenshot>;
}

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::adapters::capture::Screenshot;
use crate::error::Result;
use crate::model::DesignSpec;

/// Turns a screenshot plus accumulated memory context into a `DesignSpec`.
///
/// Implementations MUST NOT produce recommendations whose stated target
/// matches an entry in `avoided_components`, and SHOULD constrain any
/// class-name suggestions to `project_context`'s allow-list when one is
/// given.
#[async_trait]
pub trait VisionAdapter: Send + Sync {
    async fn analyze(
        &self,
        screenshot: &Screenshot,
        memory_context: &str,
        project_context: &[String],
        avoided_components: &BTreeSet<String>,
    ) -> Result<DesignSpec>;
}

//! Renderer stub for hosts without a screenshot tool

use super::traits::{ScreenshotOptions, ScreenshotRenderer};
use crate::session::ProxySession;
use async_trait::async_trait;
use std::path::Path;

/// Renderer used when no screenshot executable is available
///
/// Every capture fails with `Error::NotSupported`, so screenshot requests
/// degrade into a note on the check record.
pub struct NoOpScreenshotRenderer;

#[async_trait]
impl ScreenshotRenderer for NoOpScreenshotRenderer {
    async fn capture(
        &self,
        _session: &ProxySession,
        _url: &str,
        _out_path: &Path,
        _options: &ScreenshotOptions,
    ) -> crate::Result<()> {
        Err(crate::Error::NotSupported(
            "screenshots require a renderer executable. \
             Configure screenshots.command or install geoprobe-screenshot in PATH."
                .into(),
        ))
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

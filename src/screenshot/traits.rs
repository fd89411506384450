//! Renderer trait and render settings

use crate::config::{HttpClientConfig, ScreenshotConfig};
use crate::session::ProxySession;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Viewport and timing settings for one render
#[derive(Clone, Debug)]
pub struct ScreenshotOptions {
    /// Upper bound on the whole render
    pub timeout: Duration,
    /// Extra settle time after the page load event
    pub wait_after_load: Duration,
    /// Viewport width
    pub width: u32,
    /// Viewport height
    pub height: u32,
    /// Browser user agent
    pub user_agent: String,
}

impl ScreenshotOptions {
    /// Settings from the screenshot and HTTP client config groups
    pub fn from_config(screenshots: &ScreenshotConfig, http: &HttpClientConfig) -> Self {
        Self {
            timeout: screenshots.timeout,
            wait_after_load: screenshots.wait_after_load,
            width: screenshots.width,
            height: screenshots.height,
            user_agent: http.user_agent.clone(),
        }
    }
}

/// Captures the visible part of a page as a PNG
///
/// Callers hold a [`ScreenshotLimiter`](super::ScreenshotLimiter) permit for
/// the duration of `capture`. A failed capture never changes a check's
/// classification; the error text ends up in the record's notes.
#[async_trait]
pub trait ScreenshotRenderer: Send + Sync {
    /// Render `url` through `session` into `out_path`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No renderer is available (`Error::NotSupported`)
    /// - The renderer failed, timed out, or produced no file (`Error::ExternalTool`)
    async fn capture(
        &self,
        session: &ProxySession,
        url: &str,
        out_path: &Path,
        options: &ScreenshotOptions,
    ) -> crate::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

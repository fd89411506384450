//! External-executable screenshot renderer
//!
//! The renderer is handed everything through environment variables and is
//! expected to write a PNG to `GEOPROBE_OUT` and exit 0:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `GEOPROBE_URL` | page to load |
//! | `GEOPROBE_OUT` | PNG path to write |
//! | `GEOPROBE_PROXY` | `type://host:port` |
//! | `GEOPROBE_PROXY_USERNAME` / `GEOPROBE_PROXY_PASSWORD` | proxy credentials |
//! | `GEOPROBE_WIDTH` / `GEOPROBE_HEIGHT` | viewport |
//! | `GEOPROBE_TIMEOUT_SEC` | navigation timeout |
//! | `GEOPROBE_WAIT_AFTER_LOAD_SEC` | settle time after load |
//! | `GEOPROBE_USER_AGENT` | browser user agent |

use super::traits::{ScreenshotOptions, ScreenshotRenderer};
use crate::error::Error;
use crate::session::ProxySession;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Executable looked up in `PATH` when none is configured
pub const DEFAULT_RENDERER_BINARY: &str = "geoprobe-screenshot";

/// Renders screenshots by running an external executable
pub struct CommandScreenshotRenderer {
    binary_path: PathBuf,
    args: Vec<String>,
}

impl CommandScreenshotRenderer {
    /// Create a renderer with an explicit executable
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            args: Vec::new(),
        }
    }

    /// Pass fixed arguments before the environment-driven render
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Attempt to find `geoprobe-screenshot` in PATH
    pub fn from_path() -> Option<Self> {
        which::which(DEFAULT_RENDERER_BINARY).ok().map(Self::new)
    }

    /// Executable this renderer runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

#[async_trait]
impl ScreenshotRenderer for CommandScreenshotRenderer {
    async fn capture(
        &self,
        session: &ProxySession,
        url: &str,
        out_path: &Path,
        options: &ScreenshotOptions,
    ) -> crate::Result<()> {
        let limit = options.timeout + options.wait_after_load;

        let mut command = Command::new(&self.binary_path);
        command
            .args(&self.args)
            .env("GEOPROBE_URL", url)
            .env("GEOPROBE_OUT", out_path)
            .env("GEOPROBE_PROXY", session.server())
            .env("GEOPROBE_PROXY_USERNAME", &session.username)
            .env("GEOPROBE_PROXY_PASSWORD", &session.password)
            .env("GEOPROBE_WIDTH", options.width.to_string())
            .env("GEOPROBE_HEIGHT", options.height.to_string())
            .env("GEOPROBE_TIMEOUT_SEC", options.timeout.as_secs().to_string())
            .env(
                "GEOPROBE_WAIT_AFTER_LOAD_SEC",
                options.wait_after_load.as_secs().to_string(),
            )
            .env("GEOPROBE_USER_AGENT", &options.user_agent)
            .kill_on_drop(true);

        let output = match tokio::time::timeout(limit, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(Error::ExternalTool(format!(
                    "failed to run {}: {e}",
                    self.binary_path.display()
                )));
            }
            Err(_) => {
                tracing::warn!(url = %url, timeout = ?limit, "screenshot renderer timed out");
                return Err(Error::ExternalTool(format!(
                    "renderer timed out after {}s",
                    limit.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().last().unwrap_or_default().trim();
            return Err(Error::ExternalTool(format!(
                "renderer exited with {}{}",
                output.status,
                if detail.is_empty() {
                    String::new()
                } else {
                    format!(": {detail}")
                }
            )));
        }

        if !tokio::fs::try_exists(out_path).await.unwrap_or(false) {
            return Err(Error::ExternalTool(format!(
                "renderer produced no file at {}",
                out_path.display()
            )));
        }

        tracing::debug!(url = %url, out = ?out_path, "screenshot captured");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{HttpClientConfig, ScreenshotConfig};
    use crate::types::ProxyType;
    use std::time::Duration;

    fn session() -> ProxySession {
        ProxySession {
            proxy_type: ProxyType::Socks5,
            host: "gw.example.net".into(),
            port: 9001,
            username: "login".into(),
            password: "wifi;TR;;;".into(),
            session_id: None,
            ext_ip: None,
            debug_info: serde_json::Value::Null,
        }
    }

    fn options(timeout: Duration) -> ScreenshotOptions {
        let mut options =
            ScreenshotOptions::from_config(&ScreenshotConfig::default(), &HttpClientConfig::default());
        options.timeout = timeout;
        options
    }

    fn shell(script: &str) -> CommandScreenshotRenderer {
        CommandScreenshotRenderer::new(PathBuf::from("/bin/sh"))
            .with_args(vec!["-c".into(), script.into()])
    }

    #[tokio::test]
    async fn renderer_receives_environment_and_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("shot.png");
        let renderer = shell(
            "printf '%s|%s|%s|%s' \"$GEOPROBE_URL\" \"$GEOPROBE_PROXY\" \
             \"$GEOPROBE_WIDTH\" \"$GEOPROBE_PROXY_PASSWORD\" > \"$GEOPROBE_OUT\"",
        );

        renderer
            .capture(&session(), "http://example.com/", &out, &options(Duration::from_secs(10)))
            .await
            .unwrap();

        let written = std::fs::read_to_string(&out).unwrap();
        assert_eq!(
            written,
            "http://example.com/|socks5://gw.example.net:9001|1366|wifi;TR;;;"
        );
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error_with_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = shell("echo 'browser crashed' >&2; exit 3");

        let err = renderer
            .capture(
                &session(),
                "http://example.com/",
                &dir.path().join("shot.png"),
                &options(Duration::from_secs(10)),
            )
            .await
            .unwrap_err();

        match err {
            Error::ExternalTool(msg) => assert!(msg.contains("browser crashed"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_output_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = shell("exit 0");

        let err = renderer
            .capture(
                &session(),
                "http://example.com/",
                &dir.path().join("shot.png"),
                &options(Duration::from_secs(10)),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no file"), "{err}");
    }

    #[tokio::test]
    async fn slow_renderer_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = shell("sleep 5");

        let err = renderer
            .capture(
                &session(),
                "http://example.com/",
                &dir.path().join("shot.png"),
                &options(Duration::from_secs(1)),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = CommandScreenshotRenderer::new(dir.path().join("no-such-renderer"));
        let err = renderer
            .capture(
                &session(),
                "http://example.com/",
                &dir.path().join("shot.png"),
                &options(Duration::from_secs(1)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExternalTool(_)));
    }
}

//! Scripted collaborators and constructors shared by unit tests.

use super::{Collaborators, RunOrchestrator};
use crate::config::Config;
use crate::dns::{DNS_LOOKUP_FAILED, DomainResolver, OWNER_UNKNOWN};
use crate::probe::{NetworkProbe, ProbeResponse, TransportError};
use crate::screenshot::{ScreenshotOptions, ScreenshotRenderer};
use crate::session::{ProxySession, SessionProvider};
use crate::types::{CheckTask, DnsMode, DnsRecord, RunEvent, RunId, RunParams, Timings};
use crate::{BusMessage, Subscription};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// Session provider that always succeeds
pub(crate) struct FakeSessions;

#[async_trait]
impl SessionProvider for FakeSessions {
    async fn acquire(&self, task: &CheckTask) -> crate::Result<ProxySession> {
        Ok(ProxySession {
            proxy_type: task.params.proxy_type,
            host: "proxy.test".into(),
            port: 9000,
            username: "user".into(),
            password: format!("wifi;{};;;", task.country.to_lowercase()),
            session_id: None,
            ext_ip: Some("203.0.113.7".into()),
            debug_info: serde_json::json!({ "fake": true, "country": task.country }),
        })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Session provider without credentials
pub(crate) struct FailingSessions;

#[async_trait]
impl SessionProvider for FailingSessions {
    async fn acquire(&self, _task: &CheckTask) -> crate::Result<ProxySession> {
        Err(crate::Error::config(
            "soax.port_login",
            "SOAX port login is not configured",
        ))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

enum ProbeOutcome {
    Status(u16),
    Error(String),
    Panic,
}

/// Probe returning a fixed outcome after an optional delay
pub(crate) struct FakeProbe {
    outcome: ProbeOutcome,
    delay: Duration,
}

impl FakeProbe {
    fn with_outcome(outcome: ProbeOutcome) -> Self {
        Self {
            outcome,
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn status(status: u16) -> Self {
        Self::with_outcome(ProbeOutcome::Status(status))
    }

    pub(crate) fn error(message: &str) -> Self {
        Self::with_outcome(ProbeOutcome::Error(message.to_string()))
    }

    pub(crate) fn panicking() -> Self {
        Self::with_outcome(ProbeOutcome::Panic)
    }

    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl NetworkProbe for FakeProbe {
    async fn measure(
        &self,
        _url: &str,
        _session: &ProxySession,
        _dns_mode: DnsMode,
        timeout: Duration,
    ) -> Result<ProbeResponse, TransportError> {
        let waited = self.delay.min(timeout);
        tokio::time::sleep(waited).await;
        let timings = Timings {
            ttfb_ms: Some(waited.as_millis() as u64),
            total_ms: Some(waited.as_millis() as u64),
            ..Default::default()
        };

        match &self.outcome {
            ProbeOutcome::Status(status) => Ok(ProbeResponse {
                status: *status,
                bytes: 512,
                redirects: Vec::new(),
                timings,
            }),
            ProbeOutcome::Error(message) => Err(TransportError {
                message: message.clone(),
                redirects: Vec::new(),
                timings: Timings {
                    ttfb_ms: None,
                    ..timings
                },
            }),
            ProbeOutcome::Panic => panic!("probe exploded"),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Renderer that writes a placeholder file and tracks concurrency
#[derive(Default)]
pub(crate) struct FakeRenderer {
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeRenderer {
    pub(crate) fn delayed(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of captures seen in flight at once
    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScreenshotRenderer for FakeRenderer {
    async fn capture(
        &self,
        _session: &ProxySession,
        _url: &str,
        out_path: &Path,
        _options: &ScreenshotOptions,
    ) -> crate::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        tokio::fs::write(out_path, b"\x89PNG").await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Resolver answering every domain except those starting with `missing`
pub(crate) struct FakeResolver;

#[async_trait]
impl DomainResolver for FakeResolver {
    async fn resolve(&self, domain: &str) -> DnsRecord {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if domain.starts_with("missing") {
            return DnsRecord {
                domain: domain.to_string(),
                owner: OWNER_UNKNOWN.to_string(),
                error: Some(DNS_LOOKUP_FAILED.to_string()),
                ..Default::default()
            };
        }
        DnsRecord {
            domain: domain.to_string(),
            ips: vec!["198.51.100.1".into()],
            owner: "Cloudflare".into(),
            ..Default::default()
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// A check task for `target` from TR
pub(crate) fn check_task(target: &str, params: RunParams) -> CheckTask {
    CheckTask {
        run_id: RunId::from("testrun00000"),
        target: target.to_string(),
        country: "TR".into(),
        sticky: false,
        params: Arc::new(params),
    }
}

/// Collaborators that succeed with HTTP 200 after a short delay
///
/// The delay keeps a run alive long enough for a test to subscribe after an
/// in-process HTTP round trip.
pub(crate) fn fake_collaborators() -> Collaborators {
    Collaborators {
        sessions: Arc::new(FakeSessions),
        probe: Arc::new(FakeProbe::status(200).delayed(Duration::from_millis(20))),
        renderer: Arc::new(FakeRenderer::default()),
        resolver: Arc::new(FakeResolver),
    }
}

/// Config writing artifacts into `dir`
pub(crate) fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.paths.logs_dir = dir.join("logs");
    config.paths.data_dir = dir.join("data");
    config.execution.max_concurrency = 2;
    config
}

/// An orchestrator over `collaborators` with artifacts in a fresh tempdir.
/// Returns the orchestrator and the tempdir (which must be kept alive).
pub(crate) async fn create_test_orchestrator(
    collaborators: Collaborators,
) -> (RunOrchestrator, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let orchestrator = RunOrchestrator::with_collaborators(config, collaborators)
        .await
        .unwrap();
    (orchestrator, temp_dir)
}

/// Drain `subscription` until `End`, failing after 10 seconds
pub(crate) async fn collect_events(mut subscription: Subscription) -> Vec<RunEvent> {
    let drain = async {
        let mut events = Vec::new();
        while let BusMessage::Event(event) = subscription.next().await {
            events.push(event);
        }
        events
    };
    tokio::time::timeout(Duration::from_secs(10), drain)
        .await
        .expect("run did not finish within 10s")
}

//! Scripted collaborators and local network stand-ins

use async_trait::async_trait;
use geoprobe::dns::DomainResolver;
use geoprobe::screenshot::{ScreenshotOptions, ScreenshotRenderer};
use geoprobe::{DnsRecord, Error, ProxySession};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// A proxy that accepts connections and never answers
///
/// Requests routed through it end in a client-side timeout.
pub struct SilentProxy {
    pub addr: SocketAddr,
    _accept: tokio::task::JoinHandle<()>,
}

impl SilentProxy {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let held = Arc::new(Mutex::new(Vec::new()));
        let accept = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                held.lock().await.push(socket);
            }
        });
        Self {
            addr,
            _accept: accept,
        }
    }
}

impl Drop for SilentProxy {
    fn drop(&mut self) {
        self._accept.abort();
    }
}

/// A local port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Renderer that always fails
pub struct FailingRenderer;

#[async_trait]
impl ScreenshotRenderer for FailingRenderer {
    async fn capture(
        &self,
        _session: &ProxySession,
        _url: &str,
        _out_path: &Path,
        _options: &ScreenshotOptions,
    ) -> geoprobe::Result<()> {
        Err(Error::ExternalTool("renderer crashed".into()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Renderer that writes a placeholder after a delay and records peak concurrency
#[derive(Default)]
pub struct CountingRenderer {
    pub delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl CountingRenderer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScreenshotRenderer for CountingRenderer {
    async fn capture(
        &self,
        _session: &ProxySession,
        _url: &str,
        out_path: &Path,
        _options: &ScreenshotOptions,
    ) -> geoprobe::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        tokio::fs::write(out_path, b"\x89PNG").await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

/// Resolver with fixed answers; domains starting with `nx` fail
pub struct StaticResolver;

#[async_trait]
impl DomainResolver for StaticResolver {
    async fn resolve(&self, domain: &str) -> DnsRecord {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if domain.starts_with("nx") {
            return DnsRecord {
                domain: domain.to_string(),
                owner: geoprobe::dns::OWNER_UNKNOWN.into(),
                error: Some(geoprobe::dns::DNS_LOOKUP_FAILED.into()),
                ..Default::default()
            };
        }
        DnsRecord {
            domain: domain.to_string(),
            ips: vec!["192.0.2.10".into()],
            owner: "Akamai".into(),
            country_name: Some("Netherlands".into()),
            ..Default::default()
        }
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

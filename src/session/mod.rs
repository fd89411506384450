//! Proxy session acquisition
//!
//! A check never talks to a target directly: it first asks a
//! [`SessionProvider`] for a [`ProxySession`] matching the task's geo and
//! proxy settings, then routes the request through it.
//!
//! - [`SoaxPortSessionProvider`]: SOAX port-mode credentials built from config
//!
//! Tests and embedders can supply their own provider through
//! `RunOrchestrator::with_collaborators`.

mod soax;

pub use soax::SoaxPortSessionProvider;

use crate::types::{CheckTask, DnsMode, ProxyType};
use async_trait::async_trait;
use serde::Serialize;

/// Credentials and endpoint of one proxy session
#[derive(Clone, Debug, Serialize)]
pub struct ProxySession {
    /// Proxy protocol
    pub proxy_type: ProxyType,
    /// Gateway host
    pub host: String,
    /// Gateway port
    pub port: u16,
    /// Proxy username
    pub username: String,
    /// Proxy password
    #[serde(skip_serializing)]
    pub password: String,
    /// Provider session identifier (sticky sessions)
    pub session_id: Option<String>,
    /// Exit IP, when the provider reports it
    pub ext_ip: Option<String>,
    /// Provider-specific details written to debug reports
    pub debug_info: serde_json::Value,
}

impl ProxySession {
    /// Proxy URL without credentials
    ///
    /// SOCKS5 sessions use `socks5h` when the proxy resolves names.
    pub fn proxy_url(&self, dns_mode: DnsMode) -> String {
        let scheme = match (self.proxy_type, dns_mode) {
            (ProxyType::Http, _) => "http",
            (ProxyType::Socks5, DnsMode::Proxy) => "socks5h",
            (ProxyType::Socks5, DnsMode::Local) => "socks5",
        };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// `type://host:port`, as handed to the screenshot renderer
    pub fn server(&self) -> String {
        format!("{}://{}:{}", self.proxy_type.as_str(), self.host, self.port)
    }
}

/// Source of proxy sessions
///
/// Failing to acquire a session is a task-level failure: the executor turns
/// the error into a `connect_error` record with the error text as its note.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Build or fetch a session for `task`
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when credentials are missing, or
    /// `Error::Session` when the task cannot be turned into a session
    /// (no country).
    async fn acquire(&self, task: &CheckTask) -> crate::Result<ProxySession>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

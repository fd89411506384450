//! Timed HTTP requests through a proxy session
//!
//! [`NetworkProbe`] is the seam the check executor measures targets through.
//! [`ReqwestProbe`] is the production implementation: it follows redirects
//! by hand so every hop can be recorded, and reports transport failures as
//! text the classifier understands.

use crate::config::HttpClientConfig;
use crate::session::ProxySession;
use crate::types::{DnsMode, ProxyType, RedirectHop, Timings};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use std::error::Error as _;
use std::time::{Duration, Instant};
use url::Url;

/// Maximum redirects followed before a request is abandoned
pub const MAX_REDIRECTS: usize = 5;

/// What came back from a measured request
#[derive(Clone, Debug, Default)]
pub struct ProbeResponse {
    /// Status of the final response
    pub status: u16,
    /// Body size of the final response
    pub bytes: u64,
    /// Redirect hops, in order
    pub redirects: Vec<RedirectHop>,
    /// Request timings
    pub timings: Timings,
}

/// A request that produced no usable response
///
/// `message` carries the whole error chain so the classifier can look for
/// DNS/timeout/TLS signatures in it.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    /// Error chain text
    pub message: String,
    /// Redirects followed before the failure
    pub redirects: Vec<RedirectHop>,
    /// Timings up to the failure
    pub timings: Timings,
}

impl TransportError {
    /// Failure with no timing information
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            redirects: Vec::new(),
            timings: Timings::default(),
        }
    }
}

/// Performs one timed request through a proxy session
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    /// Fetch `url` through `session`
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when no final response was received
    /// (connect/proxy failure, TLS failure, timeout, redirect loop).
    async fn measure(
        &self,
        url: &str,
        session: &ProxySession,
        dns_mode: DnsMode,
        timeout: Duration,
    ) -> Result<ProbeResponse, TransportError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// reqwest-backed [`NetworkProbe`]
#[derive(Clone, Debug)]
pub struct ReqwestProbe {
    headers: HeaderMap,
}

impl ReqwestProbe {
    /// Create a probe sending the configured browser-like headers
    pub fn new(config: &HttpClientConfig) -> Self {
        Self {
            headers: default_headers(config),
        }
    }

    fn client(
        &self,
        session: &ProxySession,
        dns_mode: DnsMode,
        timeout: Duration,
    ) -> Result<reqwest::Client, TransportError> {
        let proxy = match session.proxy_type {
            ProxyType::Http => reqwest::Proxy::all(session.proxy_url(dns_mode))
                .map(|p| p.basic_auth(&session.username, &session.password)),
            ProxyType::Socks5 => {
                // SOCKS credentials only travel in the proxy URL
                let mut proxy_url = Url::parse(&session.proxy_url(dns_mode))
                    .map_err(|e| TransportError::new(format!("invalid proxy address: {e}")))?;
                proxy_url
                    .set_username(&session.username)
                    .and_then(|()| proxy_url.set_password(Some(&session.password)))
                    .map_err(|()| TransportError::new("invalid proxy credentials"))?;
                reqwest::Proxy::all(proxy_url.as_str())
            }
        }
        .map_err(|e| TransportError::new(error_chain(e)))?;

        reqwest::Client::builder()
            .proxy(proxy)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .default_headers(self.headers.clone())
            .build()
            .map_err(|e| TransportError::new(error_chain(e)))
    }
}

#[async_trait]
impl NetworkProbe for ReqwestProbe {
    async fn measure(
        &self,
        url: &str,
        session: &ProxySession,
        dns_mode: DnsMode,
        timeout: Duration,
    ) -> Result<ProbeResponse, TransportError> {
        let client = self.client(session, dns_mode, timeout)?;
        let mut current =
            Url::parse(url).map_err(|e| TransportError::new(format!("invalid url: {e}")))?;
        let mut redirects = Vec::new();
        let start = Instant::now();

        let fail = |message: String, redirects: &Vec<RedirectHop>| TransportError {
            message,
            redirects: redirects.clone(),
            timings: Timings {
                total_ms: Some(elapsed_ms(start)),
                ..Default::default()
            },
        };

        loop {
            let response = client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| fail(error_chain(e), &redirects))?;
            let status = response.status();

            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|loc| current.join(loc).ok());

            if let (true, Some(next)) = (status.is_redirection(), location) {
                if redirects.len() == MAX_REDIRECTS {
                    return Err(fail(
                        format!("too many redirects (more than {MAX_REDIRECTS})"),
                        &redirects,
                    ));
                }
                redirects.push(RedirectHop {
                    status: status.as_u16(),
                    from: current.to_string(),
                    to: next.to_string(),
                });
                current = next;
                continue;
            }

            let ttfb_ms = elapsed_ms(start);
            let body = response
                .bytes()
                .await
                .map_err(|e| fail(error_chain(e), &redirects))?;

            return Ok(ProbeResponse {
                status: status.as_u16(),
                bytes: body.len() as u64,
                redirects,
                timings: Timings {
                    ttfb_ms: Some(ttfb_ms),
                    total_ms: Some(elapsed_ms(start)),
                    ..Default::default()
                },
            });
        }
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

fn default_headers(config: &HttpClientConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let fixed = [
        (header::USER_AGENT, config.user_agent.as_str()),
        (header::ACCEPT, config.accept.as_str()),
        (header::ACCEPT_LANGUAGE, config.accept_language.as_str()),
        (header::ACCEPT_ENCODING, "gzip, deflate, br"),
        (header::DNT, "1"),
        (header::UPGRADE_INSECURE_REQUESTS, "1"),
    ];
    for (name, value) in fixed {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(e) => tracing::warn!(header = %name, error = %e, "skipping invalid header value"),
        }
    }

    for (name, value) in &config.custom_headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "skipping invalid custom header"),
        }
    }
    headers
}

/// Full error chain, prefixed with `timed out` for timeouts
///
/// The request URL is stripped so a target host like `dns.example` cannot
/// match a classifier signature.
fn error_chain(error: reqwest::Error) -> String {
    let timed_out = error.is_timeout();
    let error = error.without_url();
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    if timed_out {
        message = format!("timed out: {message}");
    }
    message
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

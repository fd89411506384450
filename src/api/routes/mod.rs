//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`runs`] - Run submission, progress and event streams
//! - [`catalog`] - Geo catalog lookups and refresh
//! - [`system`] - Health and OpenAPI

use crate::config::Config;
use crate::types::{DnsMode, DnsRunParams, MultiGeoParams, ProxyType, RunParams, StickyPolicy};
use crate::utils::normalize_targets;
use serde::{Deserialize, Serialize};

mod catalog;
mod runs;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use catalog::*;
pub use runs::*;
pub use system::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Targets as pasted text (one per line) or as a list
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(untagged)]
pub enum TargetList {
    /// Newline-separated targets
    Text(String),
    /// One target per entry (entries may themselves hold several lines)
    List(Vec<String>),
}

impl Default for TargetList {
    fn default() -> Self {
        TargetList::List(Vec::new())
    }
}

impl TargetList {
    /// Trimmed, non-empty targets, optionally de-duplicated
    pub fn normalize(&self, dedupe: bool) -> Vec<String> {
        match self {
            TargetList::Text(text) => normalize_targets([text], dedupe),
            TargetList::List(items) => normalize_targets(items, dedupe),
        }
    }
}

/// Request body for POST /runs
///
/// Omitted fields fall back to the server configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(default)]
pub struct RunRequest {
    /// URLs to check
    pub targets: TargetList,
    /// Drop repeated targets before submitting (default: false)
    pub dedupe: bool,
    /// ISO country code
    pub country: Option<String>,
    /// Region code
    pub region: Option<String>,
    /// City
    pub city: Option<String>,
    /// ISP
    pub isp: Option<String>,
    /// Proxy protocol
    pub proxy_type: Option<ProxyType>,
    /// Where hostnames are resolved
    pub dns_mode: Option<DnsMode>,
    /// Connection type (wifi, mobile, ...)
    pub connection_type: Option<String>,
    /// Proxy gateway host override
    pub proxy_host: Option<String>,
    /// Proxy gateway port override
    pub proxy_port: Option<u16>,
    /// Per-request timeout in seconds
    pub timeout_sec: Option<u64>,
    /// Capture a screenshot of successful checks
    pub make_screenshot: Option<bool>,
    /// Embed session debug info in reports
    pub debug_mode: bool,
    /// Sticky session policy
    pub sticky_policy: Option<StickyPolicy>,
    /// Sticky session lifetime in seconds
    pub sticky_ttl_sec: Option<u64>,
}

impl RunRequest {
    /// Run parameters with configuration defaults filled in
    pub fn into_params(self, config: &Config) -> RunParams {
        let blank_to_none = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        RunParams {
            targets: self.targets.normalize(self.dedupe),
            country: self.country.unwrap_or_default().trim().to_uppercase(),
            region_code: blank_to_none(self.region),
            city: blank_to_none(self.city),
            isp: blank_to_none(self.isp),
            proxy_type: self.proxy_type.unwrap_or(config.proxy.proxy_type),
            dns_mode: self.dns_mode.unwrap_or(config.proxy.dns_mode),
            connection_type: blank_to_none(self.connection_type),
            proxy_host: blank_to_none(self.proxy_host),
            proxy_port: self.proxy_port,
            timeout_sec: self
                .timeout_sec
                .unwrap_or_else(|| config.execution.timeout.as_secs()),
            make_screenshot: self
                .make_screenshot
                .unwrap_or(config.screenshots.enabled_default),
            debug_mode: self.debug_mode,
            sticky_policy: self.sticky_policy.unwrap_or(config.proxy.sticky_policy),
            sticky_ttl_sec: self
                .sticky_ttl_sec
                .unwrap_or_else(|| config.proxy.sticky_ttl.as_secs()),
        }
    }
}

/// Request body for POST /runs/dns
#[derive(Debug, Clone, Default, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(default)]
pub struct DnsRunRequest {
    /// Domains to look up
    pub targets: TargetList,
    /// Drop repeated domains before submitting (default: false)
    pub dedupe: bool,
}

impl DnsRunRequest {
    /// Normalized DNS run parameters
    pub fn into_params(self) -> DnsRunParams {
        DnsRunParams {
            targets: self.targets.normalize(self.dedupe),
        }
    }
}

/// Request body for POST /runs/multi-geo
#[derive(Debug, Clone, Default, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(default)]
pub struct MultiGeoRunRequest {
    /// Countries to check every target from
    pub countries: Vec<String>,
    /// Targets and shared settings; `country` is ignored
    #[serde(flatten)]
    pub run: RunRequest,
}

impl MultiGeoRunRequest {
    /// Multi-geo parameters with configuration defaults filled in
    pub fn into_params(self, config: &Config) -> MultiGeoParams {
        MultiGeoParams {
            countries: self
                .countries
                .iter()
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty())
                .collect(),
            base: self.run.into_params(config),
        }
    }
}

/// Response for run submissions
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct RunCreated {
    /// Identifier of the new run
    pub run_id: String,
}

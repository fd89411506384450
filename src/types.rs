//! Core types for geoprobe

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

const RUN_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const RUN_ID_LEN: usize = 12;

/// Opaque run identifier: 12 lowercase alphanumeric characters
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Mint a fresh random identifier
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let id = (0..RUN_ID_LEN)
            .map(|_| RUN_ID_ALPHABET[rng.gen_range(0..RUN_ID_ALPHABET.len())] as char)
            .collect();
        Self(id)
    }

    /// Borrow the identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RunId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RunId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which task/executor pairing a run uses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// One country, many URLs
    Single,
    /// DNS/whois lookups for many domains
    Dns,
    /// Every URL checked from every listed country
    MultiGeo,
}

/// Outcome label of one check
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Response with a 2xx/3xx status
    Success,
    /// Response with any other status
    HttpError,
    /// Name resolution failed
    DnsError,
    /// Connection failed, or no response at all
    ConnectError,
    /// TLS handshake or certificate failure
    TlsError,
    /// The request timed out
    Timeout,
}

impl Classification {
    /// Wire name of the label
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Success => "success",
            Classification::HttpError => "http_error",
            Classification::DnsError => "dns_error",
            Classification::ConnectError => "connect_error",
            Classification::TlsError => "tls_error",
            Classification::Timeout => "timeout",
        }
    }

    /// Whether this counts towards a run's `ok` total
    pub fn is_success(&self) -> bool {
        matches!(self, Classification::Success)
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proxy protocol
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    /// HTTP CONNECT proxy
    #[default]
    Http,
    /// SOCKS5 proxy
    Socks5,
}

impl ProxyType {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyType::Http => "http",
            ProxyType::Socks5 => "socks5",
        }
    }
}

impl std::str::FromStr for ProxyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(ProxyType::Http),
            "socks5" => Ok(ProxyType::Socks5),
            other => Err(format!("unknown proxy type: {other}")),
        }
    }
}

/// Where target hostnames are resolved
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DnsMode {
    /// Resolve locally before connecting through the proxy
    Local,
    /// Let the proxy resolve names
    #[default]
    Proxy,
}

impl DnsMode {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            DnsMode::Local => "local",
            DnsMode::Proxy => "proxy",
        }
    }
}

impl std::str::FromStr for DnsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(DnsMode::Local),
            "proxy" => Ok(DnsMode::Proxy),
            other => Err(format!("unknown dns mode: {other}")),
        }
    }
}

/// Sticky session policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StickyPolicy {
    /// Sticky only when a run has more than one target
    #[default]
    Auto,
    /// Always sticky
    On,
    /// Never sticky
    Off,
}

impl StickyPolicy {
    /// Resolve the policy for a run with `targets` tasks
    pub fn resolve(&self, targets: usize) -> bool {
        match self {
            StickyPolicy::On => true,
            StickyPolicy::Off => false,
            StickyPolicy::Auto => targets > 1,
        }
    }
}

impl std::str::FromStr for StickyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(StickyPolicy::Auto),
            "on" => Ok(StickyPolicy::On),
            "off" => Ok(StickyPolicy::Off),
            other => Err(format!("unknown sticky policy: {other}")),
        }
    }
}

/// Parameters of a single-country check run
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct RunParams {
    /// URLs to check, in submission order (duplicates are checked independently)
    pub targets: Vec<String>,

    /// ISO-3166 alpha-2 country code
    pub country: String,

    /// Region code within the country
    pub region_code: Option<String>,

    /// City within the country
    pub city: Option<String>,

    /// ISP name
    pub isp: Option<String>,

    /// Proxy protocol
    pub proxy_type: ProxyType,

    /// Where target hostnames are resolved
    pub dns_mode: DnsMode,

    /// Connection type (None = wifi)
    pub connection_type: Option<String>,

    /// Proxy host override
    pub proxy_host: Option<String>,

    /// Proxy port override
    pub proxy_port: Option<u16>,

    /// Per-request timeout in seconds
    pub timeout_sec: u64,

    /// Capture a screenshot of successful checks
    pub make_screenshot: bool,

    /// Include session debug info in reports
    pub debug_mode: bool,

    /// Sticky session policy
    pub sticky_policy: StickyPolicy,

    /// Sticky session lifetime in seconds
    pub sticky_ttl_sec: u64,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            country: String::new(),
            region_code: None,
            city: None,
            isp: None,
            proxy_type: ProxyType::default(),
            dns_mode: DnsMode::default(),
            connection_type: None,
            proxy_host: None,
            proxy_port: None,
            timeout_sec: 60,
            make_screenshot: false,
            debug_mode: false,
            sticky_policy: StickyPolicy::default(),
            sticky_ttl_sec: 360,
        }
    }
}

impl RunParams {
    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }

    /// Run settings echoed in `run_started`: everything except the target list
    pub fn settings(&self) -> serde_json::Value {
        settings_without_targets(self)
    }
}

/// Parameters of a DNS/whois run
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct DnsRunParams {
    /// Domains to look up
    pub targets: Vec<String>,
}

impl DnsRunParams {
    /// Run settings echoed in `run_started`
    pub fn settings(&self) -> serde_json::Value {
        settings_without_targets(self)
    }
}

/// Parameters of a multi-geo run: every target from every country
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct MultiGeoParams {
    /// Countries to check from; `base.country` is ignored
    pub countries: Vec<String>,

    /// Targets and shared settings
    pub base: RunParams,
}

impl MultiGeoParams {
    /// Run settings echoed in `run_started`
    pub fn settings(&self) -> serde_json::Value {
        serde_json::json!({
            "countries": self.countries,
            "base": self.base.settings(),
        })
    }
}

fn settings_without_targets<T: Serialize>(params: &T) -> serde_json::Value {
    let mut value = serde_json::to_value(params).unwrap_or(serde_json::Value::Null);
    if let Some(map) = value.as_object_mut() {
        map.remove("targets");
    }
    value
}

/// One URL check: a target plus the run-wide settings it was submitted with
#[derive(Clone, Debug)]
pub struct CheckTask {
    /// Owning run
    pub run_id: RunId,
    /// Target as submitted
    pub target: String,
    /// Country this check goes out from
    pub country: String,
    /// Resolved sticky flag
    pub sticky: bool,
    /// Run-wide settings shared by every task of the run
    pub params: Arc<RunParams>,
}

/// One DNS/whois lookup
#[derive(Clone, Debug)]
pub struct DnsTask {
    /// Owning run
    pub run_id: RunId,
    /// Domain as submitted
    pub domain: String,
}

/// Request timings in milliseconds
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Timings {
    /// Name resolution
    pub dns_ms: Option<u64>,
    /// TCP connect
    pub tcp_ms: Option<u64>,
    /// TLS handshake
    pub tls_ms: Option<u64>,
    /// Time to response headers
    pub ttfb_ms: Option<u64>,
    /// Time until the body was read
    pub total_ms: Option<u64>,
}

/// One hop of a redirect chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RedirectHop {
    /// Redirect status code
    pub status: u16,
    /// URL that answered with the redirect
    pub from: String,
    /// Location it pointed to
    pub to: String,
}

/// Stored outcome of one check
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskRecord {
    /// Target as submitted
    pub url: String,
    /// Country the check went out from
    pub country: String,
    /// Outcome label
    pub result: Classification,
    /// HTTP status of the final response
    pub http_code: Option<u16>,
    /// Body size of the final response
    pub bytes: Option<u64>,
    /// Request timings
    pub timings: Timings,
    /// Redirects followed
    pub redirects: Vec<RedirectHop>,
    /// Proxy exit IP, when known
    pub ext_ip: Option<String>,
    /// Report card, relative to the output root
    pub report_path: Option<String>,
    /// Screenshot, relative to the output root
    pub screenshot_path: Option<String>,
    /// Free-text notes (errors joined with " | ")
    pub notes: Option<String>,
}

impl TaskRecord {
    /// A record for a check that never produced a response
    pub fn failed(url: impl Into<String>, country: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            country: country.into(),
            result: Classification::ConnectError,
            http_code: None,
            bytes: None,
            timings: Timings::default(),
            redirects: Vec::new(),
            ext_ip: None,
            report_path: None,
            screenshot_path: None,
            notes: Some(note.into()),
        }
    }

    /// Append a note, joining with " | "
    pub fn add_note(&mut self, note: impl AsRef<str>) {
        self.notes = Some(join_note(self.notes.take(), note.as_ref()));
    }
}

pub(crate) fn join_note(existing: Option<String>, note: &str) -> String {
    match existing {
        Some(existing) if !existing.is_empty() => format!("{existing} | {note}"),
        _ => note.to_string(),
    }
}

/// Stored outcome of one DNS/whois lookup
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct DnsRecord {
    /// Domain as submitted
    pub domain: String,
    /// Resolved addresses, de-duplicated in resolver order
    pub ips: Vec<String>,
    /// Network owner matched from RDAP data
    pub owner: String,
    /// Lookup error (None = success)
    pub error: Option<String>,
    /// Geolocated country of the first address
    pub country_name: Option<String>,
    /// Geolocated city of the first address
    pub city: Option<String>,
    /// Raw RDAP dump, relative to the output root
    pub whois_path: Option<String>,
    /// Short whois status line
    pub whois_note: Option<String>,
}

impl DnsRecord {
    /// Whether the lookup succeeded
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A record of any run kind
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum RunRecord {
    /// URL check
    Check(TaskRecord),
    /// DNS/whois lookup
    Dns(DnsRecord),
}

impl RunRecord {
    /// Whether this record counts towards `ok`
    pub fn is_success(&self) -> bool {
        match self {
            RunRecord::Check(record) => record.result.is_success(),
            RunRecord::Dns(record) => record.is_success(),
        }
    }

    /// The `*_finished` event announcing this record
    pub fn finished_event(&self, run_id: &RunId) -> RunEvent {
        match self {
            RunRecord::Check(record) => RunEvent::CheckFinished {
                run_id: run_id.clone(),
                record: record.clone(),
            },
            RunRecord::Dns(record) => RunEvent::DnsFinished {
                run_id: run_id.clone(),
                record: record.clone(),
            },
        }
    }
}

/// Aggregate outcome of a finished run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RunTotals {
    /// Successful records
    pub ok: usize,
    /// Every other record
    pub err: usize,
    /// Wall time from start to finish
    pub time_ms: u64,
}

/// Progress snapshot of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RunProgress {
    /// Tasks in the run
    pub total: usize,
    /// Tasks finished so far
    pub done: usize,
}

impl RunProgress {
    /// Whether every task has finished
    pub fn is_complete(&self) -> bool {
        self.done >= self.total
    }
}

/// Progress event published on a run's event bus
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// Run registered; always the first event of a run
    RunStarted {
        /// Run ID
        run_id: RunId,
        /// Registration time
        ts: DateTime<Utc>,
        /// Run kind
        kind: RunKind,
        /// Submitted parameters without the target list
        #[schema(value_type = Object)]
        settings: serde_json::Value,
    },

    /// A check was picked up by a worker
    CheckStarted {
        /// Run ID
        run_id: RunId,
        /// Target as submitted
        url: String,
        /// Country
        country: String,
        /// Region code
        region: Option<String>,
        /// ISP
        isp: Option<String>,
    },

    /// A check finished
    CheckFinished {
        /// Run ID
        run_id: RunId,
        /// Outcome
        record: TaskRecord,
    },

    /// A DNS lookup was picked up by a worker
    DnsStarted {
        /// Run ID
        run_id: RunId,
        /// Domain
        domain: String,
    },

    /// A DNS lookup finished
    DnsFinished {
        /// Run ID
        run_id: RunId,
        /// Outcome
        record: DnsRecord,
    },

    /// Every task finished; always the last event of a run
    RunFinished {
        /// Run ID
        run_id: RunId,
        /// Aggregate outcome
        totals: RunTotals,
        /// Run summary, relative to the output root
        summary: Option<String>,
    },
}

impl RunEvent {
    /// The event's `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            RunEvent::RunStarted { .. } => "run_started",
            RunEvent::CheckStarted { .. } => "check_started",
            RunEvent::CheckFinished { .. } => "check_finished",
            RunEvent::DnsStarted { .. } => "dns_started",
            RunEvent::DnsFinished { .. } => "dns_finished",
            RunEvent::RunFinished { .. } => "run_finished",
        }
    }

    /// The run this event belongs to
    pub fn run_id(&self) -> &RunId {
        match self {
            RunEvent::RunStarted { run_id, .. }
            | RunEvent::CheckStarted { run_id, .. }
            | RunEvent::CheckFinished { run_id, .. }
            | RunEvent::DnsStarted { run_id, .. }
            | RunEvent::DnsFinished { run_id, .. }
            | RunEvent::RunFinished { run_id, .. } => run_id,
        }
    }
}

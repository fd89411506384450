//! Configuration types for geoprobe
//!
//! The configuration is immutable once an orchestrator is built from it.
//! [`ConfigLoader`] assembles it from an optional TOML file, an optional
//! `.env` file and process environment overrides.

use crate::error::{Error, Result};
use crate::types::{DnsMode, ProxyType, StickyPolicy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use utoipa::ToSchema;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "GEOPROBE_CONFIG";

/// Locations probed (in order) when no explicit config path is given
const DEFAULT_CONFIG_LOCATIONS: &[&str] = &["geoprobe.toml", "config/geoprobe.toml"];

/// HTTP listener settings for the front end
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AppConfig {
    /// Host/interface to bind (default: "0.0.0.0")
    #[serde(default = "default_app_host")]
    pub host: String,

    /// Port to bind (default: 8000)
    #[serde(default = "default_app_port")]
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_app_host(),
            port: default_app_port(),
        }
    }
}

/// Log verbosity for the `geoprobe` binary
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct LoggingConfig {
    /// Default tracing directive, overridden by `RUST_LOG` (default: "info")
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Filesystem roots
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PathsConfig {
    /// Output root for reports, screenshots and whois dumps (default: "./logs")
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,

    /// Data directory (default: "./data")
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            logs_dir: default_logs_dir(),
            data_dir: default_data_dir(),
        }
    }
}

/// Run execution settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ExecutionConfig {
    /// Worker pool size per run (default: 5)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Default per-request timeout when a submission omits one (default: 60 seconds)
    #[serde(
        rename = "timeout_sec",
        default = "default_timeout",
        with = "duration_serde"
    )]
    #[schema(value_type = u64)]
    pub timeout: Duration,

    /// Pending events a run's event bus retains before dropping (default: 100)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Write a markdown summary table when a run finishes (default: false)
    #[serde(default)]
    pub write_run_summary: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            timeout: default_timeout(),
            event_buffer: default_event_buffer(),
            write_run_summary: false,
        }
    }
}

/// Proxy defaults offered to submissions
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ProxyConfig {
    /// Proxy protocol (default: http)
    #[serde(rename = "type", default)]
    pub proxy_type: ProxyType,

    /// Where target hostnames are resolved (default: proxy)
    #[serde(default)]
    pub dns_mode: DnsMode,

    /// Sticky session policy (default: auto)
    #[serde(default)]
    pub sticky_policy: StickyPolicy,

    /// Sticky session lifetime (default: 360 seconds)
    #[serde(
        rename = "sticky_ttl_sec",
        default = "default_sticky_ttl",
        with = "duration_serde"
    )]
    #[schema(value_type = u64)]
    pub sticky_ttl: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            proxy_type: ProxyType::default(),
            dns_mode: DnsMode::default(),
            sticky_policy: StickyPolicy::default(),
            sticky_ttl: default_sticky_ttl(),
        }
    }
}

/// Screenshot renderer settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ScreenshotConfig {
    /// Whether the front end pre-selects screenshots (default: false)
    #[serde(default)]
    pub enabled_default: bool,

    /// Process-wide limit on concurrent renders, shared by all runs (default: 1)
    #[serde(default = "default_screenshot_workers")]
    pub max_workers: usize,

    /// Viewport width (default: 1366)
    #[serde(default = "default_screenshot_width")]
    pub width: u32,

    /// Viewport height (default: 768)
    #[serde(default = "default_screenshot_height")]
    pub height: u32,

    /// Render timeout (default: 30 seconds)
    #[serde(
        rename = "timeout_sec",
        default = "default_screenshot_timeout",
        with = "duration_serde"
    )]
    #[schema(value_type = u64)]
    pub timeout: Duration,

    /// Extra settle time after page load (default: 0)
    #[serde(
        rename = "wait_after_load_sec",
        default,
        with = "duration_serde"
    )]
    #[schema(value_type = u64)]
    pub wait_after_load: Duration,

    /// Renderer executable (falls back to `geoprobe-screenshot` on PATH)
    #[serde(default)]
    pub command: Option<PathBuf>,

    /// Fixed arguments passed to the renderer executable
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            enabled_default: false,
            max_workers: default_screenshot_workers(),
            width: default_screenshot_width(),
            height: default_screenshot_height(),
            timeout: default_screenshot_timeout(),
            wait_after_load: Duration::ZERO,
            command: None,
            args: Vec::new(),
        }
    }
}

/// SOAX proxy account settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SoaxConfig {
    /// Proxy gateway host (default: "proxy.soax.com")
    #[serde(default = "default_soax_host")]
    pub host: String,

    /// Gateway port used when a submission has no override (default: 9001)
    #[serde(default = "default_soax_port")]
    pub port_default_port: u16,

    /// Port-mode login; sessions cannot be built without it
    #[serde(default)]
    pub port_login: String,

    /// Gateway port for sticky checks without an override (default: 5000)
    #[serde(default = "default_soax_sticky_port")]
    pub port_sticky: u16,

    /// Geo catalog API root (default: "https://api.soax.com/api/")
    #[serde(default = "default_soax_api_base_url")]
    pub api_base_url: String,

    /// Catalog API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Catalog package key
    #[serde(default)]
    pub package_key: Option<String>,
}

impl Default for SoaxConfig {
    fn default() -> Self {
        Self {
            host: default_soax_host(),
            port_default_port: default_soax_port(),
            port_login: String::new(),
            port_sticky: default_soax_sticky_port(),
            api_base_url: default_soax_api_base_url(),
            api_key: None,
            package_key: None,
        }
    }
}

impl SoaxConfig {
    /// Copy with secrets masked, for logging and the settings echo
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "***".to_string());
        Self {
            port_login: mask_login(&self.port_login),
            api_key: mask(&self.api_key),
            package_key: mask(&self.package_key),
            ..self.clone()
        }
    }
}

/// Outgoing request headers used by the probe and renderer
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HttpClientConfig {
    /// User-Agent header
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Accept header
    #[serde(default = "default_accept")]
    pub accept: String,

    /// Accept-Language header
    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// Extra headers added to every probe request
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept: default_accept(),
            accept_language: default_accept_language(),
            custom_headers: HashMap::new(),
        }
    }
}

/// DNS/whois lookup settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DnsCheckerConfig {
    /// Provider name → keywords searched in RDAP data
    #[serde(default)]
    pub provider_keywords: BTreeMap<String, Vec<String>>,

    /// RDAP endpoint template, `{ip}` is substituted
    #[serde(default = "default_rdap_url")]
    pub rdap_url: String,

    /// Geolocation endpoint template, `{ip}` is substituted
    #[serde(default = "default_geolocation_url")]
    pub geolocation_url: String,

    /// Timeout for each RDAP/geolocation request (default: 10 seconds)
    #[serde(
        rename = "lookup_timeout_sec",
        default = "default_lookup_timeout",
        with = "duration_serde"
    )]
    #[schema(value_type = u64)]
    pub lookup_timeout: Duration,
}

impl Default for DnsCheckerConfig {
    fn default() -> Self {
        Self {
            provider_keywords: BTreeMap::new(),
            rdap_url: default_rdap_url(),
            geolocation_url: default_geolocation_url(),
            lookup_timeout: default_lookup_timeout(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// HTTP listener
    #[serde(default)]
    pub app: AppConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Output and data directories
    #[serde(default)]
    pub paths: PathsConfig,

    /// Worker pool and event buffering
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Proxy defaults
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Screenshot renderer
    #[serde(default)]
    pub screenshots: ScreenshotConfig,

    /// SOAX account
    #[serde(default)]
    pub soax: SoaxConfig,

    /// Outgoing request headers
    #[serde(default)]
    pub http_client: HttpClientConfig,

    /// DNS/whois checker
    #[serde(default)]
    pub dns_checker: DnsCheckerConfig,

    /// REST API
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Output root
    pub fn logs_dir(&self) -> &PathBuf {
        &self.paths.logs_dir
    }

    /// Parse a TOML document
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|source| Error::TomlParse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Reject settings the orchestrator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.execution.max_concurrency == 0 {
            return Err(Error::config(
                "execution.max_concurrency",
                "must be at least 1",
            ));
        }
        if self.execution.event_buffer == 0 {
            return Err(Error::config("execution.event_buffer", "must be at least 1"));
        }
        if self.screenshots.max_workers == 0 {
            return Err(Error::config("screenshots.max_workers", "must be at least 1"));
        }
        Ok(())
    }

    /// Apply environment overrides, returning a warning per value that failed to parse
    ///
    /// `lookup` is normally `std::env::var(..).ok()`; tests pass a map.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut overrides = EnvOverrides {
            lookup,
            warnings: Vec::new(),
        };

        overrides.string("APP_HOST", &mut self.app.host);
        overrides.parsed("APP_PORT", &mut self.app.port);
        overrides.string("LOG_LEVEL", &mut self.logging.level);
        overrides.path("LOG_DIR", &mut self.paths.logs_dir);
        overrides.path("DATA_DIR", &mut self.paths.data_dir);
        overrides.parsed("MAX_CONCURRENCY", &mut self.execution.max_concurrency);
        overrides.seconds("CHECK_TIMEOUT_SEC", &mut self.execution.timeout);
        overrides.parsed("PROXY_TYPE", &mut self.proxy.proxy_type);
        overrides.parsed("DNS_MODE", &mut self.proxy.dns_mode);
        overrides.parsed("STICKY_POLICY", &mut self.proxy.sticky_policy);
        overrides.seconds("STICKY_TTL_SEC", &mut self.proxy.sticky_ttl);
        overrides.parsed("MAX_SCREENSHOT_WORKERS", &mut self.screenshots.max_workers);
        overrides.seconds("SCREENSHOT_TIMEOUT_SEC", &mut self.screenshots.timeout);
        overrides.seconds(
            "SCREENSHOT_WAIT_AFTER_LOAD_SEC",
            &mut self.screenshots.wait_after_load,
        );
        overrides.string("SOAX_HOST", &mut self.soax.host);
        overrides.parsed("SOAX_PORT_DEFAULT_PORT", &mut self.soax.port_default_port);
        overrides.string("SOAX_PORT_LOGIN", &mut self.soax.port_login);
        overrides.parsed("SOAX_PORT_STICKY", &mut self.soax.port_sticky);
        overrides.string("SOAX_API_BASE_URL", &mut self.soax.api_base_url);
        overrides.optional("SOAX_API_KEY", &mut self.soax.api_key);
        overrides.optional("SOAX_PACKAGE_KEY", &mut self.soax.package_key);
        overrides.string("USER_AGENT", &mut self.http_client.user_agent);

        overrides.warnings
    }
}

struct EnvOverrides<F> {
    lookup: F,
    warnings: Vec<String>,
}

impl<F> EnvOverrides<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&mut self, key: &str, target: &mut String) {
        if let Some(value) = (self.lookup)(key) {
            *target = value;
        }
    }

    fn optional(&mut self, key: &str, target: &mut Option<String>) {
        if let Some(value) = (self.lookup)(key) {
            *target = Some(value);
        }
    }

    fn path(&mut self, key: &str, target: &mut PathBuf) {
        if let Some(value) = (self.lookup)(key) {
            *target = PathBuf::from(value);
        }
    }

    fn parsed<T: FromStr>(&mut self, key: &str, target: &mut T) {
        if let Some(value) = (self.lookup)(key) {
            match value.trim().parse() {
                Ok(parsed) => *target = parsed,
                Err(_) => self
                    .warnings
                    .push(format!("could not parse env var {key}={value}; keeping configured value")),
            }
        }
    }

    fn seconds(&mut self, key: &str, target: &mut Duration) {
        let mut secs = target.as_secs();
        self.parsed(key, &mut secs);
        *target = Duration::from_secs(secs);
    }
}

/// Where the configuration came from, plus non-fatal findings
#[derive(Debug)]
pub struct ConfigLoad {
    /// The assembled configuration
    pub config: Config,
    /// File the configuration was read from (None = defaults + environment)
    pub source: Option<PathBuf>,
    /// Non-fatal issues worth logging
    pub warnings: Vec<String>,
}

/// Assembles a [`Config`] from file, `.env` and environment
#[derive(Debug, Default, Clone)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
}

impl ConfigLoader {
    /// Loader probing the default locations
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit config file; a missing file becomes an error
    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Use an explicit `.env` file instead of `./.env`
    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// Load using the process environment
    pub fn load(&self) -> Result<ConfigLoad> {
        let env_loaded = match &self.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true),
            None => dotenvy::dotenv().map(|_| true),
        }
        .or_else(|err| match err {
            dotenvy::Error::Io(_) => Ok(false),
            other => Err(other),
        })?;

        let mut load = self.load_with(|key| std::env::var(key).ok())?;
        if !env_loaded && self.env_file.is_some() {
            load.warnings
                .push("configured env file could not be read".to_string());
        }
        Ok(load)
    }

    /// Load using an arbitrary variable lookup
    pub fn load_with<F>(&self, lookup: F) -> Result<ConfigLoad>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();

        let (explicit, candidate) = match (&self.config_path, lookup(CONFIG_PATH_ENV)) {
            (Some(path), _) => (true, Some(path.clone())),
            (None, Some(from_env)) => (true, Some(PathBuf::from(from_env))),
            (None, None) => (
                false,
                DEFAULT_CONFIG_LOCATIONS
                    .iter()
                    .map(PathBuf::from)
                    .find(|p| p.exists()),
            ),
        };

        let (mut config, source) = match candidate {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(&path)?;
                (Config::from_toml_str(&text, &path)?, Some(path))
            }
            Some(path) if explicit => {
                return Err(Error::config(
                    "config_path",
                    format!("config file not found: {}", path.display()),
                ));
            }
            _ => {
                warnings.push("no geoprobe.toml found; using defaults and environment".to_string());
                (Config::default(), None)
            }
        };

        warnings.extend(config.apply_env_overrides(&lookup));
        config.validate()?;

        Ok(ConfigLoad {
            config,
            source,
            warnings,
        })
    }
}

/// Mask a login for logs: first and last four characters survive
pub(crate) fn mask_login(login: &str) -> String {
    if login.is_empty() {
        return "(not set)".to_string();
    }
    let chars: Vec<char> = login.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

// Default value functions
fn default_app_host() -> String {
    "0.0.0.0".to_string()
}

fn default_app_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_max_concurrency() -> usize {
    5
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_event_buffer() -> usize {
    100
}

fn default_sticky_ttl() -> Duration {
    Duration::from_secs(360)
}

fn default_screenshot_workers() -> usize {
    1
}

fn default_screenshot_width() -> u32 {
    1366
}

fn default_screenshot_height() -> u32 {
    768
}

fn default_screenshot_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_soax_host() -> String {
    "proxy.soax.com".to_string()
}

fn default_soax_port() -> u16 {
    9001
}

fn default_soax_sticky_port() -> u16 {
    5000
}

fn default_soax_api_base_url() -> String {
    "https://api.soax.com/api/".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36".to_string()
}

fn default_accept() -> String {
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string()
}

fn default_accept_language() -> String {
    "en-US,en;q=0.5".to_string()
}

fn default_rdap_url() -> String {
    "https://rdap.org/ip/{ip}".to_string()
}

fn default_geolocation_url() -> String {
    "https://geolocation-db.com/json/{ip}".to_string()
}

fn default_lookup_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_true() -> bool {
    true
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.execution.max_concurrency, 5);
        assert_eq!(config.execution.timeout, Duration::from_secs(60));
        assert_eq!(config.execution.event_buffer, 100);
        assert_eq!(config.screenshots.max_workers, 1);
        assert_eq!(config.screenshots.width, 1366);
        assert_eq!(config.screenshots.height, 768);
        assert_eq!(config.soax.host, "proxy.soax.com");
        assert_eq!(config.soax.port_default_port, 9001);
        assert_eq!(config.proxy.proxy_type, ProxyType::Http);
        assert_eq!(config.proxy.dns_mode, DnsMode::Proxy);
        assert_eq!(config.proxy.sticky_policy, StickyPolicy::Auto);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let text = r#"
            [execution]
            max_concurrency = 2
            timeout_sec = 15

            [proxy]
            type = "socks5"
            dns_mode = "local"

            [dns_checker.provider_keywords]
            Acme = ["acme", "acme-net"]
        "#;
        let config = Config::from_toml_str(text, Path::new("inline.toml")).unwrap();

        assert_eq!(config.execution.max_concurrency, 2);
        assert_eq!(config.execution.timeout, Duration::from_secs(15));
        assert_eq!(config.execution.event_buffer, 100);
        assert_eq!(config.proxy.proxy_type, ProxyType::Socks5);
        assert_eq!(config.proxy.dns_mode, DnsMode::Local);
        assert_eq!(
            config.dns_checker.provider_keywords["Acme"],
            vec!["acme".to_string(), "acme-net".to_string()]
        );
        assert_eq!(config.screenshots.timeout, Duration::from_secs(30));
    }

    #[test]
    fn malformed_toml_reports_path() {
        let err = Config::from_toml_str("execution = [", Path::new("bad.toml")).unwrap_err();
        match err {
            Error::TomlParse { path, .. } => assert_eq!(path, PathBuf::from("bad.toml")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = Config::default();
        let warnings = config.apply_env_overrides(env(&[
            ("MAX_CONCURRENCY", "9"),
            ("CHECK_TIMEOUT_SEC", "5"),
            ("PROXY_TYPE", "socks5"),
            ("SOAX_PORT_LOGIN", "package-123"),
            ("SOAX_API_KEY", "k"),
            ("LOG_DIR", "/tmp/geoprobe-logs"),
        ]));

        assert!(warnings.is_empty());
        assert_eq!(config.execution.max_concurrency, 9);
        assert_eq!(config.execution.timeout, Duration::from_secs(5));
        assert_eq!(config.proxy.proxy_type, ProxyType::Socks5);
        assert_eq!(config.soax.port_login, "package-123");
        assert_eq!(config.soax.api_key.as_deref(), Some("k"));
        assert_eq!(config.paths.logs_dir, PathBuf::from("/tmp/geoprobe-logs"));
    }

    #[test]
    fn unparsable_env_override_is_a_warning_not_an_error() {
        let mut config = Config::default();
        let warnings = config.apply_env_overrides(env(&[("APP_PORT", "eighty")]));

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("APP_PORT"));
        assert_eq!(config.app.port, 8000);
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let mut config = Config::default();
        config.execution.max_concurrency = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::Config { key: Some(ref k), .. }) if k == "execution.max_concurrency"
        ));

        let mut config = Config::default();
        config.screenshots.max_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn loader_reads_explicit_file_and_applies_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geoprobe.toml");
        std::fs::write(&path, "[execution]\nmax_concurrency = 3\n").unwrap();

        let load = ConfigLoader::new()
            .with_config_path(&path)
            .load_with(env(&[("SOAX_HOST", "gw.example.net")]))
            .unwrap();

        assert_eq!(load.source.as_deref(), Some(path.as_path()));
        assert_eq!(load.config.execution.max_concurrency, 3);
        assert_eq!(load.config.soax.host, "gw.example.net");
    }

    #[test]
    fn loader_errors_on_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigLoader::new()
            .with_config_path(dir.path().join("absent.toml"))
            .load_with(env(&[]));
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn loader_honours_config_path_env_var() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[app]\nport = 9100\n").unwrap();
        let path_str = path.to_string_lossy().to_string();

        let load = ConfigLoader::new()
            .load_with(env(&[(CONFIG_PATH_ENV, path_str.as_str())]))
            .unwrap();
        assert_eq!(load.config.app.port, 9100);
    }

    #[test]
    fn redacted_soax_masks_secrets() {
        let soax = SoaxConfig {
            port_login: "package-123456-abcd".into(),
            api_key: Some("secret".into()),
            ..Default::default()
        };
        let redacted = soax.redacted();
        assert_eq!(redacted.port_login, "pack...abcd");
        assert_eq!(redacted.api_key.as_deref(), Some("***"));
        assert!(redacted.package_key.is_none());
    }

    #[test]
    fn config_default_survives_json_round_trip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.execution.timeout, config.execution.timeout);
        assert_eq!(back.proxy.sticky_ttl, config.proxy.sticky_ttl);
        assert_eq!(back.http_client.user_agent, config.http_client.user_agent);
    }
}

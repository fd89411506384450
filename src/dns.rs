//! DNS and whois lookups for DNS runs
//!
//! [`SystemResolver`] resolves a domain with the system resolver, geolocates
//! the first address and looks its network up over RDAP. The raw RDAP
//! document is kept as a `.whois.json` artifact and the network owner is
//! matched against the configured provider keywords.

use crate::config::DnsCheckerConfig;
use crate::report::write_artifact;
use crate::types::DnsRecord;
use crate::utils::{artifact_base_name, relative_path};
use async_trait::async_trait;
use chrono::Local;
use serde_json::Value;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::PathBuf;
use url::Url;

/// Owner when no provider keyword matched
pub const OWNER_UNKNOWN: &str = "Unknown";
/// Owner when the RDAP lookup failed
pub const OWNER_WHOIS_ERROR: &str = "Whois Error";
/// Error text of a failed name resolution
pub const DNS_LOOKUP_FAILED: &str = "DNS lookup failed";

/// Looks up one domain
///
/// Never fails: problems are recorded in the returned [`DnsRecord`].
#[async_trait]
pub trait DomainResolver: Send + Sync {
    /// Resolve, geolocate and whois `domain`
    async fn resolve(&self, domain: &str) -> DnsRecord;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// System resolver plus HTTP geolocation and RDAP
pub struct SystemResolver {
    client: reqwest::Client,
    config: DnsCheckerConfig,
    logs_dir: PathBuf,
}

impl SystemResolver {
    /// Create a resolver writing whois dumps under `logs_dir`
    pub fn new(config: DnsCheckerConfig, logs_dir: PathBuf) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.lookup_timeout)
            .build()?;
        Ok(Self {
            client,
            config,
            logs_dir,
        })
    }

    async fn lookup_ips(&self, host: &str) -> Option<Vec<IpAddr>> {
        let lookup = tokio::net::lookup_host((host, 0));
        let addrs = match tokio::time::timeout(self.config.lookup_timeout, lookup).await {
            Ok(Ok(addrs)) => addrs,
            Ok(Err(e)) => {
                tracing::warn!(domain = %host, error = %e, "DNS lookup failed");
                return None;
            }
            Err(_) => {
                tracing::warn!(domain = %host, "DNS lookup timed out");
                return None;
            }
        };

        let mut ips: Vec<IpAddr> = Vec::new();
        for addr in addrs {
            if !ips.contains(&addr.ip()) {
                ips.push(addr.ip());
            }
        }
        (!ips.is_empty()).then_some(ips)
    }

    async fn geolocate(&self, ip: IpAddr) -> (Option<String>, Option<String>) {
        let url = self.config.geolocation_url.replace("{ip}", &ip.to_string());
        let result = async {
            self.client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json::<Value>()
                .await
        }
        .await;

        match result {
            Ok(data) => {
                let field = |key: &str| {
                    data.get(key)
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                };
                (field("country_name"), field("city"))
            }
            Err(e) => {
                tracing::warn!(ip = %ip, error = %e, "geolocation lookup failed");
                (None, None)
            }
        }
    }

    async fn rdap(&self, ip: IpAddr) -> Result<Value, reqwest::Error> {
        let url = self.config.rdap_url.replace("{ip}", &ip.to_string());
        self.client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/rdap+json, application/json")
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await
    }
}

#[async_trait]
impl DomainResolver for SystemResolver {
    async fn resolve(&self, domain: &str) -> DnsRecord {
        let host = lookup_host_name(domain);
        let mut record = DnsRecord {
            domain: domain.to_string(),
            owner: OWNER_UNKNOWN.to_string(),
            ..Default::default()
        };

        let Some(ips) = self.lookup_ips(&host).await else {
            record.error = Some(DNS_LOOKUP_FAILED.to_string());
            return record;
        };
        record.ips = ips.iter().map(IpAddr::to_string).collect();
        tracing::debug!(domain = %host, ips = ?record.ips, "DNS lookup succeeded");

        let first = ips[0];
        let (country_name, city) = self.geolocate(first).await;
        record.country_name = country_name;
        record.city = city;

        match self.rdap(first).await {
            Ok(data) => {
                record.owner = match_owner(&data, &self.config.provider_keywords);
                let name = artifact_base_name(Local::now(), &host);
                let body = serde_json::to_vec_pretty(&data).unwrap_or_default();
                match write_artifact(&self.logs_dir, &name, "whois.json", &body).await {
                    Ok(path) => {
                        let rel = relative_path(&path, &self.logs_dir);
                        record.whois_note = Some(format!("Saved to {rel}"));
                        record.whois_path = Some(rel);
                    }
                    Err(e) => {
                        tracing::error!(domain = %host, error = %e, "failed to save whois dump");
                        record.whois_note = Some(format!("whois dump not saved: {e}"));
                    }
                }
            }
            Err(e) => {
                tracing::warn!(ip = %first, domain = %host, error = %e, "RDAP lookup failed");
                record.owner = OWNER_WHOIS_ERROR.to_string();
                record.whois_note = Some(e.to_string());
            }
        }
        record
    }

    fn name(&self) -> &'static str {
        "system"
    }
}

/// Host part of a submitted domain (tolerates pasted URLs)
fn lookup_host_name(domain: &str) -> String {
    let domain = domain.trim();
    let candidate = if domain.contains("://") {
        domain.to_string()
    } else {
        format!("http://{domain}")
    };
    Url::parse(&candidate)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_matches(['[', ']']).to_lowercase()))
        .unwrap_or_else(|| domain.to_lowercase())
}

/// Match RDAP data against provider keywords, case-insensitively
///
/// Searches the network name and handle, remarks, and every (nested)
/// entity's name, organisation and e-mail domain.
pub fn match_owner(data: &Value, providers: &BTreeMap<String, Vec<String>>) -> String {
    if providers.is_empty() {
        return OWNER_UNKNOWN.to_string();
    }

    let mut parts = Vec::new();
    for key in ["name", "handle"] {
        if let Some(text) = data.get(key).and_then(Value::as_str) {
            parts.push(text.to_lowercase());
        }
    }
    collect_remarks(data, &mut parts);
    if let Some(entities) = data.get("entities").and_then(Value::as_array) {
        for entity in entities {
            collect_entity(entity, &mut parts);
        }
    }
    let haystack = parts.join(" | ");

    providers
        .iter()
        .find(|(_, keywords)| {
            keywords
                .iter()
                .any(|k| !k.is_empty() && haystack.contains(&k.to_lowercase()))
        })
        .map(|(provider, _)| provider.clone())
        .unwrap_or_else(|| OWNER_UNKNOWN.to_string())
}

fn collect_remarks(node: &Value, parts: &mut Vec<String>) {
    let Some(remarks) = node.get("remarks").and_then(Value::as_array) else {
        return;
    };
    for remark in remarks {
        if let Some(lines) = remark.get("description").and_then(Value::as_array) {
            parts.extend(lines.iter().filter_map(Value::as_str).map(str::to_lowercase));
        }
    }
}

fn collect_entity(entity: &Value, parts: &mut Vec<String>) {
    match entity {
        Value::String(handle) => parts.push(handle.to_lowercase()),
        Value::Object(_) => {
            // vcardArray: ["vcard", [[name, params, type, value], ...]]
            let properties = entity
                .get("vcardArray")
                .and_then(|v| v.get(1))
                .and_then(Value::as_array);
            for property in properties.into_iter().flatten() {
                let name = property.get(0).and_then(Value::as_str);
                let value = property.get(3);
                match (name, value) {
                    (Some("fn" | "org"), Some(Value::String(text))) => parts.push(text.to_lowercase()),
                    (Some("org"), Some(Value::Array(units))) => parts.extend(
                        units.iter().filter_map(Value::as_str).map(str::to_lowercase),
                    ),
                    (Some("email"), Some(Value::String(email))) => {
                        if let Some((_, domain)) = email.split_once('@') {
                            parts.push(domain.to_lowercase());
                        }
                    }
                    _ => {}
                }
            }
            collect_remarks(entity, parts);
            if let Some(nested) = entity.get("entities").and_then(Value::as_array) {
                for inner in nested {
                    collect_entity(inner, parts);
                }
            }
        }
        _ => {}
    }
}

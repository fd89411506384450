//! SOAX port-mode sessions
//!
//! In port mode the account login is fixed and the geo selection travels in
//! the password: `<connection>;<country>;<isp>;<region>;<city>`. Sticky checks
//! go to the gateway's sticky port unless the submission overrides the port.

use super::{ProxySession, SessionProvider};
use crate::config::{SoaxConfig, mask_login};
use crate::error::Error;
use crate::types::CheckTask;
use async_trait::async_trait;

const DEFAULT_CONNECTION: &str = "wifi";

/// Builds SOAX port-mode credentials from config and task settings
#[derive(Clone, Debug)]
pub struct SoaxPortSessionProvider {
    config: SoaxConfig,
}

impl SoaxPortSessionProvider {
    /// Create a provider over the given account settings
    pub fn new(config: SoaxConfig) -> Self {
        Self { config }
    }

    fn build(&self, task: &CheckTask) -> crate::Result<ProxySession> {
        let login = self.config.port_login.trim();
        if login.is_empty() {
            return Err(Error::config(
                "soax.port_login",
                "SOAX port login is not configured (set SOAX_PORT_LOGIN)",
            ));
        }

        let country = task.country.trim();
        if country.is_empty() {
            return Err(Error::Session("a country is required for a SOAX session".into()));
        }

        let params = &task.params;
        let host = params
            .proxy_host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or(&self.config.host)
            .to_string();
        let port = params.proxy_port.unwrap_or(if task.sticky {
            self.config.port_sticky
        } else {
            self.config.port_default_port
        });

        let connection = params
            .connection_type
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CONNECTION);
        let isp = params.isp.as_deref().unwrap_or_default().replace(' ', "+");
        let region = params.region_code.as_deref().unwrap_or_default();
        let city = params.city.as_deref().unwrap_or_default();
        let password = format!("{connection};{country};{isp};{region};{city}");

        let debug_info = serde_json::json!({
            "mode": "port",
            "login": mask_login(login),
            "password": password,
            "host": host,
            "port": port,
            "sticky": task.sticky,
            "source_params": {
                "country": country,
                "region": region,
                "city": city,
                "isp": isp,
                "connection": connection,
                "host_override": params.proxy_host,
                "port_override": params.proxy_port,
            },
        });

        Ok(ProxySession {
            proxy_type: params.proxy_type,
            host,
            port,
            username: login.to_string(),
            password,
            session_id: None,
            ext_ip: None,
            debug_info,
        })
    }
}

#[async_trait]
impl SessionProvider for SoaxPortSessionProvider {
    async fn acquire(&self, task: &CheckTask) -> crate::Result<ProxySession> {
        let session = self.build(task)?;
        tracing::debug!(
            run_id = %task.run_id,
            host = %session.host,
            port = session.port,
            country = %task.country,
            "built SOAX port-mode session"
        );
        Ok(session)
    }

    fn name(&self) -> &'static str {
        "soax-port"
    }
}

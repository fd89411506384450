//! SOAX geo API client
//!
//! Read-only access to `api.soax.com`, which lists the regions, cities and
//! ISPs a package can target in a country. This is not the proxy gateway.

use super::GeoOption;
use crate::config::{HttpClientConfig, SoaxConfig};
use crate::error::{Error, Result};
use reqwest::header;
use serde_json::Value;
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the SOAX geo endpoints
#[derive(Clone)]
pub struct SoaxApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    package_key: Option<String>,
    user_agent: String,
}

impl SoaxApiClient {
    /// Create a client from the account settings
    pub fn new(soax: &SoaxConfig, http_client: &HttpClientConfig) -> Self {
        let non_blank = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        Self {
            http: reqwest::Client::new(),
            base_url: soax.api_base_url.clone(),
            api_key: non_blank(&soax.api_key),
            package_key: non_blank(&soax.package_key),
            user_agent: http_client.user_agent.clone(),
        }
    }

    /// Whether both API keys are set
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.package_key.is_some()
    }

    /// Regions of `country` as `{code: region_slug, name: region}`
    pub async fn regions(&self, country: &str, conn_type: &str) -> Result<Vec<GeoOption>> {
        let body = self
            .get(
                "get-country-regions",
                &[("country_iso", country), ("conn_type", conn_type)],
            )
            .await?;
        entries(&body, "get-country-regions", "region", "region_slug")
    }

    /// Cities of `country`, optionally narrowed to `region`
    pub async fn cities(
        &self,
        country: &str,
        region: Option<&str>,
        conn_type: &str,
    ) -> Result<Vec<GeoOption>> {
        let mut query = vec![("country_iso", country), ("conn_type", conn_type)];
        if let Some(region) = region {
            query.push(("region", region));
        }
        let body = self.get("get-country-cities", &query).await?;
        entries(&body, "get-country-cities", "city", "city_slug")
    }

    /// ISP names of `country`, optionally narrowed to a region and city
    pub async fn isps(
        &self,
        country: &str,
        region: Option<&str>,
        city: Option<&str>,
    ) -> Result<Vec<String>> {
        let mut query = vec![("country_iso", country)];
        if let Some(region) = region {
            query.push(("region", region));
        }
        if let Some(city) = city {
            query.push(("city", city));
        }
        let body = self.get("get-country-isp", &query).await?;
        Ok(entries(&body, "get-country-isp", "isp", "isp_slug")?
            .into_iter()
            .map(|entry| entry.name)
            .collect())
    }

    async fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Value> {
        let (Some(api_key), Some(package_key)) = (&self.api_key, &self.package_key) else {
            return Err(Error::config(
                "soax.api_key",
                "SOAX API key and package key are required (set SOAX_API_KEY and SOAX_PACKAGE_KEY)",
            ));
        };

        let url = Url::parse(&self.base_url)
            .and_then(|base| base.join(endpoint))
            .map_err(|e| Error::config("soax.api_base_url", format!("invalid URL: {e}")))?;

        tracing::debug!(endpoint, "querying SOAX geo API");
        // The query string carries both keys, so errors drop the URL
        let response = self
            .http
            .get(url)
            .query(query)
            .query(&[("api_key", api_key), ("package_key", package_key)])
            .header(header::USER_AGENT, &self.user_agent)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Network(e.without_url()))?;

        response
            .json()
            .await
            .map_err(|e| Error::Network(e.without_url()))
    }
}

/// Read a list answer: either plain strings or objects with a name and slug
fn entries(body: &Value, endpoint: &str, name_key: &str, slug_key: &str) -> Result<Vec<GeoOption>> {
    let Some(items) = body.as_array() else {
        return Err(Error::Other(format!(
            "SOAX geo API {endpoint}: expected a JSON array"
        )));
    };

    Ok(items
        .iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(GeoOption {
                code: name.clone(),
                name: name.clone(),
            }),
            Value::Object(fields) => {
                let name = fields.get(name_key).and_then(Value::as_str)?;
                let code = fields
                    .get(slug_key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .unwrap_or(name);
                Some(GeoOption {
                    code: code.to_string(),
                    name: name.to_string(),
                })
            }
            _ => None,
        })
        .collect())
}

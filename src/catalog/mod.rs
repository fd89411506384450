//! Geo catalog
//!
//! The regions, cities and ISPs an operator can pick for a country. The
//! catalog is refreshed from the SOAX geo API and kept as a JSON file under
//! the data directory, so lookups never wait on the network.

mod client;
mod store;

pub use client::SoaxApiClient;
pub use store::CatalogStore;

use crate::config::Config;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use utoipa::ToSchema;

/// Connection type used when listing regions and cities
const CONN_TYPE: &str = "wifi";

/// A selectable location: SOAX slug plus display name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GeoOption {
    /// Slug passed to the gateway
    pub code: String,
    /// Display name
    pub name: String,
}

/// A country known to the catalog
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CountryOption {
    /// ISO 3166-1 alpha-2 code
    pub code: String,
    /// Display name (falls back to the code)
    #[serde(default)]
    pub name: String,
}

/// Catalog entry for one country
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCountry {
    /// ISO 3166-1 alpha-2 code
    pub code: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Regions
    #[serde(default)]
    pub regions: Vec<GeoOption>,
    /// Cities
    #[serde(default)]
    pub cities: Vec<GeoOption>,
    /// ISP names
    #[serde(default)]
    pub isps: Vec<String>,
}

/// Whole catalog as stored on disk
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogData {
    /// Bumped on every refresh
    #[serde(default)]
    pub version: u64,
    /// Countries sorted by code
    #[serde(default)]
    pub countries: Vec<CatalogCountry>,
}

impl CatalogData {
    /// Case-insensitive country lookup
    pub fn country(&self, code: &str) -> Option<&CatalogCountry> {
        let code = code.trim();
        self.countries
            .iter()
            .find(|c| c.code.eq_ignore_ascii_case(code))
    }
}

/// Catalog lookups plus refresh from the SOAX geo API
pub struct GeoCatalog {
    store: CatalogStore,
    client: SoaxApiClient,
    refreshing: AtomicBool,
}

impl GeoCatalog {
    /// Build from a store and client
    pub fn new(store: CatalogStore, client: SoaxApiClient) -> Self {
        Self {
            store,
            client,
            refreshing: AtomicBool::new(false),
        }
    }

    /// Catalog under `paths.data_dir`, refreshed with the `soax` API keys
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            CatalogStore::new(&config.paths.data_dir),
            SoaxApiClient::new(&config.soax, &config.http_client),
        )
    }

    /// Countries present in the catalog
    pub async fn countries(&self) -> Vec<CountryOption> {
        self.store.countries().await
    }

    /// Regions of a country
    pub async fn regions(&self, country: &str) -> Vec<GeoOption> {
        self.store.regions(country).await
    }

    /// Cities of a country
    pub async fn cities(&self, country: &str) -> Vec<GeoOption> {
        self.store.cities(country).await
    }

    /// ISP names of a country
    pub async fn isps(&self, country: &str) -> Vec<String> {
        self.store.isps(country).await
    }

    /// Whether a refresh is in flight
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Re-fetch the requested countries, or every known country when the
    /// list is empty, and save the merged catalog.
    ///
    /// A country whose lookups fail keeps its previous entry. The refresh
    /// fails only when every country fails.
    pub async fn refresh(&self, requested: Vec<CountryOption>) -> Result<Arc<CatalogData>> {
        let current = self.store.load().await;
        let targets = self.targets(&current, requested)?;

        let mut countries = current.countries.clone();
        let mut last_error = None;
        let mut refreshed = 0usize;

        for target in &targets {
            match self.fetch_country(target).await {
                Ok(entry) => {
                    tracing::debug!(
                        country = %entry.code,
                        regions = entry.regions.len(),
                        cities = entry.cities.len(),
                        isps = entry.isps.len(),
                        "Fetched geo catalog entry"
                    );
                    countries.retain(|c| !c.code.eq_ignore_ascii_case(&entry.code));
                    countries.push(entry);
                    refreshed += 1;
                }
                Err(e) => {
                    tracing::warn!(country = %target.code, error = %e, "Geo catalog refresh failed for country");
                    last_error = Some(e);
                }
            }
        }

        if refreshed == 0
            && let Some(e) = last_error
        {
            return Err(e);
        }

        countries.sort_by(|a, b| a.code.cmp(&b.code));
        self.store
            .save(CatalogData {
                version: current.version + 1,
                countries,
            })
            .await
    }

    /// Check preconditions, then refresh in the background.
    ///
    /// Returns `false` when a refresh is already running.
    pub async fn start_refresh(self: &Arc<Self>, requested: Vec<CountryOption>) -> Result<bool> {
        let current = self.store.load().await;
        self.targets(&current, requested.clone())?;

        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(false);
        }

        let catalog = Arc::clone(self);
        tokio::spawn(async move {
            match catalog.refresh(requested).await {
                Ok(data) => {
                    tracing::info!(version = data.version, "Geo catalog refresh finished")
                }
                Err(e) => tracing::error!(error = %e, "Geo catalog refresh failed"),
            }
            catalog.refreshing.store(false, Ordering::Release);
        });

        Ok(true)
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.client.is_configured() {
            Ok(())
        } else {
            Err(Error::config(
                "soax.api_key",
                "SOAX API key and package key are required to refresh the geo catalog",
            ))
        }
    }

    fn targets(
        &self,
        current: &CatalogData,
        requested: Vec<CountryOption>,
    ) -> Result<Vec<CountryOption>> {
        self.ensure_configured()?;

        let targets: Vec<CountryOption> = if requested.is_empty() {
            current
                .countries
                .iter()
                .map(|c| CountryOption {
                    code: c.code.clone(),
                    name: c.name.clone(),
                })
                .collect()
        } else {
            requested
        };

        if targets.is_empty() {
            return Err(Error::Validation(
                "no countries to refresh: the catalog is empty and none were requested".into(),
            ));
        }
        if targets.iter().any(|c| c.code.trim().is_empty()) {
            return Err(Error::Validation("country code must not be empty".into()));
        }
        Ok(targets)
    }

    async fn fetch_country(&self, target: &CountryOption) -> Result<CatalogCountry> {
        let code = target.code.trim().to_ascii_lowercase();
        let (regions, cities, isps) = tokio::try_join!(
            self.client.regions(&code, CONN_TYPE),
            self.client.cities(&code, None, CONN_TYPE),
            self.client.isps(&code, None, None),
        )?;

        let name = target.name.trim();
        Ok(CatalogCountry {
            name: if name.is_empty() {
                target.code.trim().to_ascii_uppercase()
            } else {
                name.to_string()
            },
            code,
            regions,
            cities,
            isps,
        })
    }
}

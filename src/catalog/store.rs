//! On-disk geo catalog cache

use super::{CatalogCountry, CatalogData, CountryOption, GeoOption};
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// JSON file at `<data_dir>/catalog/soax_geo.json` with an in-memory copy
#[derive(Debug)]
pub struct CatalogStore {
    path: PathBuf,
    cache: RwLock<Option<Arc<CatalogData>>>,
}

impl CatalogStore {
    /// Store rooted at the data directory
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("catalog").join("soax_geo.json"),
            cache: RwLock::new(None),
        }
    }

    /// Location of the catalog file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current catalog; empty when the file is missing or unreadable
    pub async fn load(&self) -> Arc<CatalogData> {
        if let Some(data) = self.cache.read().await.as_ref() {
            return Arc::clone(data);
        }

        let data = match tokio::fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice::<CatalogData>(&bytes) {
                Ok(data) => Arc::new(data),
                Err(e) => {
                    // Not cached so a fixed file is picked up on the next read
                    tracing::warn!(path = %self.path.display(), error = %e, "Ignoring malformed geo catalog");
                    return Arc::new(CatalogData::default());
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Arc::new(CatalogData::default()),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Could not read geo catalog");
                return Arc::new(CatalogData::default());
            }
        };

        *self.cache.write().await = Some(Arc::clone(&data));
        data
    }

    /// Replace the catalog on disk and in memory
    pub async fn save(&self, data: CatalogData) -> Result<Arc<CatalogData>> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let text = serde_json::to_vec_pretty(&data)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        let data = Arc::new(data);
        *self.cache.write().await = Some(Arc::clone(&data));
        tracing::info!(
            path = %self.path.display(),
            countries = data.countries.len(),
            version = data.version,
            "Saved geo catalog"
        );
        Ok(data)
    }

    /// Countries present in the catalog
    pub async fn countries(&self) -> Vec<CountryOption> {
        self.load()
            .await
            .countries
            .iter()
            .map(|c| CountryOption {
                code: c.code.clone(),
                name: c.name.clone(),
            })
            .collect()
    }

    /// Regions of a country; empty for an unknown country
    pub async fn regions(&self, country: &str) -> Vec<GeoOption> {
        self.with_country(country, |c| c.regions.clone()).await
    }

    /// Cities of a country; empty for an unknown country
    pub async fn cities(&self, country: &str) -> Vec<GeoOption> {
        self.with_country(country, |c| c.cities.clone()).await
    }

    /// ISPs of a country; empty for an unknown country
    pub async fn isps(&self, country: &str) -> Vec<String> {
        self.with_country(country, |c| c.isps.clone()).await
    }

    async fn with_country<T: Default>(
        &self,
        country: &str,
        pick: impl FnOnce(&CatalogCountry) -> T,
    ) -> T {
        let data = self.load().await;
        data.country(country).map(pick).unwrap_or_default()
    }
}

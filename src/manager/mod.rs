//! Connector registry and cross-source search
//!
//! The manager owns one [`Connector`] per enabled source. Searches fan out to
//! every selected source concurrently on a tokio `JoinSet`; a source that
//! fails or panics contributes an empty list and never affects the others.

mod cache;
mod merge;

pub use cache::{CacheKey, SearchCache, SourceResults};
pub use merge::{is_adult_entry, merge_results, normalize_title, ScoredEntry};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::config::{Config, SearchConfig};
use crate::model::{CatalogEntry, SeriesKey, SourceId};
use crate::source::Connector;
use crate::{ConduitError, Result};

/// Per-call search settings
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Sources to query; `None` means every enabled source
    pub sources: Option<Vec<SourceId>>,
    /// Overrides `search.limit-per-source`
    pub limit_per_source: Option<usize>,
    /// Hide adult-only sources and adult-tagged entries
    pub filter_adult: bool,
}

/// Registry of enabled connectors
#[derive(Debug)]
pub struct ConnectorManager {
    connectors: BTreeMap<SourceId, Arc<Connector>>,
    search: SearchConfig,
    cache: SearchCache,
}

impl ConnectorManager {
    /// Builds a connector for every enabled source
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut connectors = Vec::new();
        for id in config.sources.enabled() {
            connectors.push(Connector::from_config(id, config)?);
        }
        tracing::info!(
            "Initialized {} connector(s): {}",
            connectors.len(),
            connectors
                .iter()
                .map(|c| c.id().as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Self::with_connectors(connectors, config.search.clone()))
    }

    pub fn with_connectors(connectors: Vec<Connector>, search: SearchConfig) -> Self {
        let cache = SearchCache::new(Duration::from_secs(search.cache_ttl_secs));
        Self {
            connectors: connectors
                .into_iter()
                .map(|c| (c.id(), Arc::new(c)))
                .collect(),
            search,
            cache,
        }
    }

    /// Enabled sources in `SourceId` order
    pub fn sources(&self) -> Vec<SourceId> {
        self.connectors.keys().copied().collect()
    }

    pub fn get(&self, id: SourceId) -> Result<Arc<Connector>> {
        self.connectors
            .get(&id)
            .cloned()
            .ok_or_else(|| ConduitError::SourceDisabled(id.to_string()))
    }

    /// Looks a connector up by its name as typed on the command line
    pub fn get_by_name(&self, name: &str) -> Result<Arc<Connector>> {
        let id: SourceId = name
            .parse()
            .map_err(|_| ConduitError::UnknownSource(name.to_string()))?;
        self.get(id)
    }

    /// The connector owning a series key
    pub fn for_series(&self, key: &SeriesKey) -> Result<Arc<Connector>> {
        self.get(key.source())
    }

    pub fn cache(&self) -> &SearchCache {
        &self.cache
    }

    /// Searches the selected sources concurrently
    ///
    /// Results come back in the order the sources were requested. Requested
    /// sources that are disabled are skipped with a warning.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> SourceResults {
        let selected = self.select_sources(options);
        if query.trim().is_empty() || selected.is_empty() {
            return selected.into_iter().map(|id| (id, Vec::new())).collect();
        }

        let key = CacheKey::new(query, &selected, options.filter_adult);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!("Search cache hit for '{}'", query);
            return cached;
        }

        let limit = options.limit_per_source.unwrap_or(self.search.limit_per_source);
        let mut results: SourceResults = selected.iter().map(|id| (*id, Vec::new())).collect();

        let mut join_set = JoinSet::new();
        for (index, id) in selected.iter().enumerate() {
            let Ok(connector) = self.get(*id) else {
                continue;
            };
            let query = query.to_string();
            join_set.spawn(async move {
                let entries = connector.search(&query, Some(limit)).await;
                (index, entries)
            });
        }

        while let Some(res) = join_set.join_next().await {
            match res {
                Ok((index, entries)) => {
                    if let Some(slot) = results.get_mut(index) {
                        slot.1 = entries;
                    }
                }
                Err(e) => {
                    tracing::error!("Search task failed: {}", e);
                }
            }
        }

        if options.filter_adult {
            for (_, entries) in results.iter_mut() {
                entries.retain(|entry| !is_adult_entry(entry));
            }
        }

        let total: usize = results.iter().map(|(_, entries)| entries.len()).sum();
        tracing::info!(
            "Search '{}' returned {} result(s) from {} source(s)",
            query,
            total,
            results.len()
        );

        self.cache.insert(key, results.clone());
        results
    }

    /// Searches and folds results into one relevance-ordered list
    pub async fn search_merged(&self, query: &str, options: &SearchOptions) -> Vec<ScoredEntry> {
        let results = self.search(query, options).await;
        merge_results(results, query, self.search.merged_limit)
    }

    /// Lists the catalog of one source, honouring the adult filter
    pub async fn list_catalog(
        &self,
        id: SourceId,
        limit: Option<usize>,
        filter_adult: bool,
    ) -> Result<Vec<CatalogEntry>> {
        if filter_adult && id.is_adult_only() {
            return Ok(Vec::new());
        }
        let connector = self.get(id)?;
        let mut entries = connector.list_catalog(limit).await;
        if filter_adult {
            entries.retain(|entry| !is_adult_entry(entry));
        }
        Ok(entries)
    }

    fn select_sources(&self, options: &SearchOptions) -> Vec<SourceId> {
        let requested = options.sources.clone().unwrap_or_else(|| self.sources());
        let mut selected = Vec::new();
        for id in requested {
            if selected.contains(&id) {
                continue;
            }
            if !self.connectors.contains_key(&id) {
                tracing::warn!("Skipping disabled source {}", id);
                continue;
            }
            if options.filter_adult && id.is_adult_only() {
                tracing::debug!("Skipping adult-only source {}", id);
                continue;
            }
            selected.push(id);
        }
        selected
    }
}

//! Time-bounded cache of fan-out search results

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::model::{CatalogEntry, SourceId};

pub type SourceResults = Vec<(SourceId, Vec<CatalogEntry>)>;

/// Identifies one fan-out search
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    query: String,
    sources: Vec<SourceId>,
    filter_adult: bool,
}

impl CacheKey {
    /// The query is case- and whitespace-insensitive; source order is ignored
    pub fn new(query: &str, sources: &[SourceId], filter_adult: bool) -> Self {
        let mut sources = sources.to_vec();
        sources.sort();
        sources.dedup();
        Self {
            query: query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase(),
            sources,
            filter_adult,
        }
    }
}

/// Search cache; a zero TTL disables it
#[derive(Debug)]
pub struct SearchCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, (Instant, SourceResults)>>,
}

impl SearchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn get(&self, key: &CacheKey) -> Option<SourceResults> {
        if !self.is_enabled() {
            return None;
        }
        let entries = self.entries.lock().ok()?;
        entries
            .get(key)
            .filter(|(stored, _)| stored.elapsed() < self.ttl)
            .map(|(_, results)| results.clone())
    }

    /// Stores results and drops anything expired
    pub fn insert(&self, key: CacheKey, results: SourceResults) {
        if !self.is_enabled() {
            return;
        }
        if let Ok(mut entries) = self.entries.lock() {
            let ttl = self.ttl;
            entries.retain(|_, (stored, _)| stored.elapsed() < ttl);
            entries.insert(key, (Instant::now(), results));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

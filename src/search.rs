use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::proxy::ArmProxy;

/// One resource as returned by the search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub resource_type: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResourceRecord {
    pub fn new(id: &str, name: &str, resource_type: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            resource_type: resource_type.to_string(),
            extra: Map::new(),
        }
    }

    fn matches(&self, keyword: &str) -> bool {
        if self.name.is_empty() || self.resource_type.is_empty() {
            return false;
        }
        self.name.to_lowercase().contains(keyword) || self.resource_type.to_lowercase().contains(keyword)
    }
}

#[derive(Default)]
struct CacheState {
    data: BTreeMap<String, ResourceRecord>,
    refreshed_at: Option<Instant>,
    keyword: String,
}

/// Clears the in-flight flag on every exit path.
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// All resources of the signed-in account, keyed by id, for incremental
/// search suggestions. A refresh requested while another is in flight is
/// skipped, not queued.
pub struct ResourceSearchCache {
    proxy: Arc<dyn ArmProxy>,
    ttl: Duration,
    state: Mutex<CacheState>,
    refreshing: AtomicBool,
}

impl ResourceSearchCache {
    pub fn unprimed(proxy: Arc<dyn ArmProxy>, ttl: Duration) -> Self {
        Self {
            proxy,
            ttl,
            state: Mutex::new(CacheState::default()),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Builds the cache and primes it with a full fetch.
    pub fn new(proxy: Arc<dyn ArmProxy>, ttl: Duration) -> Self {
        let cache = Self::unprimed(proxy, ttl);
        cache.refresh();
        cache
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refetches every resource. Returns whether the dataset was replaced;
    /// failures are logged and leave the previous data in place.
    pub fn refresh(&self) -> bool {
        match self.try_refresh() {
            Ok(replaced) => replaced,
            Err(err) => {
                warn!("resource cache refresh failed: {err:#}");
                false
            }
        }
    }

    /// `Ok(false)` when another refresh is already in flight.
    pub fn try_refresh(&self) -> Result<bool> {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("resource cache refresh already in flight");
            return Ok(false);
        }
        let _guard = RefreshGuard(&self.refreshing);

        let items = self
            .proxy
            .search_by_keyword("")
            .context("fetch all resources")?;
        let mut state = self.state();
        state.data = items.into_iter().map(|r| (r.id.clone(), r)).collect();
        state.refreshed_at = Some(Instant::now());
        info!(resources = state.data.len(), "resource cache refreshed");
        Ok(true)
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    pub fn is_expired(&self) -> bool {
        self.state()
            .refreshed_at
            .is_none_or(|at| at.elapsed() > self.ttl)
    }

    /// Cached records whose name or type contains `keyword`
    /// (case-insensitive), ordered by type then name. Nothing is served
    /// from an expired dataset.
    pub fn suggestions(&self, keyword: &str) -> Vec<ResourceRecord> {
        if self.is_expired() {
            return Vec::new();
        }
        let keyword = keyword.to_lowercase();
        let mut results: Vec<ResourceRecord> = self
            .state()
            .data
            .values()
            .filter(|r| r.matches(&keyword))
            .cloned()
            .collect();
        results.sort_by(|a, b| {
            a.resource_type
                .to_lowercase()
                .cmp(&b.resource_type.to_lowercase())
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        results
    }

    /// Cached suggestions first, then records only the server found.
    /// Server results are merged into the cache either way.
    pub fn search(&self, keyword: &str) -> Result<Vec<ResourceRecord>> {
        self.refresh();
        self.state().keyword = keyword.to_string();
        let mut results = self.suggestions(keyword);
        if keyword.is_empty() {
            return Ok(results);
        }

        let found = self
            .proxy
            .search_by_keyword(keyword)
            .with_context(|| format!("search for {keyword:?}"))?;
        let mut state = self.state();
        let current = state.keyword == keyword;
        for item in found {
            if current && !state.data.contains_key(&item.id) {
                results.push(item.clone());
            }
            state.data.insert(item.id.clone(), item);
        }
        Ok(results)
    }

    pub fn keyword(&self) -> String {
        self.state().keyword.clone()
    }

    pub fn len(&self) -> usize {
        self.state().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::fake::FakeProxy;

    fn records() -> Vec<ResourceRecord> {
        vec![
            ResourceRecord::new("/s/1/rg/a/sites/web-b", "web-b", "Microsoft.Web/sites"),
            ResourceRecord::new("/s/1/rg/a/sites/Web-a", "Web-a", "Microsoft.Web/sites"),
            ResourceRecord::new("/s/1/rg/a/servers/db", "db", "Microsoft.Sql/servers"),
            ResourceRecord::new("/s/1/rg/a/unnamed", "", "Microsoft.Web/sites"),
        ]
    }

    fn cache(proxy: FakeProxy) -> (Arc<FakeProxy>, ResourceSearchCache) {
        let proxy = Arc::new(proxy);
        let cache = ResourceSearchCache::new(proxy.clone(), Duration::from_secs(60));
        (proxy, cache)
    }

    #[test]
    fn suggestions_are_filtered_and_sorted() {
        let (_, cache) = cache(FakeProxy::default().with_search("", records()));
        assert_eq!(cache.len(), 4);
        let names: Vec<String> = cache.suggestions("WEB").into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Web-a", "web-b"]);
        let names: Vec<String> = cache.suggestions("microsoft").into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["db", "Web-a", "web-b"]);
    }

    #[test]
    fn expired_data_is_not_served() {
        let proxy = Arc::new(FakeProxy::default().with_search("", records()));
        let cache = ResourceSearchCache::new(proxy, Duration::ZERO);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.is_expired());
        assert!(cache.suggestions("web").is_empty());
    }

    #[test]
    fn failed_refresh_keeps_previous_data() {
        let (proxy, cache) = cache(FakeProxy::default().with_search("", records()));
        proxy.fail_search(true);
        assert!(!cache.refresh());
        assert!(cache.try_refresh().is_err());
        assert_eq!(cache.len(), 4);
        assert!(!cache.is_refreshing());
    }

    #[test]
    fn search_appends_server_only_hits_and_merges_them() {
        let extra = ResourceRecord::new("/s/1/rg/b/sites/web-z", "web-z", "Microsoft.Web/sites");
        let (proxy, cache) = cache(
            FakeProxy::default()
                .with_search("", records())
                .with_search("web", vec![records()[0].clone(), extra.clone()]),
        );
        let results = cache.search("web").unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["/s/1/rg/a/sites/Web-a", "/s/1/rg/a/sites/web-b", "/s/1/rg/b/sites/web-z"]);
        assert_eq!(cache.keyword(), "web");
        assert_eq!(cache.len(), 5);
        // priming, refresh on search, keyword query
        assert_eq!(proxy.search_calls(), vec!["", "", "web"]);
    }

    #[test]
    fn empty_keyword_skips_server_query() {
        let (proxy, cache) = cache(FakeProxy::default().with_search("", records()));
        assert_eq!(cache.search("").unwrap().len(), 3);
        assert_eq!(proxy.search_calls(), vec!["", ""]);
    }
}

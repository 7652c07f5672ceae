//! Result caching for read operations of a device API.
//!
//! [`AutoCache`] wraps each operation call. Operations listed in the
//! [`OperationTable`] have their results stored per argument key and reused
//! until their TTL expires; every successful call of an operation then
//! discards the caches that operation invalidates. A full collection stored
//! under [`CacheKey::All`] also answers single-item lookups when the value
//! supports [`Cacheable::select`].

mod descriptor;

pub use descriptor::{OperationDescriptor, OperationTable};

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indexmap::IndexMap;
use log::{debug, trace};
use tokio::time::Instant;

/// Argument key of a cached result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// The call had no argument: the result is the full collection.
    All,
    /// The call was for a single item.
    Item(String),
}

impl CacheKey {
    pub fn item(id: impl ToString) -> Self {
        CacheKey::Item(id.to_string())
    }

    /// `All` for `None`, `Item` otherwise.
    pub fn from_option<T: ToString>(id: Option<T>) -> Self {
        id.map_or(CacheKey::All, |id| CacheKey::item(id))
    }
}

/// A value that can be stored in the cache.
pub trait Cacheable: Clone + Send + Sync + 'static {
    /// Extract the entry for `id` from a full collection, as a collection
    /// holding just that entry. `None` when `id` is absent or the value is
    /// not a keyed collection.
    fn select(&self, _id: &str) -> Option<Self> {
        None
    }
}

impl<V: Clone + Send + Sync + 'static> Cacheable for IndexMap<String, V> {
    fn select(&self, id: &str) -> Option<Self> {
        self.get(id)
            .map(|value| IndexMap::from([(id.to_string(), value.clone())]))
    }
}

impl<V: Clone + Send + Sync + 'static> Cacheable for BTreeMap<String, V> {
    fn select(&self, id: &str) -> Option<Self> {
        self.get(id)
            .map(|value| BTreeMap::from([(id.to_string(), value.clone())]))
    }
}

impl<V: Clone + Send + Sync + 'static> Cacheable for HashMap<String, V> {
    fn select(&self, id: &str) -> Option<Self> {
        self.get(id)
            .map(|value| HashMap::from([(id.to_string(), value.clone())]))
    }
}

impl Cacheable for serde_json::Value {
    fn select(&self, id: &str) -> Option<Self> {
        let value = self.as_object()?.get(id)?;
        let mut single = serde_json::Map::new();
        single.insert(id.to_string(), value.clone());
        Some(serde_json::Value::Object(single))
    }
}

impl Cacheable for String {}
impl Cacheable for bool {}
impl Cacheable for () {}
impl<T: Clone + Send + Sync + 'static> Cacheable for Vec<T> {}

struct Entry {
    captured: Instant,
    value: Arc<dyn Any + Send + Sync>,
}

impl Entry {
    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.captured) <= ttl
    }
}

type Entries = HashMap<String, HashMap<CacheKey, Entry>>;

/// Per-device result cache driven by an [`OperationTable`].
pub struct AutoCache {
    table: OperationTable,
    use_cache: bool,
    entries: Mutex<Entries>,
}

impl AutoCache {
    /// Create a cache that is used unless a call opts out.
    pub fn new(table: OperationTable) -> Self {
        Self {
            table,
            use_cache: true,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Set whether calls use the cache when they do not say.
    pub fn with_default(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn table(&self) -> &OperationTable {
        &self.table
    }

    pub fn uses_cache_by_default(&self) -> bool {
        self.use_cache
    }

    /// Run `call` for `operation` through the cache.
    ///
    /// For a cacheable operation with caching in effect (`use_cache`, or the
    /// cache default when `None`), a fresh stored result is returned without
    /// calling. Otherwise `call` runs and its result is stored. Whether or
    /// not the result came from the cache, a successful call discards every
    /// cache the operation invalidates. Failures leave the cache untouched.
    pub async fn invoke<V, E, F, Fut>(
        &self,
        operation: &str,
        key: CacheKey,
        use_cache: Option<bool>,
        call: F,
    ) -> Result<V, E>
    where
        V: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let value = match self.table.get(operation) {
            Some(descriptor) if use_cache.unwrap_or(self.use_cache) => {
                let now = Instant::now();
                match self.lookup::<V>(operation, &key, descriptor.ttl, now) {
                    Some(hit) => {
                        debug!("cache hit for {} {:?}", operation, key);
                        hit
                    }
                    None => {
                        debug!("cache miss for {} {:?}", operation, key);
                        let value = call().await?;
                        self.store(operation, key, &value, descriptor.ttl, now);
                        value
                    }
                }
            }
            _ => call().await?,
        };

        self.invalidate_for(operation);
        Ok(value)
    }

    fn lookup<V: Cacheable>(
        &self,
        operation: &str,
        key: &CacheKey,
        ttl: Duration,
        now: Instant,
    ) -> Option<V> {
        let entries = self.entries();
        let slots = entries.get(operation)?;

        if let Some(entry) = slots.get(key).filter(|e| e.is_fresh(ttl, now))
            && let Some(value) = entry.value.downcast_ref::<V>()
        {
            return Some(value.clone());
        }

        // A fresh full collection also answers single-item lookups
        if let CacheKey::Item(id) = key
            && let Some(entry) = slots.get(&CacheKey::All).filter(|e| e.is_fresh(ttl, now))
        {
            return entry.value.downcast_ref::<V>()?.select(id);
        }

        None
    }

    fn store<V: Cacheable>(
        &self,
        operation: &str,
        key: CacheKey,
        value: &V,
        ttl: Duration,
        now: Instant,
    ) {
        let mut entries = self.entries();
        let slots = entries.entry(operation.to_string()).or_default();

        match &key {
            // A new full collection supersedes every single-item result
            CacheKey::All => slots.clear(),
            CacheKey::Item(_) => {
                if slots
                    .get(&CacheKey::All)
                    .is_some_and(|e| !e.is_fresh(ttl, now))
                {
                    slots.remove(&CacheKey::All);
                }
            }
        }

        trace!("storing {} {:?}", operation, key);
        slots.insert(
            key,
            Entry {
                captured: now,
                value: Arc::new(value.clone()),
            },
        );
    }

    fn invalidate_for(&self, operation: &str) {
        let targets = self.table.invalidated_by(operation);
        if targets.is_empty() {
            return;
        }

        let mut entries = self.entries();
        for target in targets {
            if entries.remove(target).is_some() {
                debug!("{} cleared cached {}", operation, target);
            }
        }
    }

    /// Whether any result, fresh or stale, is stored for `operation`/`key`.
    pub fn contains(&self, operation: &str, key: &CacheKey) -> bool {
        self.entries()
            .get(operation)
            .is_some_and(|slots| slots.contains_key(key))
    }

    /// Discard the stored results of one operation.
    pub fn invalidate(&self, operation: &str) {
        self.entries().remove(operation);
    }

    /// Discard every stored result.
    pub fn clear_cache(&self) {
        self.entries().clear();
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for AutoCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoCache")
            .field("table", &self.table)
            .field("use_cache", &self.use_cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    type Records = IndexMap<String, serde_json::Value>;

    fn table() -> OperationTable {
        OperationTable::new()
            .cacheable(
                "show_interfaces",
                Duration::from_secs(60),
                &["enable_interface", "disable_interface"],
            )
            .cacheable("show_hostname", Duration::from_secs(300), &[])
    }

    fn interfaces() -> Records {
        IndexMap::from([
            ("eth0".to_string(), json!({"enabled": true})),
            ("eth1".to_string(), json!({"enabled": false})),
        ])
    }

    async fn show_interfaces(
        cache: &AutoCache,
        calls: &AtomicUsize,
        id: Option<&str>,
        use_cache: Option<bool>,
    ) -> Records {
        cache
            .invoke("show_interfaces", CacheKey::from_option(id), use_cache, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let all = interfaces();
                Ok::<_, crate::Error>(match id {
                    Some(id) => all.select(id).unwrap_or_default(),
                    None => all,
                })
            })
            .await
            .unwrap()
    }

    async fn enable_interface(cache: &AutoCache, fail: bool) -> Result<(), &'static str> {
        cache
            .invoke("enable_interface", CacheKey::item("eth0"), None, move || async move {
                if fail { Err("device said no") } else { Ok(()) }
            })
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl_and_expiry() {
        let cache = AutoCache::new(table());
        let calls = AtomicUsize::new(0);

        show_interfaces(&cache, &calls, None, None).await;
        tokio::time::advance(Duration::from_secs(30)).await;
        show_interfaces(&cache, &calls, None, None).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        show_interfaces(&cache, &calls, None, None).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_still_valid_at_exact_ttl() {
        let cache = AutoCache::new(table());
        let calls = AtomicUsize::new(0);

        show_interfaces(&cache, &calls, None, None).await;
        tokio::time::advance(Duration::from_secs(60)).await;
        show_interfaces(&cache, &calls, None, None).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(1)).await;
        show_interfaces(&cache, &calls, None, None).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_item_served_from_collection() {
        let cache = AutoCache::new(table());
        let calls = AtomicUsize::new(0);

        show_interfaces(&cache, &calls, None, None).await;
        let one = show_interfaces(&cache, &calls, Some("eth1"), None).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(one.len(), 1);
        assert_eq!(one["eth1"], json!({"enabled": false}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_item_in_collection_calls_through() {
        let cache = AutoCache::new(table());
        let calls = AtomicUsize::new(0);

        show_interfaces(&cache, &calls, None, None).await;
        show_interfaces(&cache, &calls, Some("eth9"), None).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collection_store_replaces_items() {
        let cache = AutoCache::new(table());
        let calls = AtomicUsize::new(0);

        show_interfaces(&cache, &calls, Some("eth0"), None).await;
        assert!(cache.contains("show_interfaces", &CacheKey::item("eth0")));

        show_interfaces(&cache, &calls, None, None).await;
        assert!(!cache.contains("show_interfaces", &CacheKey::item("eth0")));
        assert!(cache.contains("show_interfaces", &CacheKey::All));
    }

    #[tokio::test(start_paused = true)]
    async fn test_item_store_drops_expired_collection() {
        let cache = AutoCache::new(table());
        let calls = AtomicUsize::new(0);

        show_interfaces(&cache, &calls, None, None).await;
        tokio::time::advance(Duration::from_secs(61)).await;
        show_interfaces(&cache, &calls, Some("eth0"), None).await;

        assert!(!cache.contains("show_interfaces", &CacheKey::All));
        assert!(cache.contains("show_interfaces", &CacheKey::item("eth0")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_write_invalidates() {
        let cache = AutoCache::new(table());
        let calls = AtomicUsize::new(0);

        show_interfaces(&cache, &calls, None, None).await;
        enable_interface(&cache, false).await.unwrap();
        show_interfaces(&cache, &calls, None, None).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_keeps_cache() {
        let cache = AutoCache::new(table());
        let calls = AtomicUsize::new(0);

        show_interfaces(&cache, &calls, None, None).await;
        assert!(enable_interface(&cache, true).await.is_err());
        show_interfaces(&cache, &calls, None, None).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_opt_out_calls_through_and_refreshes_nothing() {
        let cache = AutoCache::new(table());
        let calls = AtomicUsize::new(0);

        show_interfaces(&cache, &calls, None, Some(false)).await;
        assert!(!cache.contains("show_interfaces", &CacheKey::All));
        show_interfaces(&cache, &calls, None, Some(false)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_off_per_call_on() {
        let cache = AutoCache::new(table()).with_default(false);
        let calls = AtomicUsize::new(0);

        show_interfaces(&cache, &calls, None, None).await;
        show_interfaces(&cache, &calls, None, None).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        show_interfaces(&cache, &calls, None, Some(true)).await;
        show_interfaces(&cache, &calls, None, Some(true)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cache() {
        let cache = AutoCache::new(table());
        let calls = AtomicUsize::new(0);

        show_interfaces(&cache, &calls, None, None).await;
        cache.clear_cache();
        show_interfaces(&cache, &calls, None, None).await;
        show_interfaces(&cache, &calls, None, None).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_collection_never_selects() {
        let cache = AutoCache::new(table());
        let calls = AtomicUsize::new(0);
        let hostname = |id: Option<&'static str>| {
            let calls = &calls;
            let cache = &cache;
            async move {
                cache
                    .invoke("show_hostname", CacheKey::from_option(id), None, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, crate::Error>("sw0".to_string())
                    })
                    .await
                    .unwrap()
            }
        };

        assert_eq!(hostname(None).await, "sw0");
        assert_eq!(hostname(Some("x")).await, "sw0");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

//! Query client: the entry point to the cache

use crate::cache::{FetchOrigin, QueryCache, QueryEntry, Registration, SharedFetch};
use crate::config::QueryDefaults;
use crate::key::QueryKey;
use crate::mutation::{MutationFn, MutationObserver, MutationOptions};
use crate::observer::QueryObserver;
use crate::options::{QueryFn, QueryOptions};
use crate::state::AnyData;
use crate::stats::{QueryCacheStats, StatsCollector};
use iaso_core::{ApiError, ApiResult};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub(crate) struct ClientInner {
    pub cache: QueryCache,
    pub defaults: QueryDefaults,
    pub stats: Arc<StatsCollector>,
}

impl ClientInner {
    fn schedule_removal(self: &Arc<Self>, key: QueryKey, delay: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let client = Arc::downgrade(self);
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(client) = client.upgrade() {
                if client.cache.collect_key(&key, Instant::now()) {
                    debug!("Removed inactive query {}", key);
                    client.stats.record_eviction();
                }
            }
        });
    }

    fn collect_garbage(&self) -> usize {
        let removed = self.cache.collect(Instant::now());
        for _ in 0..removed {
            self.stats.record_eviction();
        }
        removed
    }
}

/// Cloneable handle to a query cache.
///
/// Fetches run as tokio tasks, so every method that may start one must be
/// called from within a runtime.
#[derive(Clone)]
pub struct QueryClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("defaults", &self.inner.defaults)
            .field("entries", &self.inner.cache.len())
            .finish()
    }
}

impl QueryClient {
    pub fn new() -> Self {
        Self::with_defaults(QueryDefaults::default())
    }

    pub fn with_defaults(defaults: QueryDefaults) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                cache: QueryCache::default(),
                defaults,
                stats: Arc::new(StatsCollector::new()),
            }),
        }
    }

    pub fn defaults(&self) -> &QueryDefaults {
        &self.inner.defaults
    }

    /// Subscribe to `key`, fetching it when enabled and stale
    pub fn observe<T: Send + Sync + 'static>(
        &self,
        key: impl Into<QueryKey>,
        query_fn: QueryFn<T>,
        options: QueryOptions<T>,
    ) -> QueryObserver<T> {
        QueryObserver::new(self.clone(), key.into(), query_fn, options)
    }

    /// Create a mutation handle
    pub fn mutation<V, T>(
        &self,
        mutation_fn: MutationFn<V, T>,
        options: MutationOptions<V, T>,
    ) -> MutationObserver<V, T>
    where
        V: Clone + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        let retry = self.inner.defaults.mutation_retry(options.retry);
        MutationObserver::new(mutation_fn, options, retry)
    }

    /// Fetch `key` once, returning fresh cached data without a request.
    ///
    /// The fetch is not tied to any observer and is not cancelled when
    /// observers of the key go away. `select` is not applied.
    pub async fn fetch_query<T: Send + Sync + 'static>(
        &self,
        key: impl Into<QueryKey>,
        query_fn: QueryFn<T>,
        options: QueryOptions<T>,
    ) -> ApiResult<Arc<T>> {
        let key = key.into();
        let cache_time = options.cache_time.unwrap_or(self.inner.defaults.cache_time);
        let stale_time = options.stale_time.unwrap_or(self.inner.defaults.stale_time);
        let entry = self.inner.cache.get_or_create(&key, cache_time);

        let state = entry.snapshot();
        if let Some(data) = state.data.as_ref().filter(|_| !state.is_stale(stale_time)) {
            debug!("Serving fresh data for {}", key);
            self.inner.stats.record_hit();
            return downcast(&key, data).ok_or_else(|| type_mismatch(&key));
        }

        let registration = self.registration(query_fn, &options);
        let outcome = entry
            .fetch(registration, &self.inner.stats, FetchOrigin::Detached)
            .await;
        if entry.observer_count() == 0 {
            self.inner.schedule_removal(key.clone(), cache_time);
        }
        let data = outcome?;
        downcast(&key, &data).ok_or_else(|| type_mismatch(&key))
    }

    pub fn get_query_data<T: Send + Sync + 'static>(
        &self,
        key: impl Into<QueryKey>,
    ) -> Option<Arc<T>> {
        let key = key.into();
        let entry = self.inner.cache.get(&key)?;
        let data = entry.snapshot().data?;
        downcast(&key, &data)
    }

    /// Replace the data of `key`, notifying its observers
    pub fn set_query_data<T: Send + Sync + 'static>(&self, key: impl Into<QueryKey>, data: T) {
        let key = key.into();
        let cache_time = self.inner.defaults.cache_time;
        let entry = self.inner.cache.get_or_create(&key, cache_time);
        entry.set_data(Arc::new(data));
        if entry.observer_count() == 0 {
            self.inner.schedule_removal(key, entry.cache_time());
        }
    }

    /// Mark every entry matched by `filter` stale and refetch the ones with an
    /// enabled observer.
    ///
    /// Data from a fetch that was already running when the invalidation
    /// arrived stays stale and is refetched once that fetch settles. Repeated
    /// invalidations join the pending refetch, so they produce a single
    /// request. Returns the number of entries marked.
    pub fn invalidate_queries(&self, filter: impl Into<QueryKey>) -> usize {
        let filter = filter.into();
        let entries = self.inner.cache.matching(&filter);
        for entry in &entries {
            self.inner.stats.record_invalidation();
            entry.invalidate(&self.inner.stats);
        }
        info!("Invalidated {} queries matching {}", entries.len(), filter);
        entries.len()
    }

    /// Cancel fetches in flight for matching entries
    pub fn cancel_queries(&self, filter: impl Into<QueryKey>) -> usize {
        let filter = filter.into();
        self.inner
            .cache
            .matching(&filter)
            .iter()
            .filter(|entry| entry.cancel())
            .count()
    }

    /// Drop matching entries. Live observers keep their last state.
    pub fn remove_queries(&self, filter: impl Into<QueryKey>) -> usize {
        let filter = filter.into();
        let removed = self.inner.cache.remove_matching(&filter);
        debug!("Removed {} queries matching {}", removed, filter);
        removed
    }

    pub fn clear(&self) {
        let removed = self.inner.cache.clear();
        debug!("Cleared {} queries", removed);
    }

    /// Number of entries with a fetch in flight
    pub fn is_fetching(&self) -> usize {
        self.inner
            .cache
            .all()
            .iter()
            .filter(|entry| entry.is_fetching())
            .count()
    }

    /// Remove entries that have been unobserved for their cache time
    pub fn collect_garbage(&self) -> usize {
        self.inner.collect_garbage()
    }

    /// Start a background garbage collection task.
    ///
    /// The task stops once every handle to the client has been dropped.
    pub fn start_gc_task(&self, interval: Duration) -> JoinHandle<()> {
        let client: Weak<ClientInner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                match client.upgrade() {
                    Some(client) => {
                        let removed = client.collect_garbage();
                        if removed > 0 {
                            debug!("Garbage collected {} queries", removed);
                        }
                    }
                    None => break,
                }
            }
        })
    }

    pub fn stats(&self) -> QueryCacheStats {
        self.inner.stats.get_stats(self.inner.cache.len())
    }

    pub(crate) fn registration<T: Send + Sync + 'static>(
        &self,
        query_fn: QueryFn<T>,
        options: &QueryOptions<T>,
    ) -> Arc<Registration> {
        Arc::new(Registration::new(
            query_fn,
            self.inner.defaults.query_retry(options.retry),
            options.on_success.clone(),
            options.on_error.clone(),
            options.report_error.clone(),
        ))
    }

    pub(crate) fn entry(&self, key: &QueryKey, cache_time: Duration) -> Arc<QueryEntry> {
        self.inner.cache.get_or_create(key, cache_time)
    }

    pub(crate) fn fetch_entry(
        &self,
        entry: &Arc<QueryEntry>,
        registration: Arc<Registration>,
    ) -> SharedFetch {
        entry.fetch(registration, &self.inner.stats, FetchOrigin::Observer)
    }

    pub(crate) fn record_hit(&self) {
        self.inner.stats.record_hit();
    }

    pub(crate) fn release(&self, entry: &QueryEntry, subscriber: u64) {
        if let Some(cache_time) = entry.detach(subscriber) {
            self.inner.schedule_removal(entry.key.clone(), cache_time);
        }
    }
}

pub(crate) fn downcast<T: Send + Sync + 'static>(key: &QueryKey, data: &AnyData) -> Option<Arc<T>> {
    match Arc::clone(data).downcast::<T>() {
        Ok(data) => Some(data),
        Err(_) => {
            warn!(
                "Cached data for {} is not a {}",
                key,
                std::any::type_name::<T>()
            );
            None
        }
    }
}

fn type_mismatch(key: &QueryKey) -> ApiError {
    ApiError::Decode(format!("cached data for {} has another type", key))
}

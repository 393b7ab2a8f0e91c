//! Cache entries and fetch coordination
//!
//! Every key owns one [`QueryEntry`]: the published state, the fetch in
//! flight (shared by everyone asking for the key while it runs) and one
//! subscription per observer. Each subscription carries the observer's query
//! function and callbacks. Refetches triggered by invalidation use the latest
//! enabled subscription, and the outcome of every execution is delivered to
//! all of them.

use crate::key::QueryKey;
use crate::options::{OnError, OnSuccess, QueryContext, QueryFn};
use crate::state::{AnyData, FetchStatus, QueryState, QueryStatus};
use crate::stats::StatsCollector;
use futures::future::{BoxFuture, FutureExt, Shared};
use iaso_core::{ApiError, ApiResult};
use iaso_resilience::{RetryError, RetryExecutor, RetryPolicy};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub(crate) type FetchOutcome = Result<AnyData, ApiError>;
pub(crate) type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

type ErasedFetch = Arc<dyn Fn(QueryContext) -> BoxFuture<'static, ApiResult<AnyData>> + Send + Sync>;
type ErasedOnSuccess = Arc<dyn Fn(&AnyData) + Send + Sync>;

static NEXT_FETCH_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Query function and callbacks of one observer, erased over the data type
pub(crate) struct Registration {
    fetch: ErasedFetch,
    retry: RetryPolicy,
    on_success: Option<ErasedOnSuccess>,
    on_error: Option<OnError>,
    report_error: Option<OnError>,
}

impl Registration {
    pub fn new<T: Send + Sync + 'static>(
        query_fn: QueryFn<T>,
        retry: RetryPolicy,
        on_success: Option<OnSuccess<T>>,
        on_error: Option<OnError>,
        report_error: Option<OnError>,
    ) -> Self {
        let fetch: ErasedFetch = Arc::new(move |ctx| {
            let pending = query_fn(ctx);
            async move { pending.await.map(|data| Arc::new(data) as AnyData) }.boxed()
        });
        let on_success = on_success.map(|callback| {
            Arc::new(move |data: &AnyData| {
                if let Some(data) = (**data).downcast_ref::<T>() {
                    callback(data);
                }
            }) as ErasedOnSuccess
        });

        Self {
            fetch,
            retry,
            on_success,
            on_error,
            report_error,
        }
    }
}

/// What started a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FetchOrigin {
    /// Mount, poll or explicit refetch of an observer
    Observer,
    /// `fetch_query`; not cancelled when observers leave
    Detached,
    /// Refetch of an invalidated entry
    Invalidation,
}

struct InFlight {
    id: u64,
    token: CancellationToken,
    fetch: SharedFetch,
    origin: FetchOrigin,
    previous_status: QueryStatus,
    /// The entry was invalidated after this fetch started
    invalidated: bool,
}

struct Subscriber {
    id: u64,
    registration: Arc<Registration>,
    enabled: bool,
}

struct EntryInner {
    in_flight: Option<InFlight>,
    subscribers: Vec<Subscriber>,
    cache_time: Duration,
    inactive_since: Option<Instant>,
}

impl EntryInner {
    /// Registration used for refetches nobody asked for explicitly
    fn refetch_registration(&self) -> Option<Arc<Registration>> {
        self.subscribers
            .iter()
            .rev()
            .find(|subscriber| subscriber.enabled)
            .map(|subscriber| Arc::clone(&subscriber.registration))
    }

    fn subscriber_mut(&mut self, id: u64) -> Option<&mut Subscriber> {
        self.subscribers.iter_mut().find(|subscriber| subscriber.id == id)
    }
}

pub(crate) struct QueryEntry {
    pub key: QueryKey,
    state: watch::Sender<QueryState>,
    inner: Mutex<EntryInner>,
}

impl QueryEntry {
    fn new(key: QueryKey, cache_time: Duration) -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            key,
            state,
            inner: Mutex::new(EntryInner {
                in_flight: None,
                subscribers: Vec::new(),
                cache_time,
                inactive_since: Some(Instant::now()),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> QueryState {
        self.state.borrow().clone()
    }

    pub fn observer_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    pub fn is_fetching(&self) -> bool {
        self.inner.lock().in_flight.is_some()
    }

    pub fn cache_time(&self) -> Duration {
        self.inner.lock().cache_time
    }

    /// Register an observer. Returns its subscription id.
    pub fn attach(&self, registration: Arc<Registration>, enabled: bool, cache_time: Duration) -> u64 {
        let id = NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        inner.subscribers.push(Subscriber {
            id,
            registration,
            enabled,
        });
        inner.cache_time = cache_time;
        inner.inactive_since = None;
        id
    }

    /// Replace the query function and callbacks of a subscription
    pub fn set_registration(&self, subscriber: u64, registration: Arc<Registration>) {
        if let Some(subscriber) = self.inner.lock().subscriber_mut(subscriber) {
            subscriber.registration = registration;
        }
    }

    pub fn set_enabled(&self, subscriber: u64, enabled: bool) {
        if let Some(subscriber) = self.inner.lock().subscriber_mut(subscriber) {
            subscriber.enabled = enabled;
        }
    }

    /// Remove a subscription. Returns the entry's cache time when it was the last one.
    pub fn detach(&self, subscriber: u64) -> Option<Duration> {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|s| s.id != subscriber);
        if !inner.subscribers.is_empty() {
            return None;
        }

        inner.inactive_since = Some(Instant::now());
        if let Some(in_flight) = inner
            .in_flight
            .as_ref()
            .filter(|f| f.origin != FetchOrigin::Detached)
        {
            debug!("Last observer of {} left, cancelling its fetch", self.key);
            in_flight.token.cancel();
        }
        Some(inner.cache_time)
    }

    /// Start a fetch, or join the one already running
    pub fn fetch(
        self: &Arc<Self>,
        registration: Arc<Registration>,
        stats: &Arc<StatsCollector>,
        origin: FetchOrigin,
    ) -> SharedFetch {
        let (id, token, sender, fetch) = {
            let mut inner = self.inner.lock();
            if let Some(in_flight) = &inner.in_flight {
                debug!("Joining in-flight fetch for {}", self.key);
                stats.record_dedup();
                return in_flight.fetch.clone();
            }

            let id = NEXT_FETCH_ID.fetch_add(1, Ordering::Relaxed);
            let token = CancellationToken::new();
            let (sender, receiver) = oneshot::channel::<FetchOutcome>();
            let fetch = receiver
                .map(|received| {
                    received.unwrap_or_else(|_| {
                        warn!("Fetch task ended without an outcome");
                        Err(ApiError::Cancelled)
                    })
                })
                .boxed()
                .shared();

            inner.in_flight = Some(InFlight {
                id,
                token: token.clone(),
                fetch: fetch.clone(),
                origin,
                previous_status: self.state.borrow().status,
                invalidated: false,
            });
            (id, token, sender, fetch)
        };

        stats.record_fetch();
        self.state.send_modify(|state| {
            state.fetch_status = FetchStatus::Fetching;
            if state.data.is_none() {
                state.status = QueryStatus::Loading;
            }
        });
        debug!("Fetching {}", self.key);

        let entry = Arc::clone(self);
        let stats = Arc::clone(stats);
        tokio::spawn(async move {
            let ctx = QueryContext {
                key: entry.key.clone(),
                token: token.clone(),
            };
            let executor = RetryExecutor::new(registration.retry.clone());
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => Err(ApiError::Cancelled),
                result = executor.execute(|| (registration.fetch)(ctx.clone())) => {
                    result.map_err(RetryError::into_inner)
                }
            };
            entry.complete(id, &outcome, &registration, &stats);
            // Nobody may be waiting
            let _ = sender.send(outcome);
        });

        fetch
    }

    fn complete(
        self: &Arc<Self>,
        id: u64,
        outcome: &FetchOutcome,
        starter: &Arc<Registration>,
        stats: &Arc<StatsCollector>,
    ) {
        let (listeners, follow_up) = {
            let mut inner = self.inner.lock();
            let in_flight = match inner.in_flight.take() {
                Some(in_flight) if in_flight.id == id => in_flight,
                other => {
                    inner.in_flight = other;
                    return;
                }
            };

            let mut listeners: Vec<Arc<Registration>> = inner
                .subscribers
                .iter()
                .map(|subscriber| Arc::clone(&subscriber.registration))
                .collect();
            if !listeners.iter().any(|listener| Arc::ptr_eq(listener, starter)) {
                listeners.insert(0, Arc::clone(starter));
            }
            let follow_up = match outcome {
                Ok(_) if in_flight.invalidated => inner.refetch_registration(),
                _ => None,
            };

            // Settled under the lock so a concurrent invalidation is not overwritten
            self.state.send_if_modified(|state| {
                state.fetch_status = if follow_up.is_some() {
                    FetchStatus::Fetching
                } else {
                    FetchStatus::Idle
                };
                match outcome {
                    Ok(data) => {
                        state.data = Some(Arc::clone(data));
                        state.error = None;
                        state.status = QueryStatus::Success;
                        state.data_updated_at = Some(Instant::now());
                        state.is_invalidated = in_flight.invalidated;
                    }
                    Err(ApiError::Cancelled) => {
                        state.status = in_flight.previous_status;
                    }
                    Err(error) => {
                        state.error = Some(error.clone());
                        state.status = QueryStatus::Error;
                    }
                }
                false
            });
            (listeners, follow_up)
        };

        // Callbacks see the settled state before observers are woken
        match outcome {
            Ok(data) => {
                debug!("Fetched {}", self.key);
                for on_success in listeners.iter().filter_map(|l| l.on_success.as_ref()) {
                    on_success(data);
                }
            }
            Err(ApiError::Cancelled) => {
                debug!("Fetch of {} cancelled", self.key);
                stats.record_cancellation();
            }
            Err(error) => {
                warn!("Fetch of {} failed: {}", self.key, error);
                let report = starter
                    .report_error
                    .as_ref()
                    .or_else(|| listeners.iter().find_map(|l| l.report_error.as_ref()));
                if let Some(report) = report {
                    report(error);
                }
                for on_error in listeners.iter().filter_map(|l| l.on_error.as_ref()) {
                    on_error(error);
                }
            }
        }

        match follow_up {
            Some(registration) => {
                debug!("{} was invalidated mid-fetch, refetching", self.key);
                drop(self.fetch(registration, stats, FetchOrigin::Invalidation));
            }
            None => self.state.send_modify(|_| {}),
        }
    }

    /// Mark stale and refetch when an enabled observer is attached.
    ///
    /// A fetch that started before the invalidation does not clear it; a
    /// refetch follows once it settles. Invalidations arriving while a
    /// refetch is pending or running join it.
    pub fn invalidate(self: &Arc<Self>, stats: &Arc<StatsCollector>) {
        let registration = {
            let mut inner = self.inner.lock();
            self.state.send_modify(|state| state.is_invalidated = true);

            if let Some(in_flight) = inner.in_flight.as_mut() {
                if in_flight.origin == FetchOrigin::Invalidation || in_flight.invalidated {
                    debug!("Invalidation of {} joins the pending refetch", self.key);
                    stats.record_dedup();
                } else {
                    debug!("{} invalidated while fetching", self.key);
                    in_flight.invalidated = true;
                }
                return;
            }
            match inner.refetch_registration() {
                Some(registration) => registration,
                None => return,
            }
        };

        debug!("Refetching invalidated query {}", self.key);
        drop(self.fetch(registration, stats, FetchOrigin::Invalidation));
    }

    pub fn cancel(&self) -> bool {
        match &self.inner.lock().in_flight {
            Some(in_flight) => {
                in_flight.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn set_data(&self, data: AnyData) {
        self.state.send_modify(|state| {
            state.data = Some(data);
            state.error = None;
            state.status = QueryStatus::Success;
            state.data_updated_at = Some(Instant::now());
            state.is_invalidated = false;
        });
    }

    fn is_collectable(&self, now: Instant) -> bool {
        let inner = self.inner.lock();
        inner.subscribers.is_empty()
            && inner.in_flight.is_none()
            && inner
                .inactive_since
                .is_some_and(|since| now.duration_since(since) >= inner.cache_time)
    }
}

/// All entries of a client, keyed by [`QueryKey`]
#[derive(Default)]
pub(crate) struct QueryCache {
    entries: RwLock<HashMap<QueryKey, Arc<QueryEntry>>>,
}

impl QueryCache {
    pub fn get(&self, key: &QueryKey) -> Option<Arc<QueryEntry>> {
        self.entries.read().get(key).cloned()
    }

    pub fn get_or_create(&self, key: &QueryKey, cache_time: Duration) -> Arc<QueryEntry> {
        if let Some(entry) = self.get(key) {
            return entry;
        }
        self.entries
            .write()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(QueryEntry::new(key.clone(), cache_time)))
            .clone()
    }

    pub fn matching(&self, filter: &QueryKey) -> Vec<Arc<QueryEntry>> {
        self.entries
            .read()
            .values()
            .filter(|entry| filter.matches(&entry.key))
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Arc<QueryEntry>> {
        self.entries.read().values().cloned().collect()
    }

    /// Remove matching entries, cancelling their fetches
    pub fn remove_matching(&self, filter: &QueryKey) -> usize {
        let removed: Vec<Arc<QueryEntry>> = {
            let mut entries = self.entries.write();
            let keys: Vec<QueryKey> = entries
                .keys()
                .filter(|key| filter.matches(key))
                .cloned()
                .collect();
            keys.iter().filter_map(|key| entries.remove(key)).collect()
        };
        for entry in &removed {
            entry.cancel();
        }
        removed.len()
    }

    /// Remove `key` if it has been unobserved for its cache time
    pub fn collect_key(&self, key: &QueryKey, now: Instant) -> bool {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if entry.is_collectable(now) => {
                entries.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn collect(&self, now: Instant) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_collectable(now));
        before - entries.len()
    }

    pub fn clear(&self) -> usize {
        let removed: Vec<Arc<QueryEntry>> = self.entries.write().drain().map(|(_, e)| e).collect();
        for entry in &removed {
            entry.cancel();
        }
        removed.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::query_fn;

    fn registration(value: u32) -> Arc<Registration> {
        Arc::new(Registration::new(
            query_fn(move |_| async move { Ok(value) }),
            RetryPolicy::none(),
            None,
            None,
            None,
        ))
    }

    fn slow_registration(value: u32) -> Arc<Registration> {
        Arc::new(Registration::new(
            query_fn(move |_| async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(value)
            }),
            RetryPolicy::none(),
            None,
            None,
            None,
        ))
    }

    #[tokio::test]
    async fn test_fetch_publishes_data() {
        let stats = Arc::new(StatsCollector::new());
        let cache = QueryCache::default();
        let entry = cache.get_or_create(&QueryKey::new("a"), Duration::from_secs(1));

        let outcome = entry.fetch(registration(7), &stats, FetchOrigin::Observer).await.unwrap();
        assert_eq!((*outcome).downcast_ref::<u32>(), Some(&7));

        let state = entry.snapshot();
        assert_eq!(state.status, QueryStatus::Success);
        assert!(!state.is_fetching());
        assert!(!entry.is_fetching());
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_execution() {
        let stats = Arc::new(StatsCollector::new());
        let cache = QueryCache::default();
        let entry = cache.get_or_create(&QueryKey::new("a"), Duration::from_secs(1));

        let first = entry.fetch(registration(1), &stats, FetchOrigin::Observer);
        let second = entry.fetch(registration(2), &stats, FetchOrigin::Observer);
        let (a, b) = futures::join!(first, second);

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        let snapshot = stats.get_stats(cache.len());
        assert_eq!(snapshot.fetches, 1);
        assert_eq!(snapshot.deduplicated, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fetches_from_many_threads_settle_once() {
        let stats = Arc::new(StatsCollector::new());
        let cache = Arc::new(QueryCache::default());
        let entry = cache.get_or_create(&QueryKey::new("a"), Duration::from_secs(1));

        let joins: Vec<_> = (0..16)
            .map(|_| {
                let (entry, stats) = (Arc::clone(&entry), Arc::clone(&stats));
                tokio::spawn(async move { entry.fetch(slow_registration(5), &stats, FetchOrigin::Observer).await })
            })
            .collect();
        for join in joins {
            let data = join.await.unwrap().unwrap();
            assert_eq!((*data).downcast_ref::<u32>(), Some(&5));
        }

        let snapshot = stats.get_stats(cache.len());
        assert_eq!(snapshot.fetches + snapshot.deduplicated, 16);
        assert!(!entry.is_fetching());
        assert!(!entry.snapshot().is_fetching());
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_respects_cache_time_and_observers() {
        let cache = QueryCache::default();
        let key = QueryKey::new("a");
        let entry = cache.get_or_create(&key, Duration::from_secs(10));
        let subscriber = entry.attach(registration(1), true, Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(cache.collect(Instant::now()), 0);

        assert_eq!(entry.detach(subscriber), Some(Duration::from_secs(10)));
        assert!(!cache.collect_key(&key, Instant::now()));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cache.collect_key(&key, Instant::now()));
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_during_fetch_keeps_entry_stale() {
        let stats = Arc::new(StatsCollector::new());
        let cache = QueryCache::default();
        let entry = cache.get_or_create(&QueryKey::new("a"), Duration::from_secs(60));

        let pending = entry.fetch(slow_registration(1), &stats, FetchOrigin::Detached);
        entry.invalidate(&stats);
        assert!(pending.await.is_ok());

        let state = entry.snapshot();
        assert!(state.data.is_some());
        assert!(state.is_invalidated);
        assert!(!entry.is_fetching());
        assert_eq!(stats.get_stats(cache.len()).fetches, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_during_fetch_refetches_for_observers() {
        let stats = Arc::new(StatsCollector::new());
        let cache = QueryCache::default();
        let entry = cache.get_or_create(&QueryKey::new("a"), Duration::from_secs(60));
        entry.attach(slow_registration(2), true, Duration::from_secs(60));

        let pending = entry.fetch(slow_registration(1), &stats, FetchOrigin::Observer);
        entry.invalidate(&stats);
        entry.invalidate(&stats);
        let stale = pending.await.unwrap();
        assert_eq!((*stale).downcast_ref::<u32>(), Some(&1));
        assert!(entry.is_fetching());

        tokio::time::sleep(Duration::from_millis(150)).await;
        let state = entry.snapshot();
        let data = state.data.unwrap();
        assert_eq!((*data).downcast_ref::<u32>(), Some(&2));
        assert!(!state.is_invalidated);
        assert_eq!(stats.get_stats(cache.len()).fetches, 2);
    }

    #[test]
    fn test_remove_matching_uses_prefix() {
        let cache = QueryCache::default();
        cache.get_or_create(&QueryKey::new("forms").with(1), Duration::ZERO);
        cache.get_or_create(&QueryKey::new("forms").with(2), Duration::ZERO);
        cache.get_or_create(&QueryKey::new("projects"), Duration::ZERO);

        assert_eq!(cache.remove_matching(&QueryKey::new("forms")), 2);
        assert_eq!(cache.len(), 1);
    }
}

//! Typed subscription to one cache entry

use crate::cache::{QueryEntry, Registration};
use crate::client::{downcast, QueryClient};
use crate::key::QueryKey;
use crate::options::{QueryFn, QueryOptions};
use crate::state::{QueryResult, QueryState, QueryStatus};
use iaso_core::{ApiError, ApiResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Handle returned by [`QueryClient::observe`].
///
/// The observer keeps its entry alive and fetches it on creation when it is
/// enabled and stale. Dropping the last observer of a key cancels the fetch in
/// flight and schedules the entry for removal after its cache time.
pub struct QueryObserver<T> {
    client: QueryClient,
    entry: Arc<QueryEntry>,
    receiver: watch::Receiver<QueryState>,
    query_fn: QueryFn<T>,
    options: QueryOptions<T>,
    registration: Arc<Registration>,
    subscriber: u64,
    previous: Option<Arc<T>>,
    poller: Option<JoinHandle<()>>,
}

impl<T: Send + Sync + 'static> QueryObserver<T> {
    pub(crate) fn new(
        client: QueryClient,
        key: QueryKey,
        query_fn: QueryFn<T>,
        options: QueryOptions<T>,
    ) -> Self {
        let cache_time = options.cache_time.unwrap_or(client.defaults().cache_time);
        let entry = client.entry(&key, cache_time);
        let registration = client.registration(query_fn.clone(), &options);
        let subscriber = entry.attach(registration.clone(), options.enabled, cache_time);

        let mut observer = Self {
            receiver: entry.subscribe(),
            client,
            entry,
            query_fn,
            options,
            registration,
            subscriber,
            previous: None,
            poller: None,
        };
        observer.mount();
        observer
    }

    fn stale_time(&self) -> Duration {
        self.options
            .stale_time
            .unwrap_or(self.client.defaults().stale_time)
    }

    fn mount(&mut self) {
        if !self.options.enabled {
            return;
        }

        if self.entry.snapshot().is_stale(self.stale_time()) {
            drop(self.client.fetch_entry(&self.entry, self.registration.clone()));
        } else {
            debug!("Serving fresh data for {}", self.entry.key);
            self.client.record_hit();
        }

        if let Some(every) = self.options.refetch_interval {
            let client = self.client.clone();
            let entry = Arc::clone(&self.entry);
            let registration = self.registration.clone();
            self.poller = Some(tokio::spawn(async move {
                let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    interval.tick().await;
                    drop(client.fetch_entry(&entry, registration.clone()));
                }
            }));
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.entry.key
    }

    /// Current state, with `select` and `keep_previous_data` applied
    pub fn result(&self) -> QueryResult<T> {
        let state = self.receiver.borrow().clone();
        let mut data = state
            .data
            .as_ref()
            .and_then(|data| downcast::<T>(&self.entry.key, data))
            .map(|data| match &self.options.select {
                Some(select) => Arc::new(select(&data)),
                None => data,
            });

        let mut status = state.status;
        let mut is_previous_data = false;
        if data.is_none() && self.options.keep_previous_data {
            if let Some(previous) = &self.previous {
                data = Some(Arc::clone(previous));
                is_previous_data = true;
                if status == QueryStatus::Loading {
                    status = QueryStatus::Success;
                }
            }
        }

        QueryResult {
            data,
            error: state.error.clone(),
            status,
            fetch_status: state.fetch_status,
            is_previous_data,
            is_stale: state.is_stale(self.stale_time()),
            data_updated_at: state.data_updated_at,
        }
    }

    /// Wait for the next state change. Returns false if the entry went away.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Wait until no fetch is in flight and return the result
    pub async fn settled(&mut self) -> QueryResult<T> {
        {
            let _ = self.receiver.wait_for(|state| !state.is_fetching()).await;
        }
        self.result()
    }

    /// Fetch now, joining a fetch already in flight
    pub async fn refetch(&self) -> ApiResult<Arc<T>> {
        let data = self
            .client
            .fetch_entry(&self.entry, self.registration.clone())
            .await?;
        let data = downcast::<T>(&self.entry.key, &data).ok_or_else(|| {
            ApiError::Decode(format!("cached data for {} has another type", self.entry.key))
        })?;
        Ok(match &self.options.select {
            Some(select) => Arc::new(select(&data)),
            None => data,
        })
    }

    /// Cancel the fetch in flight for this key
    pub fn cancel(&self) -> bool {
        self.entry.cancel()
    }

    /// Switch to another key, keeping the current data as previous data
    pub fn set_query(&mut self, key: impl Into<QueryKey>, query_fn: QueryFn<T>) {
        let key = key.into();
        if let Some(data) = self.result().data {
            self.previous = Some(data);
        }
        self.query_fn = query_fn;

        if key == self.entry.key {
            self.registration = self.client.registration(self.query_fn.clone(), &self.options);
            self.entry
                .set_registration(self.subscriber, self.registration.clone());
            return;
        }

        debug!("Observer moving from {} to {}", self.entry.key, key);
        self.unmount();
        self.attach_to(key);
        self.mount();
    }

    /// Enable or disable automatic fetching, including refetches after
    /// invalidation
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.options.enabled == enabled {
            return;
        }
        self.options.enabled = enabled;
        self.entry.set_enabled(self.subscriber, enabled);
        if enabled {
            self.mount();
        } else if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }

    fn cache_time(&self) -> Duration {
        self.options
            .cache_time
            .unwrap_or(self.client.defaults().cache_time)
    }

    fn attach_to(&mut self, key: QueryKey) {
        let cache_time = self.cache_time();
        self.entry = self.client.entry(&key, cache_time);
        self.registration = self.client.registration(self.query_fn.clone(), &self.options);
        self.subscriber = self
            .entry
            .attach(self.registration.clone(), self.options.enabled, cache_time);
        self.receiver = self.entry.subscribe();
    }
}

impl<T> QueryObserver<T> {
    fn unmount(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        self.client.release(&self.entry, self.subscriber);
    }
}

impl<T> Drop for QueryObserver<T> {
    fn drop(&mut self) {
        self.unmount();
    }
}

//! Options understood by the query engine

use crate::key::QueryKey;
use futures::future::BoxFuture;
use iaso_core::{ApiError, ApiResult};
use iaso_resilience::RetryPolicy;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Argument passed to every query function
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub key: QueryKey,
    /// Cancelled when the fetch is aborted; pass it to the transport
    pub token: CancellationToken,
}

pub type QueryFn<T> = Arc<dyn Fn(QueryContext) -> BoxFuture<'static, ApiResult<T>> + Send + Sync>;
pub type Select<T> = Arc<dyn Fn(&T) -> T + Send + Sync>;
pub type OnSuccess<T> = Arc<dyn Fn(&T) + Send + Sync>;
pub type OnError = Arc<dyn Fn(&ApiError) + Send + Sync>;

/// Box an async closure as a [`QueryFn`]
pub fn query_fn<T, F, Fut>(f: F) -> QueryFn<T>
where
    F: Fn(QueryContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// How many times a failed fetch is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    Never,
    Times(u32),
    Forever,
}

impl Retry {
    pub fn policy(&self, initial_delay: Duration, max_delay: Duration) -> RetryPolicy {
        match self {
            Retry::Never => RetryPolicy::none(),
            Retry::Times(n) => RetryPolicy::from_retries(*n, initial_delay, max_delay),
            Retry::Forever => RetryPolicy::from_retries(u32::MAX, initial_delay, max_delay),
        }
    }
}

impl From<bool> for Retry {
    fn from(retry: bool) -> Self {
        if retry {
            Retry::Forever
        } else {
            Retry::Never
        }
    }
}

impl From<u32> for Retry {
    fn from(times: u32) -> Self {
        if times == 0 {
            Retry::Never
        } else {
            Retry::Times(times)
        }
    }
}

/// Per-query options. Unset timings fall back to the client defaults.
pub struct QueryOptions<T> {
    /// When false the query never fetches on its own
    pub enabled: bool,
    pub retry: Option<Retry>,
    /// How long fetched data is considered fresh
    pub stale_time: Option<Duration>,
    /// How long an entry without observers is kept
    pub cache_time: Option<Duration>,
    /// Report the previous key's data while a new key loads
    pub keep_previous_data: bool,
    pub refetch_interval: Option<Duration>,
    /// Projection applied to data read through the observer
    pub select: Option<Select<T>>,
    pub on_success: Option<OnSuccess<T>>,
    pub on_error: Option<OnError>,
    /// Runs once per failed execution, before any observer's `on_error`,
    /// however many observers share it
    pub report_error: Option<OnError>,
}

impl<T> Default for QueryOptions<T> {
    fn default() -> Self {
        Self {
            enabled: true,
            retry: None,
            stale_time: None,
            cache_time: None,
            keep_previous_data: false,
            refetch_interval: None,
            select: None,
            on_success: None,
            on_error: None,
            report_error: None,
        }
    }
}

impl<T> Clone for QueryOptions<T> {
    fn clone(&self) -> Self {
        Self {
            enabled: self.enabled,
            retry: self.retry,
            stale_time: self.stale_time,
            cache_time: self.cache_time,
            keep_previous_data: self.keep_previous_data,
            refetch_interval: self.refetch_interval,
            select: self.select.clone(),
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            report_error: self.report_error.clone(),
        }
    }
}

impl<T> std::fmt::Debug for QueryOptions<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOptions")
            .field("enabled", &self.enabled)
            .field("retry", &self.retry)
            .field("stale_time", &self.stale_time)
            .field("cache_time", &self.cache_time)
            .field("keep_previous_data", &self.keep_previous_data)
            .field("refetch_interval", &self.refetch_interval)
            .field("select", &self.select.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("report_error", &self.report_error.is_some())
            .finish()
    }
}

impl<T> QueryOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn retry(mut self, retry: impl Into<Retry>) -> Self {
        self.retry = Some(retry.into());
        self
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub fn cache_time(mut self, cache_time: Duration) -> Self {
        self.cache_time = Some(cache_time);
        self
    }

    pub fn keep_previous_data(mut self, keep: bool) -> Self {
        self.keep_previous_data = keep;
        self
    }

    pub fn refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = Some(interval);
        self
    }

    pub fn select(mut self, select: impl Fn(&T) -> T + Send + Sync + 'static) -> Self {
        self.select = Some(Arc::new(select));
        self
    }

    pub fn on_success(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&ApiError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn report_error(mut self, f: impl Fn(&ApiError) + Send + Sync + 'static) -> Self {
        self.report_error = Some(Arc::new(f));
        self
    }
}

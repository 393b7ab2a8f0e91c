//! The snack client: a query cache paired with a notification sink

use iaso_caching::{QueryClient, QueryDefaults, QueryKey};
use iaso_config::{IasoConfig, QueryConfig};
use iaso_core::{NotificationQueue, NotificationSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use crate::messages::DefaultMessages;

const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(60);

/// Engine defaults derived from the query configuration
pub fn query_defaults(config: &QueryConfig) -> QueryDefaults {
    QueryDefaults {
        stale_time: config.stale_time,
        cache_time: config.cache_time,
        retry: config.retry,
        mutation_retry: config.mutation_retry,
        retry_initial_delay: config.retry_initial_delay,
        retry_max_delay: config.retry_max_delay,
    }
}

struct SnackClientInner {
    queries: QueryClient,
    notifications: Arc<dyn NotificationSink>,
    messages: DefaultMessages,
    gc_interval: Duration,
}

/// Entry point of the request-state layer.
///
/// Owns the query cache, the notification sink and the fallback messages
/// that the snack wrappers use. Clones share all three, so one client is
/// built at startup and handed to every consumer.
#[derive(Clone)]
pub struct SnackClient {
    inner: Arc<SnackClientInner>,
}

impl std::fmt::Debug for SnackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnackClient")
            .field("queries", &self.inner.queries)
            .field("messages", &self.inner.messages)
            .finish()
    }
}

impl SnackClient {
    /// Client with default messages around an existing cache
    pub fn new(queries: QueryClient, notifications: Arc<dyn NotificationSink>) -> Self {
        Self::builder()
            .queries(queries)
            .notifications(notifications)
            .build()
    }

    pub fn builder() -> SnackClientBuilder {
        SnackClientBuilder::default()
    }

    /// Build a client from the application configuration
    pub fn from_config(config: &IasoConfig, notifications: Arc<dyn NotificationSink>) -> Self {
        info!(
            stale_time = ?config.query.stale_time,
            cache_time = ?config.query.cache_time,
            retry = config.query.retry,
            "Creating snack client"
        );
        Self::builder()
            .queries(QueryClient::with_defaults(query_defaults(&config.query)))
            .notifications(notifications)
            .messages(DefaultMessages::from(&config.messages))
            .gc_interval(config.query.gc_interval)
            .build()
    }

    pub fn queries(&self) -> &QueryClient {
        &self.inner.queries
    }

    pub fn notifications(&self) -> &Arc<dyn NotificationSink> {
        &self.inner.notifications
    }

    pub fn messages(&self) -> &DefaultMessages {
        &self.inner.messages
    }

    /// Mark every query under `filter` stale, refetching the observed ones
    pub fn invalidate(&self, filter: impl Into<QueryKey>) -> usize {
        self.inner.queries.invalidate_queries(filter)
    }

    /// Start the periodic sweep of expired cache entries
    pub fn start_gc_task(&self) -> JoinHandle<()> {
        self.inner.queries.start_gc_task(self.inner.gc_interval)
    }
}

/// Builder for [`SnackClient`]
#[derive(Default)]
pub struct SnackClientBuilder {
    queries: Option<QueryClient>,
    notifications: Option<Arc<dyn NotificationSink>>,
    messages: Option<DefaultMessages>,
    gc_interval: Option<Duration>,
}

impl SnackClientBuilder {
    pub fn queries(mut self, queries: QueryClient) -> Self {
        self.queries = Some(queries);
        self
    }

    pub fn notifications(mut self, notifications: Arc<dyn NotificationSink>) -> Self {
        self.notifications = Some(notifications);
        self
    }

    pub fn messages(mut self, messages: DefaultMessages) -> Self {
        self.messages = Some(messages);
        self
    }

    pub fn gc_interval(mut self, interval: Duration) -> Self {
        self.gc_interval = Some(interval);
        self
    }

    /// Unset parts fall back to a fresh cache, an in-process queue and the
    /// configured default messages
    pub fn build(self) -> SnackClient {
        SnackClient {
            inner: Arc::new(SnackClientInner {
                queries: self.queries.unwrap_or_default(),
                notifications: self
                    .notifications
                    .unwrap_or_else(|| Arc::new(NotificationQueue::new())),
                messages: self.messages.unwrap_or_default(),
                gc_interval: self.gc_interval.unwrap_or(DEFAULT_GC_INTERVAL),
            }),
        }
    }
}

//! Snack queries: cached reads that report their failures
//!
//! A query is described once by a [`QueryDescriptor`]. Legacy call sites
//! that pass the parts positionally go through [`QueryCall`], which accepts
//! tuples in the order `(query_key, query_fn, snack_error_msg, options,
//! dispatch_on_error)` and resolves them into the same descriptor.

use iaso_caching::{OnError, QueryFn, QueryKey, QueryObserver, QueryOptions};
use iaso_core::{ApiError, ApiResult, Message, NotificationSink, SnackMessage};
use std::sync::Arc;
use tracing::debug;

use crate::client::SnackClient;
use crate::snackbar::query_error_notification;

/// Everything a snack query needs
pub struct QueryDescriptor<T> {
    pub query_key: QueryKey,
    pub query_fn: QueryFn<T>,
    pub snack_error_msg: SnackMessage,
    pub options: QueryOptions<T>,
    /// When false, failures only update the query's error state
    pub dispatch_on_error: bool,
}

impl<T> Clone for QueryDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            query_key: self.query_key.clone(),
            query_fn: self.query_fn.clone(),
            snack_error_msg: self.snack_error_msg.clone(),
            options: self.options.clone(),
            dispatch_on_error: self.dispatch_on_error,
        }
    }
}

impl<T> std::fmt::Debug for QueryDescriptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryDescriptor")
            .field("query_key", &self.query_key)
            .field("snack_error_msg", &self.snack_error_msg)
            .field("options", &self.options)
            .field("dispatch_on_error", &self.dispatch_on_error)
            .finish()
    }
}

impl<T> QueryDescriptor<T> {
    pub fn new(query_key: impl Into<QueryKey>, query_fn: QueryFn<T>) -> Self {
        Self {
            query_key: query_key.into(),
            query_fn,
            snack_error_msg: SnackMessage::Default,
            options: QueryOptions::default(),
            dispatch_on_error: true,
        }
    }

    pub fn snack_error_msg(mut self, message: impl Into<SnackMessage>) -> Self {
        self.snack_error_msg = message.into();
        self
    }

    pub fn options(mut self, options: QueryOptions<T>) -> Self {
        self.options = options;
        self
    }

    pub fn dispatch_on_error(mut self, dispatch: bool) -> Self {
        self.dispatch_on_error = dispatch;
        self
    }
}

/// The two accepted call shapes of a snack query
pub enum QueryCall<T> {
    Descriptor(QueryDescriptor<T>),
    Positional {
        query_key: QueryKey,
        query_fn: QueryFn<T>,
        snack_error_msg: SnackMessage,
        options: QueryOptions<T>,
        dispatch_on_error: bool,
    },
}

impl<T> QueryCall<T> {
    /// Normalize into a descriptor
    pub fn resolve(self) -> QueryDescriptor<T> {
        match self {
            QueryCall::Descriptor(descriptor) => descriptor,
            QueryCall::Positional {
                query_key,
                query_fn,
                snack_error_msg,
                options,
                dispatch_on_error,
            } => QueryDescriptor {
                query_key,
                query_fn,
                snack_error_msg,
                options,
                dispatch_on_error,
            },
        }
    }
}

impl<T> From<QueryDescriptor<T>> for QueryCall<T> {
    fn from(descriptor: QueryDescriptor<T>) -> Self {
        QueryCall::Descriptor(descriptor)
    }
}

impl<T, K: Into<QueryKey>> From<(K, QueryFn<T>)> for QueryCall<T> {
    fn from((query_key, query_fn): (K, QueryFn<T>)) -> Self {
        (query_key, query_fn, SnackMessage::Default).into()
    }
}

impl<T, K, M> From<(K, QueryFn<T>, M)> for QueryCall<T>
where
    K: Into<QueryKey>,
    M: Into<SnackMessage>,
{
    fn from((query_key, query_fn, message): (K, QueryFn<T>, M)) -> Self {
        (query_key, query_fn, message, QueryOptions::default()).into()
    }
}

impl<T, K, M> From<(K, QueryFn<T>, M, QueryOptions<T>)> for QueryCall<T>
where
    K: Into<QueryKey>,
    M: Into<SnackMessage>,
{
    fn from((query_key, query_fn, message, options): (K, QueryFn<T>, M, QueryOptions<T>)) -> Self {
        (query_key, query_fn, message, options, true).into()
    }
}

impl<T, K, M> From<(K, QueryFn<T>, M, QueryOptions<T>, bool)> for QueryCall<T>
where
    K: Into<QueryKey>,
    M: Into<SnackMessage>,
{
    fn from(
        (query_key, query_fn, message, options, dispatch_on_error): (
            K,
            QueryFn<T>,
            M,
            QueryOptions<T>,
            bool,
        ),
    ) -> Self {
        QueryCall::Positional {
            query_key: query_key.into(),
            query_fn,
            snack_error_msg: message.into(),
            options,
            dispatch_on_error,
        }
    }
}

/// Add the error notification as the execution's reporter.
///
/// The engine runs one reporter per failed execution and then every
/// observer's own `on_error`, so the caller's handler is still forwarded to
/// when another consumer of the key started the fetch. Consumers that never
/// notify register no reporter and leave reporting to those that do.
fn with_error_notification<T>(
    descriptor: &QueryDescriptor<T>,
    notifications: Arc<dyn NotificationSink>,
    default: Message,
) -> QueryOptions<T> {
    let mut options = descriptor.options.clone();
    if !descriptor.dispatch_on_error || descriptor.snack_error_msg == SnackMessage::Suppressed {
        return options;
    }

    let message = descriptor.snack_error_msg.clone();
    let key = descriptor.query_key.clone();
    let caller_report = descriptor.options.report_error.clone();
    let report: OnError = Arc::new(move |error: &ApiError| {
        match query_error_notification(&message, &default, true, error) {
            Some(notification) => notifications.enqueue(notification),
            None => debug!("No notification for failed query {}: {}", key, error),
        }
        if let Some(caller_report) = &caller_report {
            caller_report(error);
        }
    });
    options.report_error = Some(report);
    options
}

impl SnackClient {
    /// Subscribe to a query whose failures are reported as notifications.
    ///
    /// Never fails itself: errors surface through the observer's result and
    /// the notification queue.
    pub fn snack_query<T: Send + Sync + 'static>(
        &self,
        call: impl Into<QueryCall<T>>,
    ) -> QueryObserver<T> {
        let descriptor = call.into().resolve();
        let options = self.wrap_query(&descriptor);
        self.queries()
            .observe(descriptor.query_key, descriptor.query_fn, options)
    }

    /// Subscribe to several snack queries at once
    pub fn snack_queries<T: Send + Sync + 'static>(
        &self,
        calls: impl IntoIterator<Item = QueryCall<T>>,
    ) -> Vec<QueryObserver<T>> {
        calls.into_iter().map(|call| self.snack_query(call)).collect()
    }

    /// Run a snack query once and return its data.
    ///
    /// Fresh cached data is returned without a request; `select` is not
    /// applied.
    pub async fn fetch_snack_query<T: Send + Sync + 'static>(
        &self,
        call: impl Into<QueryCall<T>>,
    ) -> ApiResult<Arc<T>> {
        let descriptor = call.into().resolve();
        let options = self.wrap_query(&descriptor);
        self.queries()
            .fetch_query(descriptor.query_key, descriptor.query_fn, options)
            .await
    }

    fn wrap_query<T>(&self, descriptor: &QueryDescriptor<T>) -> QueryOptions<T> {
        with_error_notification(
            descriptor,
            Arc::clone(self.notifications()),
            self.messages().query_error.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iaso_caching::{query_fn, QueryClient};
    use iaso_core::{Notification, NotificationQueue};
    use mockall::mock;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    mock! {
        Sink {}
        impl NotificationSink for Sink {
            fn enqueue(&self, notification: Notification);
        }
    }

    fn client_with_queue() -> (SnackClient, Arc<NotificationQueue>) {
        let queue = Arc::new(NotificationQueue::new());
        let client = SnackClient::new(QueryClient::new(), queue.clone());
        (client, queue)
    }

    fn failing(status: u16) -> QueryFn<u32> {
        query_fn(move |_| async move { Err(ApiError::http(status, json!({"detail": "nope"}))) })
    }

    #[tokio::test]
    async fn test_failure_enqueues_default_message_and_forwards() {
        let (client, queue) = client_with_queue();
        let forwarded = Arc::new(AtomicU32::new(0));
        let counter = forwarded.clone();

        let mut observer = client.snack_query(
            QueryDescriptor::new("orgUnits", failing(500)).options(
                QueryOptions::new().retry(false).on_error(move |error| {
                    assert_eq!(error.status(), Some(500));
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            ),
        );

        let result = observer.settled().await;
        assert!(result.is_error());
        assert_eq!(forwarded.load(Ordering::SeqCst), 1);

        let notifications = queue.drain();
        assert_eq!(notifications.len(), 1);
        assert_eq!(
            notifications[0].message.as_ref().unwrap().id,
            "iaso.snackBar.defaultQueryApiError"
        );
    }

    #[tokio::test]
    async fn test_dispatch_disabled_never_notifies() {
        let mut sink = MockSink::new();
        sink.expect_enqueue().never();
        let client = SnackClient::new(QueryClient::new(), Arc::new(sink));

        let custom = Message::new("forms.error", "Could not load forms");
        let mut observer = client.snack_query((
            "forms",
            failing(500),
            custom,
            QueryOptions::new().retry(false),
            false,
        ));

        assert!(observer.settled().await.is_error());
    }

    #[tokio::test]
    async fn test_suppressed_message_and_unauthorized_are_silent() {
        let mut sink = MockSink::new();
        sink.expect_enqueue().never();
        let client = SnackClient::new(QueryClient::new(), Arc::new(sink));

        let mut suppressed = client.snack_query((
            "a",
            failing(500),
            SnackMessage::Suppressed,
            QueryOptions::new().retry(false),
        ));
        let mut unauthorized = client.snack_query((
            "b",
            query_fn(|_| async { Err::<u32, _>(ApiError::Unauthorized { details: json!(null) }) }),
            SnackMessage::Default,
            QueryOptions::new().retry(false),
        ));

        assert!(suppressed.settled().await.is_error());
        assert!(unauthorized.settled().await.is_error());
    }

    #[tokio::test]
    async fn test_positional_and_descriptor_shapes_agree() {
        let message = Message::new("instances.error", "Could not load instances");

        let positional: QueryCall<u32> = (
            ("instances", 7),
            failing(404),
            message.clone(),
            QueryOptions::new().retry(false),
            true,
        )
            .into();
        let descriptor: QueryCall<u32> = QueryDescriptor::new(("instances", 7), failing(404))
            .snack_error_msg(message.clone())
            .options(QueryOptions::new().retry(false))
            .into();

        let mut outcomes = Vec::new();
        for call in [positional, descriptor] {
            let (client, queue) = client_with_queue();
            let mut observer = client.snack_query(call);
            let result = observer.settled().await;
            let notifications = queue.drain();
            outcomes.push((
                observer.key().clone(),
                result.error.and_then(|e| e.status()),
                notifications
                    .iter()
                    .map(|n| (n.message.clone(), n.error_log.clone()))
                    .collect::<Vec<_>>(),
            ));
        }

        assert_eq!(outcomes[0], outcomes[1]);
        assert_eq!(outcomes[0].2.len(), 1);
        assert_eq!(outcomes[0].2[0].0, Some(message));
    }

    #[tokio::test]
    async fn test_shared_key_notifies_once_per_execution() {
        let (client, queue) = client_with_queue();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let slow_failure = query_fn(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Err::<u32, _>(ApiError::http(500, json!(null)))
            }
        });

        let mut first = client.snack_query((
            "projects",
            slow_failure.clone(),
            SnackMessage::Default,
            QueryOptions::new().retry(false),
        ));
        let mut second = client.snack_query((
            "projects",
            slow_failure,
            SnackMessage::Default,
            QueryOptions::new().retry(false),
        ));

        assert!(first.settled().await.is_error());
        assert!(second.settled().await.is_error());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_every_consumer_of_a_key_gets_its_handler_called() {
        let (client, queue) = client_with_queue();
        let (first_calls, second_calls) = (Arc::new(AtomicU32::new(0)), Arc::new(AtomicU32::new(0)));
        let (first_counter, second_counter) = (first_calls.clone(), second_calls.clone());
        let slow_failure = query_fn(|_| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Err::<u32, _>(ApiError::http(500, json!(null)))
        });

        let mut first = client.snack_query(QueryDescriptor::new("k", slow_failure.clone()).options(
            QueryOptions::new().retry(false).on_error(move |_| {
                first_counter.fetch_add(1, Ordering::SeqCst);
            }),
        ));
        let mut second = client.snack_query(QueryDescriptor::new("k", slow_failure).options(
            QueryOptions::new().retry(false).on_error(move |_| {
                second_counter.fetch_add(1, Ordering::SeqCst);
            }),
        ));

        assert!(first.settled().await.is_error());
        assert!(second.settled().await.is_error());
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_refetch_reports_even_when_latest_consumer_is_silent() {
        let (client, queue) = client_with_queue();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let fails_after_first = query_fn(move |_| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Ok(1u32)
                } else {
                    Err(ApiError::http(500, json!({"detail": "gone"})))
                }
            }
        });
        let options = || QueryOptions::new().retry(false).stale_time(Duration::from_secs(60));

        let mut table = client.snack_query(("orgUnits", fails_after_first.clone(), SnackMessage::Default, options()));
        assert!(table.settled().await.is_success());
        let mut badge = client.snack_query((
            "orgUnits",
            fails_after_first,
            SnackMessage::Default,
            options(),
            false,
        ));
        assert!(queue.is_empty());

        client.invalidate("orgUnits");
        assert!(badge.settled().await.is_error());
        assert!(table.settled().await.is_error());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_fetch_is_not_notified() {
        let mut sink = MockSink::new();
        sink.expect_enqueue().never();
        let client = SnackClient::new(QueryClient::new(), Arc::new(sink));

        let mut observer = client.snack_query((
            "slow",
            query_fn(|context| async move {
                context.token.cancelled().await;
                Err::<u32, _>(ApiError::Cancelled)
            }),
        ));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(observer.cancel());

        let result = observer.settled().await;
        assert!(!result.is_error());
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_snack_queries_subscribes_each_call() {
        let (client, queue) = client_with_queue();
        let calls: Vec<QueryCall<u32>> = vec![
            ("one", query_fn(|_| async { Ok(1u32) })).into(),
            ("two", query_fn(|_| async { Ok(2u32) })).into(),
        ];

        let mut observers = client.snack_queries(calls);
        let mut values = Vec::new();
        for observer in &mut observers {
            values.push(*observer.settled().await.data().unwrap());
        }
        assert_eq!(values, vec![1, 2]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_snack_query_returns_data_or_notifies() {
        let (client, queue) = client_with_queue();

        let data = client
            .fetch_snack_query(("count", query_fn(|_| async { Ok(3u32) })))
            .await
            .unwrap();
        assert_eq!(*data, 3);

        let error = client
            .fetch_snack_query((
                "broken",
                failing(502),
                SnackMessage::Default,
                QueryOptions::new().retry(false),
            ))
            .await
            .unwrap_err();
        assert_eq!(error.status(), Some(502));
        assert_eq!(queue.len(), 1);
    }
}

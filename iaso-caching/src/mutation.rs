//! Mutations: uncached writes with observable state

use futures::future::BoxFuture;
use iaso_core::{ApiError, ApiResult};
use iaso_resilience::{RetryError, RetryExecutor, RetryPolicy};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::options::Retry;

pub type MutationFn<V, T> = Arc<dyn Fn(V) -> BoxFuture<'static, ApiResult<T>> + Send + Sync>;
pub type MutationOnSuccess<V, T> = Arc<dyn Fn(&T, &V) + Send + Sync>;
pub type MutationOnError<V> = Arc<dyn Fn(&ApiError, &V) + Send + Sync>;
pub type MutationOnSettled<V, T> = Arc<dyn Fn(Option<&T>, Option<&ApiError>, &V) + Send + Sync>;

/// Box an async closure as a [`MutationFn`]
pub fn mutation_fn<V, T, F, Fut>(f: F) -> MutationFn<V, T>
where
    F: Fn(V) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
{
    Arc::new(move |variables| Box::pin(f(variables)))
}

pub struct MutationOptions<V, T> {
    /// Unset means the client's mutation default, which never retries
    pub retry: Option<Retry>,
    pub on_success: Option<MutationOnSuccess<V, T>>,
    pub on_error: Option<MutationOnError<V>>,
    pub on_settled: Option<MutationOnSettled<V, T>>,
}

impl<V, T> Default for MutationOptions<V, T> {
    fn default() -> Self {
        Self {
            retry: None,
            on_success: None,
            on_error: None,
            on_settled: None,
        }
    }
}

impl<V, T> Clone for MutationOptions<V, T> {
    fn clone(&self) -> Self {
        Self {
            retry: self.retry,
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            on_settled: self.on_settled.clone(),
        }
    }
}

impl<V, T> MutationOptions<V, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retry(mut self, retry: impl Into<Retry>) -> Self {
        self.retry = Some(retry.into());
        self
    }

    pub fn on_success(mut self, f: impl Fn(&T, &V) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&ApiError, &V) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_settled(
        mut self,
        f: impl Fn(Option<&T>, Option<&ApiError>, &V) + Send + Sync + 'static,
    ) -> Self {
        self.on_settled = Some(Arc::new(f));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug)]
pub struct MutationState<T> {
    pub status: MutationStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<ApiError>,
    pub submitted_at: Option<Instant>,
}

impl<T> Default for MutationState<T> {
    fn default() -> Self {
        Self {
            status: MutationStatus::Idle,
            data: None,
            error: None,
            submitted_at: None,
        }
    }
}

impl<T> Clone for MutationState<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            submitted_at: self.submitted_at,
        }
    }
}

impl<T> MutationState<T> {
    pub fn is_idle(&self) -> bool {
        self.status == MutationStatus::Idle
    }

    pub fn is_loading(&self) -> bool {
        self.status == MutationStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == MutationStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == MutationStatus::Error
    }
}

/// Runs a mutation function and tracks the state of its latest execution.
///
/// Callbacks run before the state settles: `on_success` or `on_error`
/// first, then `on_settled`. A cancelled execution runs no callback and
/// returns the handle to idle.
pub struct MutationObserver<V, T> {
    mutation_fn: MutationFn<V, T>,
    options: MutationOptions<V, T>,
    retry: RetryPolicy,
    state: Arc<watch::Sender<MutationState<T>>>,
    executions: Arc<AtomicU64>,
}

impl<V, T> Clone for MutationObserver<V, T> {
    fn clone(&self) -> Self {
        Self {
            mutation_fn: self.mutation_fn.clone(),
            options: self.options.clone(),
            retry: self.retry.clone(),
            state: self.state.clone(),
            executions: self.executions.clone(),
        }
    }
}

/// Returns the handle to idle if a `mutate_async` future is dropped before
/// it settles, unless a newer execution has started since
struct PendingExecution<'a, T> {
    state: &'a watch::Sender<MutationState<T>>,
    executions: &'a AtomicU64,
    execution: u64,
    settled: bool,
}

impl<T> Drop for PendingExecution<'_, T> {
    fn drop(&mut self) {
        if !self.settled && self.executions.load(Ordering::SeqCst) == self.execution {
            debug!("Mutation dropped before settling");
            self.state.send_replace(MutationState::default());
        }
    }
}

impl<V, T> MutationObserver<V, T>
where
    V: Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    pub(crate) fn new(
        mutation_fn: MutationFn<V, T>,
        options: MutationOptions<V, T>,
        retry: RetryPolicy,
    ) -> Self {
        let (state, _) = watch::channel(MutationState::default());
        Self {
            mutation_fn,
            options,
            retry,
            state: Arc::new(state),
            executions: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run the mutation and wait for its outcome.
    ///
    /// Dropping the future before it settles returns the handle to idle
    /// without running any callback.
    pub async fn mutate_async(&self, variables: V) -> ApiResult<Arc<T>> {
        let mut pending = PendingExecution {
            state: &self.state,
            executions: &self.executions,
            execution: self.executions.fetch_add(1, Ordering::SeqCst) + 1,
            settled: false,
        };
        self.state.send_replace(MutationState {
            status: MutationStatus::Loading,
            data: None,
            error: None,
            submitted_at: Some(Instant::now()),
        });

        let executor = RetryExecutor::new(self.retry.clone());
        let result = executor
            .execute(|| (self.mutation_fn)(variables.clone()))
            .await
            .map_err(RetryError::into_inner);
        pending.settled = true;

        match result {
            Ok(data) => {
                let data = Arc::new(data);
                if let Some(on_success) = &self.options.on_success {
                    on_success(&data, &variables);
                }
                if let Some(on_settled) = &self.options.on_settled {
                    on_settled(Some(&data), None, &variables);
                }
                self.state.send_modify(|state| {
                    state.status = MutationStatus::Success;
                    state.data = Some(Arc::clone(&data));
                });
                Ok(data)
            }
            Err(ApiError::Cancelled) => {
                debug!("Mutation cancelled");
                self.state.send_replace(MutationState::default());
                Err(ApiError::Cancelled)
            }
            Err(error) => {
                warn!("Mutation failed: {}", error);
                if let Some(on_error) = &self.options.on_error {
                    on_error(&error, &variables);
                }
                if let Some(on_settled) = &self.options.on_settled {
                    on_settled(None, Some(&error), &variables);
                }
                self.state.send_modify(|state| {
                    state.status = MutationStatus::Error;
                    state.error = Some(error.clone());
                });
                Err(error)
            }
        }
    }

    /// Run the mutation in the background; the outcome is observable via [`state`](Self::state)
    pub fn mutate(&self, variables: V) -> JoinHandle<()> {
        let observer = self.clone();
        tokio::spawn(async move {
            if let Err(e) = observer.mutate_async(variables).await {
                debug!("Background mutation settled with error: {}", e);
            }
        })
    }

    pub fn state(&self) -> MutationState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MutationState<T>> {
        self.state.subscribe()
    }

    /// Return to idle, forgetting the last outcome
    pub fn reset(&self) {
        self.state.send_replace(MutationState::default());
    }
}

//! Resilience patterns for Iaso
//!
//! Retry policies with configurable backoff. The query engine retries
//! failed fetches through [`RetryExecutor`]; [`ApiError`](iaso_core::ApiError)
//! implements [`Retryable`] so that client errors, 401s and cancellations
//! are never retried.

pub mod backoff;
pub mod retry;

// Re-export commonly used types
pub use backoff::{BackoffCalculator, BackoffStrategy};
pub use retry::{RetryError, RetryExecutor, RetryPolicy, Retryable};

//! Query cache and fetch engine for Iaso
//!
//! A [`QueryClient`] holds cached query results keyed by [`QueryKey`].
//! Observers subscribe to a key and trigger fetches; identical keys share one
//! in-flight fetch. Data goes stale after `stale_time`, entries without
//! observers are removed after `cache_time`, and invalidation marks entries
//! stale and refetches the observed ones. Mutations are uncached writes
//! exposed through [`MutationObserver`].

mod cache;
pub mod client;
pub mod config;
pub mod key;
pub mod mutation;
pub mod observer;
pub mod options;
pub mod state;
pub mod stats;

// Re-export main types
pub use client::QueryClient;
pub use config::QueryDefaults;
pub use key::QueryKey;
pub use mutation::{
    mutation_fn, MutationFn, MutationObserver, MutationOnError, MutationOnSettled,
    MutationOnSuccess, MutationOptions, MutationState, MutationStatus,
};
pub use observer::QueryObserver;
pub use options::{query_fn, OnError, OnSuccess, QueryContext, QueryFn, QueryOptions, Retry, Select};
pub use state::{FetchStatus, QueryResult, QueryStatus};
pub use stats::{QueryCacheStats, StatsCollector};

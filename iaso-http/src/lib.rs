//! REST transport for the Iaso request-state layer
//!
//! This crate is the `Api` collaborator of the query wrappers: typed
//! `get/post/patch/put/delete` helpers over a pluggable [`Transport`], a
//! reqwest-backed [`ApiClient`], login redirection on 401 and cancellation
//! through a [`CancellationToken`](tokio_util::sync::CancellationToken).

pub mod api;
pub mod client;
pub mod config;
pub mod errors;
pub mod mock;
pub mod types;

// Re-export main types for convenience
pub use api::Api;
pub use client::{ApiClient, LogRedirect, Transport, UnauthorizedHandler};
pub use config::HttpConfig;
pub use errors::HttpError;
pub use mock::MockTransport;
pub use types::{ApiRequest, Fetched, HttpMethod, HttpMethodError};

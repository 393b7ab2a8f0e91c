//! Snack-integrated queries and mutations
//!
//! [`SnackClient`] layers user notifications on top of the query engine:
//! failed queries and mutations enqueue an error notification, successful
//! mutations enqueue a success notification and invalidate the queries they
//! affect. Call sites describe a request with a [`QueryDescriptor`] or a
//! [`MutationDescriptor`], or use the positional tuple shapes accepted by
//! [`QueryCall`] and [`MutationCall`].

pub mod client;
pub mod messages;
pub mod mutation;
pub mod params;
pub mod query;
pub mod snackbar;

// Re-export main types
pub use client::{query_defaults, SnackClient, SnackClientBuilder};
pub use messages::DefaultMessages;
pub use mutation::{InvalidateKeys, MutationCall, MutationDescriptor};
pub use params::{api_params, url_params, ApiParams, ApiParamsMemo, ParamDefaults, ParamMap};
pub use query::{QueryCall, QueryDescriptor};
pub use snackbar::{default_success_snack_bar, success_snack_bar, SuccessSnackBar};

pub mod prelude {
    pub use crate::{
        api_params, url_params, ApiParamsMemo, DefaultMessages, InvalidateKeys, MutationCall,
        MutationDescriptor, ParamDefaults, QueryCall, QueryDescriptor, SnackClient,
    };
    pub use iaso_caching::{
        mutation_fn, query_fn, MutationOptions, QueryClient, QueryKey, QueryObserver,
        QueryOptions, Retry,
    };
    pub use iaso_core::{ApiError, ApiResult, Message, NotificationQueue, SnackMessage};
}

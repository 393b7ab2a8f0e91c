//! Core types for the Iaso request-state layer
//!
//! This crate holds the vocabulary shared by the transport, the cache engine
//! and the snack wrappers: the structured API error, translatable messages
//! and the notifications pushed to the user-facing snackbar queue.

pub mod error;
pub mod message;
pub mod notification;

// Re-export commonly used types at the crate root
pub use error::{ApiError, ApiResult};
pub use message::{Message, SnackMessage};
pub use notification::{
    Notification, NotificationOptions, NotificationQueue, NotificationSink, NotificationVariant,
};

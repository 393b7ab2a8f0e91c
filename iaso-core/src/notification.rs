//! Snackbar notifications and the queue they are dispatched to

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

use crate::{ApiError, Message};

/// Message key used by success notifications without a custom message
pub const SAVE_SUCCESSFUL_KEY: &str = "saveSuccessful";

/// Message key used by error notifications
pub const ERROR_KEY: &str = "error";

/// Visual variant of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationVariant {
    Success,
    Error,
    Warning,
    Info,
}

/// Display options of a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationOptions {
    pub variant: NotificationVariant,

    /// Persistent notifications stay until dismissed
    pub persist: bool,
}

/// A transient user-facing message.
///
/// Created when a request settles and consumed once by whatever renders the
/// snackbar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,

    #[serde(rename = "messageKey")]
    pub message_key: String,

    #[serde(rename = "messageObject", skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,

    pub options: NotificationOptions,

    #[serde(rename = "errorLog", skip_serializing_if = "Option::is_none")]
    pub error_log: Option<JsonValue>,

    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(message_key: impl Into<String>, variant: NotificationVariant, persist: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            message_key: message_key.into(),
            message: None,
            options: NotificationOptions { variant, persist },
            error_log: None,
            created_at: Utc::now(),
        }
    }

    /// Standard success notification, dismissed automatically
    pub fn success(message: &Message) -> Self {
        Self::new(SAVE_SUCCESSFUL_KEY, NotificationVariant::Success, false)
            .with_message(message.clone())
    }

    /// Standard error notification carrying the error details as its log
    pub fn error(message: &Message, error: &ApiError) -> Self {
        let error_log = error
            .details()
            .cloned()
            .unwrap_or_else(|| JsonValue::String(error.to_string()));

        Self::new(ERROR_KEY, NotificationVariant::Error, true)
            .with_message(message.clone())
            .with_error_log(error_log)
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message);
        self
    }

    pub fn with_error_log(mut self, error_log: JsonValue) -> Self {
        self.error_log = Some(error_log);
        self
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.options.persist = persist;
        self
    }

    pub fn variant(&self) -> NotificationVariant {
        self.options.variant
    }

    /// Text to display, falling back to the message key
    pub fn text(&self) -> String {
        self.message
            .as_ref()
            .map(Message::format)
            .unwrap_or_else(|| self.message_key.clone())
    }
}

/// Destination of notifications produced by the request layer
pub trait NotificationSink: Send + Sync {
    fn enqueue(&self, notification: Notification);
}

/// In-process FIFO of pending notifications
#[derive(Debug, Default)]
pub struct NotificationQueue {
    pending: Mutex<VecDeque<Notification>>,
    available: Notify,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the next notification and remove it from the queue
    pub async fn next(&self) -> Notification {
        loop {
            let available = self.available.notified();
            if let Some(notification) = self.pending.lock().pop_front() {
                return notification;
            }
            available.await;
        }
    }

    /// Remove the next notification without waiting
    pub fn try_next(&self) -> Option<Notification> {
        self.pending.lock().pop_front()
    }

    /// Remove every pending notification
    pub fn drain(&self) -> Vec<Notification> {
        self.pending.lock().drain(..).collect()
    }

    /// Copy of the pending notifications, oldest first
    pub fn snapshot(&self) -> Vec<Notification> {
        self.pending.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl NotificationSink for NotificationQueue {
    fn enqueue(&self, notification: Notification) {
        debug!(
            key = %notification.message_key,
            variant = ?notification.options.variant,
            "Enqueueing notification"
        );
        self.pending.lock().push_back(notification);
        self.available.notify_one();
    }
}

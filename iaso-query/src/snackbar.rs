//! Building the notifications dispatched by the wrappers
//!
//! The functions here decide whether a settled request produces a
//! notification and which one. They are pure; enqueueing is left to the
//! wrappers so the gating rules can be checked in isolation.

use iaso_core::{ApiError, Message, Notification, SnackMessage};
use std::sync::Arc;

/// Factory for the notification shown after a successful mutation
pub type SuccessSnackBar<T> = Arc<dyn Fn(&Message, &T) -> Notification + Send + Sync>;

/// Wrap a closure as a [`SuccessSnackBar`]
pub fn success_snack_bar<T, F>(f: F) -> SuccessSnackBar<T>
where
    F: Fn(&Message, &T) -> Notification + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The standard success notification, ignoring the returned data
pub fn default_success_snack_bar<T: 'static>() -> SuccessSnackBar<T> {
    Arc::new(|message: &Message, _: &T| Notification::success(message))
}

/// Errors that never reach the notification queue.
///
/// A 401 is answered by the login redirect and a cancellation is not a
/// failure.
pub fn is_silent(error: &ApiError) -> bool {
    error.is_unauthorized() || error.is_cancelled()
}

/// Error notification for a failed query, if one should be shown
pub fn query_error_notification(
    message: &SnackMessage,
    default: &Message,
    dispatch_on_error: bool,
    error: &ApiError,
) -> Option<Notification> {
    if !dispatch_on_error || is_silent(error) {
        return None;
    }
    message
        .resolve(default)
        .map(|message| Notification::error(message, error))
}

/// Error notification for a failed mutation, if one should be shown
pub fn mutation_error_notification(
    message: &SnackMessage,
    default: &Message,
    ignore_error_codes: &[u16],
    error: &ApiError,
) -> Option<Notification> {
    if is_silent(error) || error.has_status_in(ignore_error_codes) {
        return None;
    }
    message
        .resolve(default)
        .map(|message| Notification::error(message, error))
}

/// Success notification for a mutation, if one should be shown
pub fn mutation_success_notification<T>(
    message: &SnackMessage,
    default: &Message,
    show_success_snack_bar: bool,
    factory: &SuccessSnackBar<T>,
    data: &T,
) -> Option<Notification> {
    if !show_success_snack_bar {
        return None;
    }
    message.resolve(default).map(|message| factory(message, data))
}

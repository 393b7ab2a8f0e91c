//! API error type shared by every layer above the transport

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type alias for API calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Error produced by a request to the backend.
///
/// `Http` carries the status code and the parsed error body so that forms can
/// display field-level errors. `Cancelled` is not a failure: it marks a request
/// that was aborted by its caller and must never be reported to the user.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Non-2xx response other than 401
    #[error("Request failed with status {status}: {message}")]
    Http {
        status: u16,
        message: String,
        details: JsonValue,
    },

    /// HTTP 401, handled by the transport through a login redirect
    #[error("Authentication required")]
    Unauthorized { details: JsonValue },

    /// Connection, DNS or timeout failure before a response was received
    #[error("Network error: {0}")]
    Network(String),

    /// A 2xx response whose body could not be decoded
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// The request was aborted through its signal
    #[error("Request cancelled")]
    Cancelled,
}

impl ApiError {
    /// Build an HTTP error, deriving the message from the body when possible
    pub fn http(status: u16, details: JsonValue) -> Self {
        let message = extract_message(&details).unwrap_or_else(|| format!("HTTP {}", status));
        ApiError::Http {
            status,
            message,
            details,
        }
    }

    /// HTTP status of the failed response, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Unauthorized { .. } => Some(401),
            _ => None,
        }
    }

    /// Parsed error body, if the server sent one
    pub fn details(&self) -> Option<&JsonValue> {
        match self {
            ApiError::Http { details, .. } | ApiError::Unauthorized { details } => {
                if details.is_null() {
                    None
                } else {
                    Some(details)
                }
            }
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// 4xx responses, 401 included
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|status| (400..500).contains(&status))
    }

    /// 5xx responses
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|status| status >= 500)
    }

    /// Whether the error has an HTTP status contained in `codes`
    pub fn has_status_in(&self, codes: &[u16]) -> bool {
        self.status().is_some_and(|status| codes.contains(&status))
    }

    /// Field-level validation messages from a `{field: [messages]}` body.
    ///
    /// String values are accepted as single messages; nested objects and
    /// other shapes are ignored.
    pub fn field_errors(&self) -> BTreeMap<String, Vec<String>> {
        let mut errors = BTreeMap::new();
        let Some(JsonValue::Object(map)) = self.details() else {
            return errors;
        };

        for (field, value) in map {
            let messages: Vec<String> = match value {
                JsonValue::String(message) => vec![message.clone()],
                JsonValue::Array(items) => items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
                _ => continue,
            };
            if !messages.is_empty() {
                errors.insert(field.clone(), messages);
            }
        }

        errors
    }
}

fn extract_message(details: &JsonValue) -> Option<String> {
    match details {
        JsonValue::String(text) if !text.is_empty() => Some(text.clone()),
        JsonValue::Object(map) => ["detail", "error", "message"]
            .iter()
            .find_map(|field| map.get(*field).and_then(|v| v.as_str()))
            .map(str::to_string),
        _ => None,
    }
}

//! HTTP error types

use iaso_core::ApiError;

/// Error raised while setting up the transport
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),

    #[error("Invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Map a reqwest failure that happened before a response was read
pub(crate) fn from_reqwest(err: reqwest::Error) -> ApiError {
    if err.is_decode() {
        ApiError::Decode(err.to_string())
    } else {
        ApiError::Network(err.to_string())
    }
}

pub(crate) fn from_url(path: &str, err: url::ParseError) -> ApiError {
    ApiError::Network(format!("Invalid request path '{}': {}", path, err))
}

pub(crate) fn from_json(err: serde_json::Error) -> ApiError {
    ApiError::Decode(err.to_string())
}

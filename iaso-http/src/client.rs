//! HTTP client implementation

use crate::config::HttpConfig;
use crate::errors::{self, HttpError};
use crate::types::ApiRequest;
use iaso_core::{ApiError, ApiResult};
use reqwest::{Client, StatusCode};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Sends [`ApiRequest`]s to the backend and returns the decoded JSON body.
///
/// Implementations map non-2xx responses to [`ApiError`]; a 401 must come
/// back as [`ApiError::Unauthorized`].
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> ApiResult<JsonValue>;
}

/// Navigation hook invoked when the backend rejects the session
pub trait UnauthorizedHandler: Send + Sync {
    fn redirect(&self, login_path: &str);
}

/// Handler that only logs the redirect target
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRedirect;

impl UnauthorizedHandler for LogRedirect {
    fn redirect(&self, login_path: &str) {
        warn!("Session rejected by the server, redirecting to {}", login_path);
    }
}

/// reqwest-backed transport
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    login_path: String,
    unauthorized: Arc<dyn UnauthorizedHandler>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("login_path", &self.login_path)
            .finish()
    }
}

impl ApiClient {
    /// Create a new client with the given configuration
    pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
        debug!(
            "Creating ApiClient for {} with {}s timeout",
            config.base_url,
            config.timeout.as_secs()
        );
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()?;

        Ok(Self {
            client,
            base_url: Url::parse(&config.base_url)?,
            login_path: config.login_path,
            unauthorized: Arc::new(LogRedirect),
        })
    }

    /// Replace the handler called on 401 responses
    pub fn with_unauthorized_handler(mut self, handler: Arc<dyn UnauthorizedHandler>) -> Self {
        self.unauthorized = handler;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve(&self, request: &ApiRequest) -> ApiResult<Url> {
        let mut url = self
            .base_url
            .join(&request.path)
            .map_err(|e| errors::from_url(&request.path, e))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }

    async fn read_body(response: reqwest::Response) -> ApiResult<JsonValue> {
        let text = response.text().await.map_err(errors::from_reqwest)?;
        if text.trim().is_empty() {
            return Ok(JsonValue::Null);
        }
        serde_json::from_str(&text).map_err(errors::from_json)
    }
}

#[async_trait::async_trait]
impl Transport for ApiClient {
    async fn send(&self, request: ApiRequest) -> ApiResult<JsonValue> {
        let url = self.resolve(&request)?;
        debug!("{} {}", request.method, url);

        let mut builder = self.client.request(request.method.into(), url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(errors::from_reqwest)?;
        let status = response.status();
        debug!("{} -> {}", request.route(), status);

        if status.is_success() {
            return Self::read_body(response).await;
        }

        if status == StatusCode::UNAUTHORIZED {
            let details = Self::read_body(response).await.unwrap_or(JsonValue::Null);
            self.unauthorized.redirect(&self.login_path);
            return Err(ApiError::Unauthorized { details });
        }

        let text = response.text().await.map_err(errors::from_reqwest)?;
        let details = serde_json::from_str(&text).unwrap_or(JsonValue::String(text));
        warn!("{} failed with status {}", request.route(), status);
        Err(ApiError::http(status.as_u16(), details))
    }
}

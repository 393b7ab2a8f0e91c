//! HTTP configuration

use iaso_config::ApiConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Base URL request paths are resolved against
    pub base_url: String,

    /// Request timeout
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Whether to verify SSL certificates
    pub verify_ssl: bool,

    /// Route passed to the unauthorized handler on 401
    pub login_path: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        ApiConfig::default().into()
    }
}

impl From<ApiConfig> for HttpConfig {
    fn from(config: ApiConfig) -> Self {
        Self {
            base_url: config.base_url,
            timeout: config.timeout,
            user_agent: config.user_agent,
            verify_ssl: config.verify_ssl,
            login_path: config.login_path,
        }
    }
}

impl HttpConfig {
    /// Configuration pointing at another base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

//! Backend transport configuration

use crate::error::ConfigResult;
use crate::validation::{
    validate_positive, validate_required_string, validate_route, validate_url, Validatable,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of the REST transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every request path is joined to
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_timeout"
    )]
    pub timeout: Duration,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whether to verify TLS certificates
    #[serde(default = "crate::domains::utils::default_true")]
    pub verify_ssl: bool,

    /// Route the user is sent to when the backend answers 401
    #[serde(default = "default_login_path")]
    pub login_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            verify_ssl: true,
            login_path: default_login_path(),
        }
    }
}

impl Validatable for ApiConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.base_url, "base_url", self.domain_name())?;
        validate_positive(self.timeout.as_secs(), "timeout", self.domain_name())?;
        validate_required_string(&self.user_agent, "user_agent", self.domain_name())?;
        validate_route(&self.login_path, "login_path", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "api"
    }
}

fn default_base_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    "Iaso/1.0".to_string()
}

fn default_login_path() -> String {
    "/login/".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_config_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.base_url, "http://localhost:8081");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.login_path, "/login/");
        assert!(config.verify_ssl);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_api_config_validation() {
        let mut config = ApiConfig::default();
        config.timeout = Duration::from_secs(0);
        assert!(config.validate().is_err());

        config = ApiConfig::default();
        config.base_url = "localhost".to_string();
        assert!(config.validate().is_err());

        config = ApiConfig::default();
        config.login_path = "login".to_string();
        assert!(config.validate().is_err());
    }
}

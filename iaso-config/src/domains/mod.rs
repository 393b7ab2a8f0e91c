//! Domain-specific configuration modules

pub mod api;
pub mod logging;
pub mod messages;
pub mod query;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IasoConfig {
    /// Backend transport configuration
    #[serde(default)]
    pub api: api::ApiConfig,

    /// Query engine defaults
    #[serde(default)]
    pub query: query::QueryConfig,

    /// Default snackbar messages
    #[serde(default)]
    pub messages: messages::MessagesConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl IasoConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.api.validate()?;
        self.query.validate()?;
        self.messages.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = IasoConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}

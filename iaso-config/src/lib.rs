//! Domain-driven configuration for the Iaso request-state layer
//!
//! Configuration is split by functional domain (api transport, query engine
//! defaults, default snackbar messages, logging), with serde defaults,
//! validation and environment variable overrides.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    api::ApiConfig, logging::LoggingConfig, messages::MessagesConfig, query::QueryConfig,
    IasoConfig,
};

// Re-export utilities
pub use domains::utils::{serde_duration, serde_duration_ms};

//! Logging initialisation for the Iaso request-state layer
//!
//! Every crate in the workspace logs through `tracing`; this crate installs
//! the global subscriber from a [`LoggingConfig`].

pub mod init;

pub use iaso_config::domains::logging::{LogFormat, LogLevel};
pub use iaso_config::LoggingConfig;
pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing};

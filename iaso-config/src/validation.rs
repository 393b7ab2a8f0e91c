//! Configuration validation traits and utilities

use crate::error::{ConfigError, ConfigResult};

/// Trait for validatable configuration
pub trait Validatable {
    /// Validate the configuration
    fn validate(&self) -> ConfigResult<()>;

    /// Get the domain name for error reporting
    fn domain_name(&self) -> &'static str;

    /// Helper to create a domain-specific validation error
    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::DomainError {
            domain: self.domain_name().to_string(),
            message: message.into(),
        }
    }
}

/// Validate a required string field
pub fn validate_required_string(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} cannot be empty", field_name),
        });
    }
    Ok(())
}

/// Validate a positive number
pub fn validate_positive<T>(value: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value <= T::default() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must be greater than 0, got {}", field_name, value),
        });
    }
    Ok(())
}

/// Validate an absolute http(s) URL
pub fn validate_url(url: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    validate_required_string(url, field_name, domain)?;

    let parsed = url::Url::parse(url).map_err(|e| ConfigError::DomainError {
        domain: domain.to_string(),
        message: format!("{} has invalid URL format: {}", field_name, e),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must use http or https, got {}", field_name, parsed.scheme()),
        });
    }

    Ok(())
}

/// Validate an application route such as `/login/`
pub fn validate_route(route: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    validate_required_string(route, field_name, domain)?;

    if !route.starts_with('/') {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must start with '/', got {}", field_name, route),
        });
    }

    Ok(())
}

/// Validate that `lower` does not exceed `upper`
pub fn validate_ordered<T>(
    lower: T,
    upper: T,
    lower_name: &str,
    upper_name: &str,
    domain: &str,
) -> ConfigResult<()>
where
    T: PartialOrd + std::fmt::Debug,
{
    if lower > upper {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!(
                "{} ({:?}) cannot exceed {} ({:?})",
                lower_name, lower, upper_name, upper
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://iaso.bluesquare.org", "base_url", "api").is_ok());
        assert!(validate_url("", "base_url", "api").is_err());
        assert!(validate_url("not-a-url", "base_url", "api").is_err());
        assert!(validate_url("ftp://example.com", "base_url", "api").is_err());
    }

    #[test]
    fn test_validate_route() {
        assert!(validate_route("/login/", "login_path", "api").is_ok());
        assert!(validate_route("login", "login_path", "api").is_err());
        assert!(validate_route("  ", "login_path", "api").is_err());
    }

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive(1u64, "timeout", "api").is_ok());
        assert!(validate_positive(0u64, "timeout", "api").is_err());
    }

    #[test]
    fn test_validate_ordered() {
        assert!(validate_ordered(1, 2, "a", "b", "query").is_ok());
        let err = validate_ordered(3, 2, "a", "b", "query").unwrap_err();
        assert!(err.to_string().contains("a (3) cannot exceed b (2)"));
    }
}

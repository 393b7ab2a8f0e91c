//! Default snackbar messages

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};
use iaso_core::Message;
use serde::{Deserialize, Serialize};

/// Messages used when a call site does not provide its own
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    /// Shown when a query fails
    #[serde(default = "default_query_error")]
    pub query_error: Message,

    /// Shown when a mutation succeeds
    #[serde(default = "default_mutation_success")]
    pub mutation_success: Message,

    /// Shown when a mutation fails
    #[serde(default = "default_mutation_error")]
    pub mutation_error: Message,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            query_error: default_query_error(),
            mutation_success: default_mutation_success(),
            mutation_error: default_mutation_error(),
        }
    }
}

impl Validatable for MessagesConfig {
    fn validate(&self) -> ConfigResult<()> {
        for (field, message) in [
            ("query_error", &self.query_error),
            ("mutation_success", &self.mutation_success),
            ("mutation_error", &self.mutation_error),
        ] {
            validate_required_string(&message.id, &format!("{}.id", field), self.domain_name())?;
            validate_required_string(
                &message.default_message,
                &format!("{}.defaultMessage", field),
                self.domain_name(),
            )?;
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "messages"
    }
}

fn default_query_error() -> Message {
    Message::new(
        "iaso.snackBar.defaultQueryApiError",
        "An error occurred while fetching data",
    )
}

fn default_mutation_success() -> Message {
    Message::new("iaso.snackBar.defaultMutationApiSuccess", "Saved successfully")
}

fn default_mutation_error() -> Message {
    Message::new(
        "iaso.snackBar.defaultMutationApiError",
        "An error occurred while saving",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_messages_are_valid() {
        let config = MessagesConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mutation_success.default_message, "Saved successfully");
    }

    #[test]
    fn test_empty_message_rejected() {
        let mut config = MessagesConfig::default();
        config.query_error = Message::new("", "text");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_override_from_yaml() {
        let yaml = r#"
mutation_error:
  id: custom.error
  defaultMessage: "Could not save"
"#;
        let config: MessagesConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.mutation_error.id, "custom.error");
        assert_eq!(config.query_error, default_query_error());
    }
}

//! Fallback messages used when a call site leaves its message unspecified

use iaso_config::MessagesConfig;
use iaso_core::Message;

/// Messages injected into a [`SnackClient`](crate::SnackClient)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultMessages {
    pub query_error: Message,
    pub mutation_success: Message,
    pub mutation_error: Message,
}

impl Default for DefaultMessages {
    fn default() -> Self {
        MessagesConfig::default().into()
    }
}

impl From<MessagesConfig> for DefaultMessages {
    fn from(config: MessagesConfig) -> Self {
        Self {
            query_error: config.query_error,
            mutation_success: config.mutation_success,
            mutation_error: config.mutation_error,
        }
    }
}

impl From<&MessagesConfig> for DefaultMessages {
    fn from(config: &MessagesConfig) -> Self {
        config.clone().into()
    }
}

impl DefaultMessages {
    pub fn with_query_error(mut self, message: Message) -> Self {
        self.query_error = message;
        self
    }

    pub fn with_mutation_success(mut self, message: Message) -> Self {
        self.mutation_success = message;
        self
    }

    pub fn with_mutation_error(mut self, message: Message) -> Self {
        self.mutation_error = message;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_config() {
        let messages = DefaultMessages::default();
        assert_eq!(messages.query_error.id, "iaso.snackBar.defaultQueryApiError");
        assert_eq!(messages.mutation_success.default_message, "Saved successfully");
    }

    #[test]
    fn test_override_single_message() {
        let messages =
            DefaultMessages::default().with_mutation_error(Message::new("forms.error", "Nope"));
        assert_eq!(messages.mutation_error.id, "forms.error");
        assert_eq!(messages.query_error, DefaultMessages::default().query_error);
    }
}

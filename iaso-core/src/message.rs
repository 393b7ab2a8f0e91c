//! Translatable messages

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A translatable message descriptor.
///
/// `id` is the translation key; `default_message` is used when no
/// translation is available. `{name}` placeholders in the text are replaced
/// with `values` by [`Message::format`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,

    #[serde(rename = "defaultMessage")]
    pub default_message: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, String>,
}

impl Message {
    pub fn new(id: impl Into<String>, default_message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            default_message: default_message.into(),
            values: BTreeMap::new(),
        }
    }

    /// Attach a placeholder value
    pub fn with_value(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.values.insert(name.into(), value.to_string());
        self
    }

    /// Render the default text with its placeholder values
    pub fn format(&self) -> String {
        self.values
            .iter()
            .fold(self.default_message.clone(), |text, (name, value)| {
                text.replace(&format!("{{{}}}", name), value)
            })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

/// Message slot of a snack query or mutation.
///
/// The three states mirror what call sites can ask for: nothing specified
/// (use the configured default), a specific message, or no notification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SnackMessage {
    #[default]
    Default,
    Custom(Message),
    Suppressed,
}

impl SnackMessage {
    /// Resolve against a default; `None` when notifications are suppressed
    pub fn resolve<'a>(&'a self, default: &'a Message) -> Option<&'a Message> {
        match self {
            SnackMessage::Default => Some(default),
            SnackMessage::Custom(message) => Some(message),
            SnackMessage::Suppressed => None,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, SnackMessage::Suppressed)
    }
}

impl From<Message> for SnackMessage {
    fn from(message: Message) -> Self {
        SnackMessage::Custom(message)
    }
}

/// `None` is an explicit opt-out, not "use the default"
impl From<Option<Message>> for SnackMessage {
    fn from(message: Option<Message>) -> Self {
        match message {
            Some(message) => SnackMessage::Custom(message),
            None => SnackMessage::Suppressed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_placeholders() {
        let message = Message::new("iaso.forms.saved", "Form {name} saved ({count})")
            .with_value("name", "Household")
            .with_value("count", 3);
        assert_eq!(message.format(), "Form Household saved (3)");
        assert_eq!(message.to_string(), "Form Household saved (3)");
    }

    #[test]
    fn test_snack_message_resolution() {
        let default = Message::new("default", "Default");
        let custom = Message::new("custom", "Custom");

        assert_eq!(SnackMessage::Default.resolve(&default), Some(&default));
        assert_eq!(
            SnackMessage::from(custom.clone()).resolve(&default),
            Some(&custom)
        );
        assert_eq!(SnackMessage::Suppressed.resolve(&default), None);
        assert!(SnackMessage::from(None).is_suppressed());
    }

    #[test]
    fn test_message_serde_shape() {
        let message = Message::new("iaso.label.save", "Save");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "iaso.label.save", "defaultMessage": "Save"})
        );
    }
}

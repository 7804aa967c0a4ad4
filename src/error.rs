//! Error types for schema declaration and loading
//!
//! Validation failures are never errors: they are collected into a
//! [`ValidationReport`](crate::ValidationReport). Everything here is a
//! programmer or deployment mistake surfaced while schemas are being built.

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema declaration and registry errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Invalid declaration for '{attribute}': {reason}")]
    Definition { attribute: String, reason: String },

    #[error("Rule references undeclared attribute '{name}'{}", suggestion_hint(.suggestion))]
    UnknownAttribute {
        name: String,
        suggestion: Option<String>,
    },

    #[error("Invalid format pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unknown validator: {0}")]
    UnknownValidator(String),

    #[error("Schema already registered for action: {0}")]
    AlreadyRegistered(String),

    #[error("No schema registered for action: {0}")]
    NotFound(String),

    #[error("Unsupported declaration file: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SchemaError {
    pub(crate) fn definition(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Definition {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    /// Qualify a declaration error with the enclosing attribute's name
    pub(crate) fn within(self, parent: &str) -> Self {
        match self {
            Self::Definition { attribute, reason } => Self::Definition {
                attribute: format!("{}.{}", parent, attribute),
                reason,
            },
            other => other,
        }
    }
}

fn suggestion_hint(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean '{}'?)", name),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_attribute_message_with_suggestion() {
        let err = SchemaError::UnknownAttribute {
            name: "emial".to_string(),
            suggestion: Some("email".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Rule references undeclared attribute 'emial' (did you mean 'email'?)"
        );
    }

    #[test]
    fn test_unknown_attribute_message_without_suggestion() {
        let err = SchemaError::UnknownAttribute {
            name: "zzz".to_string(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "Rule references undeclared attribute 'zzz'");
    }
}

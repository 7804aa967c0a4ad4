//! Error collection and rendering
//!
//! Evaluation produces structured `(path, message)` pairs. Display strings
//! such as `"Items[0].name can't be blank"` are derived only here, when a
//! report is rendered for a caller.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default status for a rejected payload (422 Unprocessable Entity)
pub const UNPROCESSABLE_ENTITY: u16 = 422;

/// One failure at one location of the input
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructuredError {
    /// Dot/bracket path, e.g. `items[0].name`
    pub path: String,
    pub message: String,
}

impl StructuredError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn display_message(&self) -> String {
        display_message(&self.path, &self.message)
    }
}

impl fmt::Display for StructuredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_message())
    }
}

/// Replace underscores with spaces and capitalize the first character.
///
/// Dots and bracket indices are left alone, so `items[0].unit_price`
/// becomes `Items[0].unit price`.
pub fn humanize(path: &str) -> String {
    let spaced = path.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn display_message(path: &str, message: &str) -> String {
    format!("{} {}", humanize(path), message)
}

/// Insertion-ordered set of errors for one evaluation
#[derive(Debug, Default)]
pub struct ErrorAggregator {
    errors: Vec<StructuredError>,
    seen: HashSet<(String, String)>,
}

impl ErrorAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure; returns false when the exact pair was already present
    pub fn add(&mut self, path: impl Into<String>, message: impl Into<String>) -> bool {
        let key = (path.into(), message.into());
        if self.seen.contains(&key) {
            return false;
        }
        self.errors.push(StructuredError::new(key.0.clone(), key.1.clone()));
        self.seen.insert(key);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[StructuredError] {
        &self.errors
    }

    pub fn into_report(self) -> ValidationReport {
        ValidationReport {
            valid: self.errors.is_empty(),
            errors: self.errors,
        }
    }
}

/// Outcome of validating one payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<StructuredError>,
}

impl ValidationReport {
    /// The report used when no schema is configured for an action
    pub fn vacuous() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn display_messages(&self) -> Vec<String> {
        self.errors.iter().map(StructuredError::display_message).collect()
    }

    /// Error payload for a client, or `None` when the payload was valid
    pub fn render(&self, format: ResponseFormat, status: u16) -> Option<ErrorResponse> {
        if self.valid {
            return None;
        }

        let messages = self.display_messages();
        let body = match format {
            ResponseFormat::Json => serde_json::json!({ "errors": messages }).to_string(),
            ResponseFormat::Plain => messages.join(", "),
        };

        Some(ErrorResponse {
            status,
            content_type: format.content_type(),
            body,
        })
    }
}

/// How a rejected payload is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Json,
    Plain,
}

impl ResponseFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ResponseFormat::Json => "application/json",
            ResponseFormat::Plain => "text/plain; charset=utf-8",
        }
    }
}

impl FromStr for ResponseFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(ResponseFormat::Json),
            "plain" | "text" => Ok(ResponseFormat::Plain),
            other => Err(format!("unknown response format '{}'", other)),
        }
    }
}

/// A rendered client error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("customer_name"), "Customer name");
        assert_eq!(humanize("address.street"), "Address.street");
        assert_eq!(humanize("items[0].unit_price"), "Items[0].unit price");
        assert_eq!(humanize(""), "");
    }

    #[test]
    fn test_display_message() {
        assert_eq!(
            display_message("customer_name", "can't be blank"),
            "Customer name can't be blank"
        );
    }

    #[test]
    fn test_aggregator_drops_exact_duplicates() {
        let mut errors = ErrorAggregator::new();
        assert!(errors.add("email", "is invalid"));
        assert!(!errors.add("email", "is invalid"));
        assert!(errors.add("email", "can't be blank"));
        assert!(errors.add("name", "is invalid"));
        assert_eq!(errors.len(), 3);
        assert_eq!(errors.errors()[0], StructuredError::new("email", "is invalid"));
    }

    #[test]
    fn test_render_json() {
        let mut errors = ErrorAggregator::new();
        errors.add("items", "must be an array");
        let report = errors.into_report();

        let response = report.render(ResponseFormat::Json, UNPROCESSABLE_ENTITY).unwrap();
        assert_eq!(response.status, 422);
        assert_eq!(response.content_type, "application/json");
        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body, serde_json::json!({"errors": ["Items must be an array"]}));
    }

    #[test]
    fn test_render_plain() {
        let mut errors = ErrorAggregator::new();
        errors.add("customer_name", "can't be blank");
        errors.add("email", "is invalid");
        let response = errors
            .into_report()
            .render(ResponseFormat::Plain, UNPROCESSABLE_ENTITY)
            .unwrap();
        assert_eq!(response.body, "Customer name can't be blank, Email is invalid");
    }

    #[test]
    fn test_valid_report_renders_nothing() {
        assert!(ValidationReport::vacuous()
            .render(ResponseFormat::Json, UNPROCESSABLE_ENTITY)
            .is_none());
    }
}

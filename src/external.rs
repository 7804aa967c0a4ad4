//! Independently declared validators
//!
//! An attribute can delegate to a validator that lives outside the schema
//! tree. Its failures are reported relative to the object it was given and
//! re-rooted by the evaluator under the attribute's path.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::evaluator::EvaluationContext;
use crate::report::StructuredError;
use crate::schema::Schema;

/// Shared handle to an external validator
pub type ValidatorRef = Arc<dyn ExternalValidator>;

/// A validator that checks one object on its own terms
pub trait ExternalValidator: fmt::Debug + Send + Sync {
    /// Name used in `"must be an object for <name>"`
    fn name(&self) -> &str;

    /// Validate `value`, returning failures keyed relative to it.
    ///
    /// `context` is the evaluation that reached `value`; validators that
    /// recurse should do so through it so depth and array limits carry over.
    fn validate(&self, value: &Map<String, Value>, context: EvaluationContext<'_>) -> Vec<StructuredError>;
}

/// An external validator defined by its own schema
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    name: String,
    schema: Schema,
}

impl SchemaValidator {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Convenience for building a [`ValidatorRef`]
    pub fn shared(self) -> ValidatorRef {
        Arc::new(self)
    }
}

impl ExternalValidator for SchemaValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, value: &Map<String, Value>, context: EvaluationContext<'_>) -> Vec<StructuredError> {
        context.evaluate(&self.schema, value)
    }
}

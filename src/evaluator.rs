//! Recursive evaluation of a payload against a schema
//!
//! The evaluator walks schema and value together. For each attribute, in
//! declaration order, it extracts the field, coerces scalars, runs the
//! attribute's rules and then recurses into nested objects, external
//! validators and arrays. Every failure becomes a `(path, message)` pair in
//! the call's [`ErrorAggregator`]; nothing here returns early with an error.
//!
//! ## Paths
//!
//! ```text
//! customer_name          top-level attribute
//! address.street         nested object or external validator
//! items[1].quantity      element of an array
//! ```

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use crate::coerce::ScalarType;
use crate::error::Result;
use crate::external::ValidatorRef;
use crate::report::{ErrorAggregator, StructuredError, ValidationReport};
use crate::schema::{AttributeKind, ElementKind, Schema};

/// Default bound on nested objects, external validators included
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Guards against pathological input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationOptions {
    /// Deepest nesting level evaluated; deeper branches become one error
    pub max_depth: usize,
    /// Longest array evaluated element by element
    pub max_array_length: Option<usize>,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_array_length: None,
        }
    }
}

/// The enclosing evaluation an external validator runs under.
///
/// Carries the caller's evaluator (and so its guards) and the depth already
/// reached, so limits hold across validator boundaries.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    evaluator: &'a Evaluator,
    depth: usize,
}

impl<'a> EvaluationContext<'a> {
    /// Context of a top-level evaluation
    pub fn root(evaluator: &'a Evaluator) -> Self {
        Self {
            evaluator,
            depth: 0,
        }
    }

    pub fn evaluator(&self) -> &'a Evaluator {
        self.evaluator
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Evaluate `schema` at this depth, with paths relative to `map`
    pub fn evaluate(&self, schema: &Schema, map: &Map<String, Value>) -> Vec<StructuredError> {
        let mut errors = ErrorAggregator::new();
        self.evaluator
            .evaluate_level(schema, map, "", self.depth, &mut errors);
        errors.into_report().errors
    }
}

/// Stateless interpreter for [`Schema`] trees.
///
/// All per-call state lives in the aggregator created by
/// [`validate`](Evaluator::validate), so one evaluator and one schema can
/// serve any number of threads at once.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    options: EvaluationOptions,
}

impl Evaluator {
    pub fn new(options: EvaluationOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EvaluationOptions {
        &self.options
    }

    /// Validate an untyped payload.
    ///
    /// A root that is not an object has no fields, so every attribute is
    /// treated as missing.
    pub fn validate(&self, schema: &Schema, value: &Value) -> ValidationReport {
        match value {
            Value::Object(map) => self.validate_object(schema, map),
            _ => self.validate_object(schema, &Map::new()),
        }
    }

    pub fn validate_object(&self, schema: &Schema, map: &Map<String, Value>) -> ValidationReport {
        let mut errors = ErrorAggregator::new();
        self.evaluate(schema, map, "", &mut errors);
        errors.into_report()
    }

    /// Validate a typed value by first converting it to its untyped form
    pub fn validate_serializable<T: Serialize>(&self, schema: &Schema, value: &T) -> Result<ValidationReport> {
        let value = serde_json::to_value(value)?;
        Ok(self.validate(schema, &value))
    }

    /// Evaluate one level, adding failures under `prefix`
    pub fn evaluate(
        &self,
        schema: &Schema,
        map: &Map<String, Value>,
        prefix: &str,
        errors: &mut ErrorAggregator,
    ) {
        self.evaluate_level(schema, map, prefix, 0, errors);
    }

    fn evaluate_level(
        &self,
        schema: &Schema,
        map: &Map<String, Value>,
        prefix: &str,
        depth: usize,
        errors: &mut ErrorAggregator,
    ) {
        for attribute in schema.attributes() {
            let path = join(prefix, &attribute.name);

            let raw = map
                .get(&attribute.name)
                .or(attribute.options.default.as_ref())
                .map(Cow::Borrowed);

            let value = match (&attribute.kind, raw) {
                (AttributeKind::Scalar(ty), Some(raw)) => match ty.coerce(&raw) {
                    Ok(coerced) => Some(Cow::Owned(coerced)),
                    Err(reason) => {
                        errors.add(path, format!("is invalid: {}", reason));
                        continue;
                    }
                },
                (_, raw) => raw,
            };
            let value = value.as_deref();

            for rule in schema.rules_for(&attribute.name) {
                for check in rule.checks() {
                    for message in check.run(value) {
                        errors.add(path.clone(), message);
                    }
                }
            }

            match (&attribute.kind, value) {
                (AttributeKind::Scalar(_), _) | (_, None) | (_, Some(Value::Null)) => {}
                (AttributeKind::Nested(sub), Some(Value::Object(obj))) => {
                    self.descend(sub, obj, &path, depth, errors);
                }
                (AttributeKind::Nested(_), Some(_)) => {
                    errors.add(path, "must be an object");
                }
                (AttributeKind::External(validator), Some(Value::Object(obj))) => {
                    self.delegate(validator, obj, &path, depth, errors);
                }
                (AttributeKind::External(validator), Some(_)) => {
                    errors.add(path, format!("must be an object for {}", validator.name()));
                }
                (AttributeKind::Array(element), Some(Value::Array(items))) => {
                    self.evaluate_elements(element, items, &path, depth, errors);
                }
                (AttributeKind::Array(_), Some(_)) => {
                    errors.add(path, "must be an array");
                }
            }
        }
    }

    fn evaluate_elements(
        &self,
        element: &ElementKind,
        items: &[Value],
        path: &str,
        depth: usize,
        errors: &mut ErrorAggregator,
    ) {
        if let Some(max) = self.options.max_array_length {
            if items.len() > max {
                trace!(path, len = items.len(), max, "array too long, skipping elements");
                let unit = if max == 1 { "element" } else { "elements" };
                errors.add(path, format!("is too long (maximum is {} {})", max, unit));
                return;
            }
        }

        if let ElementKind::Scalar(ScalarType::Any) = element {
            return;
        }

        for (index, item) in items.iter().enumerate() {
            let item_path = format!("{}[{}]", path, index);
            match (element, item) {
                (ElementKind::Nested(sub), Value::Object(obj)) => {
                    self.descend(sub, obj, &item_path, depth, errors);
                }
                (ElementKind::External(validator), Value::Object(obj)) => {
                    self.delegate(validator, obj, &item_path, depth, errors);
                }
                (ElementKind::Scalar(ty), item) => {
                    if let Err(reason) = ty.coerce(item) {
                        errors.add(item_path, format!("is invalid: {}", reason));
                    }
                }
                (_, _) => {
                    errors.add(item_path, "must be an object");
                }
            }
        }
    }

    fn descend(
        &self,
        schema: &Schema,
        obj: &Map<String, Value>,
        path: &str,
        depth: usize,
        errors: &mut ErrorAggregator,
    ) {
        if self.within_depth(path, depth, errors) {
            self.evaluate_level(schema, obj, path, depth + 1, errors);
        }
    }

    fn delegate(
        &self,
        validator: &ValidatorRef,
        obj: &Map<String, Value>,
        path: &str,
        depth: usize,
        errors: &mut ErrorAggregator,
    ) {
        if !self.within_depth(path, depth, errors) {
            return;
        }
        let context = EvaluationContext {
            evaluator: self,
            depth: depth + 1,
        };
        for failure in validator.validate(obj, context) {
            errors.add(join(path, &failure.path), failure.message);
        }
    }

    fn within_depth(&self, path: &str, depth: usize, errors: &mut ErrorAggregator) -> bool {
        if depth < self.options.max_depth {
            return true;
        }
        trace!(path, depth, "maximum depth reached, skipping branch");
        errors.add(
            path,
            format!("is nested too deeply (maximum depth is {})", self.options.max_depth),
        );
        false
    }
}

/// Validate with default options
pub fn validate(schema: &Schema, value: &Value) -> ValidationReport {
    Evaluator::default().validate(schema, value)
}

/// Validate a typed value with default options
pub fn validate_serializable<T: Serialize>(schema: &Schema, value: &T) -> Result<ValidationReport> {
    Evaluator::default().validate_serializable(schema, value)
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

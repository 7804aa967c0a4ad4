//! Schema types and the declaration builder
//!
//! A [`Schema`] is one level of expected structure: an ordered list of
//! attribute descriptors plus the rules bound to them. Nested levels are
//! owned sub-schemas, so a whole tree is built once and then only read.

use std::fmt;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde_json::{Map, Value};
use tracing::debug;

use crate::checks::{Check, RuleOptions};
use crate::coerce::ScalarType;
use crate::error::{Result, SchemaError};
use crate::external::ValidatorRef;

/// What kind of value an attribute holds
#[derive(Debug, Clone)]
pub enum AttributeKind {
    Scalar(ScalarType),
    /// Inline sub-schema declared with a nested block
    Nested(Box<Schema>),
    /// Independently declared validator
    External(ValidatorRef),
    Array(ElementKind),
}

/// Kind of the elements of an array attribute
#[derive(Debug, Clone)]
pub enum ElementKind {
    /// No per-element recursion; only coerced when the type is not `Any`
    Scalar(ScalarType),
    Nested(Box<Schema>),
    External(ValidatorRef),
}

/// The type argument of an attribute declaration
#[derive(Debug, Clone)]
pub enum KindSpec {
    Scalar(ScalarType),
    Validator(ValidatorRef),
    /// The array marker; element kind comes from options or a nested block
    Array,
}

impl From<ScalarType> for KindSpec {
    fn from(ty: ScalarType) -> Self {
        KindSpec::Scalar(ty)
    }
}

impl From<ValidatorRef> for KindSpec {
    fn from(validator: ValidatorRef) -> Self {
        KindSpec::Validator(validator)
    }
}

/// Auxiliary attribute configuration
#[derive(Debug, Clone, Default)]
pub struct AttributeOptions {
    /// Substituted when the key is missing (not when it is null)
    pub default: Option<Value>,
    /// Validator for each element of an array attribute
    pub element_validator: Option<ValidatorRef>,
    /// Scalar type for each element of an array attribute
    pub element_type: Option<ScalarType>,
    /// Anything else; carried but not interpreted
    pub extra: Map<String, Value>,
}

impl AttributeOptions {
    pub fn with_default(value: Value) -> Self {
        Self {
            default: Some(value),
            ..Default::default()
        }
    }

    pub fn element_validator(validator: ValidatorRef) -> Self {
        Self {
            element_validator: Some(validator),
            ..Default::default()
        }
    }

    pub fn element_type(ty: ScalarType) -> Self {
        Self {
            element_type: Some(ty),
            ..Default::default()
        }
    }
}

/// One declared attribute
#[derive(Debug, Clone)]
pub struct AttributeDescriptor {
    pub name: String,
    pub kind: AttributeKind,
    pub options: AttributeOptions,
}

/// A set of checks bound to one or more attributes of the same level
#[derive(Debug, Clone)]
pub struct ValidationRule {
    pub attribute_names: Vec<String>,
    pub options: RuleOptions,
    checks: Vec<Check>,
}

impl ValidationRule {
    pub fn applies_to(&self, name: &str) -> bool {
        self.attribute_names.iter().any(|n| n == name)
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }
}

/// An immutable, fully resolved schema level
#[derive(Debug, Clone, Default)]
pub struct Schema {
    attributes: Vec<AttributeDescriptor>,
    rules: Vec<ValidationRule>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Attributes in declaration order
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    /// Rules bound to `name`, in declaration order
    pub fn rules_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ValidationRule> + 'a {
        self.rules.iter().filter(move |r| r.applies_to(name))
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.attributes.iter().map(|a| a.name.as_str()).collect();
        write!(f, "Schema({})", names.join(", "))
    }
}

/// Declaration surface for a [`Schema`].
///
/// Builders are consumed by [`build`](SchemaBuilder::build), so a finished
/// schema cannot be extended. Declaration mistakes are remembered and
/// reported by `build`, which keeps the chained style readable:
///
/// ```
/// use param_schemas::{Schema, ScalarType, RuleOptions};
///
/// let schema = Schema::builder()
///     .attribute("customer_name", ScalarType::String)
///     .nested("address", |b| {
///         b.attribute("city", ScalarType::String)
///             .rule(["city"], RuleOptions::presence())
///     })
///     .rule(["customer_name"], RuleOptions::presence())
///     .build()
///     .unwrap();
/// assert_eq!(schema.attributes().len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    attributes: Vec<AttributeDescriptor>,
    rules: Vec<ValidationRule>,
    error: Option<SchemaError>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a scalar, validator-backed or array attribute
    pub fn attribute(self, name: impl Into<String>, kind: impl Into<KindSpec>) -> Self {
        self.declare(name, kind.into(), AttributeOptions::default(), None)
    }

    pub fn attribute_with(
        self,
        name: impl Into<String>,
        kind: impl Into<KindSpec>,
        options: AttributeOptions,
    ) -> Self {
        self.declare(name, kind.into(), options, None)
    }

    /// Declare an object attribute whose structure is given by `block`
    pub fn nested<F>(self, name: impl Into<String>, block: F) -> Self
    where
        F: FnOnce(SchemaBuilder) -> SchemaBuilder,
    {
        let name = name.into();
        let sub = block(SchemaBuilder::new()).build_nested(&name);
        self.declare_block(name, KindSpec::Scalar(ScalarType::Any), AttributeOptions::default(), sub)
    }

    /// Declare an array attribute; elements come from `options`
    pub fn array(self, name: impl Into<String>, options: AttributeOptions) -> Self {
        self.declare(name, KindSpec::Array, options, None)
    }

    /// Declare an array of objects whose structure is given by `block`
    pub fn array_of<F>(self, name: impl Into<String>, block: F) -> Self
    where
        F: FnOnce(SchemaBuilder) -> SchemaBuilder,
    {
        let name = name.into();
        let sub = block(SchemaBuilder::new()).build_nested(&name);
        self.declare_block(name, KindSpec::Array, AttributeOptions::default(), sub)
    }

    /// The general form of every declaration.
    ///
    /// `nested` is an already built sub-schema standing in for a nested
    /// block. Redeclaring a name replaces the earlier descriptor in place.
    pub fn declare(
        mut self,
        name: impl Into<String>,
        kind: KindSpec,
        options: AttributeOptions,
        nested: Option<Schema>,
    ) -> Self {
        let name = name.into();
        match resolve_kind(&name, kind, &options, nested) {
            Ok(kind) => self.insert(AttributeDescriptor {
                name,
                kind,
                options,
            }),
            Err(err) => self.fail(err),
        }
        self
    }

    /// Bind checks to one or more attributes of this level.
    ///
    /// Names are checked against the declared attributes at build time, so
    /// rules may appear before the attributes they mention.
    pub fn rule<I, S>(mut self, names: I, options: RuleOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let attribute_names: Vec<String> = names.into_iter().map(Into::into).collect();
        let context = attribute_names.join(", ");

        if attribute_names.is_empty() {
            self.fail(SchemaError::definition("<rule>", "rule needs at least one attribute"));
            return self;
        }

        match options.compile(&context) {
            Ok(checks) => self.rules.push(ValidationRule {
                attribute_names,
                options,
                checks,
            }),
            Err(err) => self.fail(err),
        }
        self
    }

    /// Finish the schema, reporting the first declaration error
    pub fn build(self) -> Result<Schema> {
        if let Some(err) = self.error {
            return Err(err);
        }

        for rule in &self.rules {
            for name in &rule.attribute_names {
                if !self.attributes.iter().any(|a| &a.name == name) {
                    return Err(SchemaError::UnknownAttribute {
                        name: name.clone(),
                        suggestion: suggest(name, &self.attributes),
                    });
                }
            }
        }

        debug!(
            attributes = self.attributes.len(),
            rules = self.rules.len(),
            "built schema"
        );

        Ok(Schema {
            attributes: self.attributes,
            rules: self.rules,
        })
    }

    fn build_nested(self, parent: &str) -> Result<Schema> {
        self.build().map_err(|err| err.within(parent))
    }

    fn declare_block(
        mut self,
        name: String,
        kind: KindSpec,
        options: AttributeOptions,
        sub: Result<Schema>,
    ) -> Self {
        match sub {
            Ok(schema) => self.declare(name, kind, options, Some(schema)),
            Err(err) => {
                self.fail(err);
                self
            }
        }
    }

    fn insert(&mut self, descriptor: AttributeDescriptor) {
        match self.attributes.iter_mut().find(|a| a.name == descriptor.name) {
            Some(existing) => {
                debug!(attribute = %descriptor.name, "redeclared attribute replaces earlier one");
                *existing = descriptor;
            }
            None => self.attributes.push(descriptor),
        }
    }

    fn fail(&mut self, err: SchemaError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

fn resolve_kind(
    name: &str,
    kind: KindSpec,
    options: &AttributeOptions,
    nested: Option<Schema>,
) -> Result<AttributeKind> {
    if name.is_empty() {
        return Err(SchemaError::definition(name, "attribute name cannot be empty"));
    }

    let is_array = matches!(kind, KindSpec::Array);
    if !is_array && (options.element_validator.is_some() || options.element_type.is_some()) {
        return Err(SchemaError::definition(
            name,
            "element options are only valid on array attributes",
        ));
    }

    match (kind, nested) {
        (KindSpec::Validator(_), Some(_)) => Err(SchemaError::definition(
            name,
            "an attribute cannot have both a validator and a nested block",
        )),
        (KindSpec::Validator(validator), None) => Ok(AttributeKind::External(validator)),
        (KindSpec::Scalar(_), Some(sub)) => Ok(AttributeKind::Nested(Box::new(sub))),
        (KindSpec::Scalar(ty), None) => Ok(AttributeKind::Scalar(ty)),
        (KindSpec::Array, nested) => {
            let element = match (nested, &options.element_validator, options.element_type) {
                (Some(_), Some(_), _) | (None, Some(_), Some(_)) | (Some(_), None, Some(_)) => {
                    return Err(SchemaError::definition(
                        name,
                        "an array takes exactly one element kind",
                    ))
                }
                (Some(sub), None, None) => ElementKind::Nested(Box::new(sub)),
                (None, Some(validator), None) => ElementKind::External(validator.clone()),
                (None, None, ty) => ElementKind::Scalar(ty.unwrap_or(ScalarType::Any)),
            };
            Ok(AttributeKind::Array(element))
        }
    }
}

fn suggest(name: &str, attributes: &[AttributeDescriptor]) -> Option<String> {
    let matcher = SkimMatcherV2::default();
    attributes
        .iter()
        .filter_map(|a| {
            matcher
                .fuzzy_match(&a.name, name)
                .or_else(|| matcher.fuzzy_match(name, &a.name))
                .map(|score| (score, &a.name))
        })
        .max_by_key(|(score, _)| *score)
        .map(|(_, n)| n.clone())
}

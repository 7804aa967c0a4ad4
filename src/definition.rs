//! Schema declaration documents
//!
//! Schemas can be declared as data instead of code. A document lists named
//! validators (reusable, referenced by name from attribute `type`s) and
//! actions (the schemas that get registered).
//!
//! ## Example (params.toml style)
//! ```toml
//! [[validators]]
//! name = "AddressValidator"
//! attributes = [
//!     { name = "street", type = "string" },
//!     { name = "city", type = "string" },
//! ]
//! rules = [{ attributes = ["street", "city"], presence = true }]
//!
//! [[actions]]
//! name = "nested_create"
//! attributes = [
//!     { name = "order_id", type = "integer" },
//!     { name = "address", type = "AddressValidator" },
//! ]
//! rules = [{ attributes = ["order_id"], presence = true }]
//! ```
//!
//! Validators are resolved in document order, so a validator can only refer
//! to the ones declared above it.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::checks::RuleOptions;
use crate::coerce::ScalarType;
use crate::error::{Result, SchemaError};
use crate::external::{SchemaValidator, ValidatorRef};
use crate::schema::{AttributeOptions, KindSpec, Schema, SchemaBuilder};

/// A whole declaration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    #[serde(default)]
    pub validators: Vec<NamedSchemaSpec>,
    #[serde(default)]
    pub actions: Vec<NamedSchemaSpec>,
}

/// A validator or action declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamedSchemaSpec {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeSpec {
    pub name: String,
    /// Scalar tag, `array`, `object`, or the name of a validator
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_validator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<ScalarType>,
    /// Nested block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<AttributeSpec>>,
    /// Rules of the nested block
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub attributes: Vec<String>,
    #[serde(flatten)]
    pub options: RuleOptions,
}

impl SchemaDocument {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Read a `.toml` or `.json` document
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let document = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content)?,
            Some("json") => Self::from_json_str(&content)?,
            _ => return Err(SchemaError::UnsupportedFormat(path.display().to_string())),
        };

        debug!(
            path = %path.display(),
            validators = document.validators.len(),
            actions = document.actions.len(),
            "loaded schema document"
        );
        Ok(document)
    }

    /// Build every action schema, in document order
    pub fn build(&self) -> Result<Vec<(String, Schema)>> {
        let mut validators: HashMap<String, ValidatorRef> = HashMap::new();

        for spec in &self.validators {
            if validators.contains_key(&spec.name) {
                return Err(SchemaError::definition(&spec.name, "validator declared twice"));
            }
            let schema = build_level(&spec.attributes, &spec.rules, &validators)
                .map_err(|err| err.within(&spec.name))?;
            let validator = SchemaValidator::new(spec.name.clone(), schema);
            validators.insert(spec.name.clone(), validator.shared());
        }

        self.actions
            .iter()
            .map(|spec| {
                let schema = build_level(&spec.attributes, &spec.rules, &validators)
                    .map_err(|err| err.within(&spec.name))?;
                Ok((spec.name.clone(), schema))
            })
            .collect()
    }
}

fn build_level(
    attributes: &[AttributeSpec],
    rules: &[RuleSpec],
    validators: &HashMap<String, ValidatorRef>,
) -> Result<Schema> {
    let mut builder = Schema::builder();
    for attribute in attributes {
        builder = attribute.declare(builder, validators)?;
    }
    for rule in rules {
        builder = builder.rule(rule.attributes.iter().cloned(), rule.options.clone());
    }
    builder.build()
}

impl AttributeSpec {
    fn declare(
        &self,
        builder: SchemaBuilder,
        validators: &HashMap<String, ValidatorRef>,
    ) -> Result<SchemaBuilder> {
        let nested = match &self.attributes {
            Some(attributes) => Some(
                build_level(attributes, &self.rules, validators).map_err(|err| err.within(&self.name))?,
            ),
            None if !self.rules.is_empty() => {
                return Err(SchemaError::definition(
                    &self.name,
                    "rules on an attribute need a nested block of attributes",
                ))
            }
            None => None,
        };

        let kind = match self.kind.as_deref() {
            None if nested.is_some() => KindSpec::Scalar(ScalarType::Any),
            None => KindSpec::Scalar(ScalarType::String),
            Some("array") => KindSpec::Array,
            Some("object") if nested.is_some() => KindSpec::Scalar(ScalarType::Any),
            Some("object") => {
                return Err(SchemaError::definition(
                    &self.name,
                    "object attributes need a nested block of attributes",
                ))
            }
            Some(tag) => match tag.parse::<ScalarType>() {
                Ok(ty) => KindSpec::Scalar(ty),
                Err(_) => KindSpec::Validator(lookup(validators, tag)?),
            },
        };

        let element_validator = self
            .element_validator
            .as_deref()
            .map(|name| lookup(validators, name))
            .transpose()?;

        let options = AttributeOptions {
            default: self.default.clone(),
            element_validator,
            element_type: self.element_type,
            extra: Map::new(),
        };

        Ok(builder.declare(self.name.clone(), kind, options, nested))
    }
}

fn lookup(validators: &HashMap<String, ValidatorRef>, name: &str) -> Result<ValidatorRef> {
    validators
        .get(name)
        .cloned()
        .ok_or_else(|| SchemaError::UnknownValidator(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::validate;
    use crate::schema::{AttributeKind, ElementKind};
    use serde_json::json;

    const ORDERS: &str = r#"
[[validators]]
name = "ItemValidator"
attributes = [
    { name = "name", type = "string" },
    { name = "quantity", type = "integer" },
]
rules = [
    { attributes = ["name"], presence = true },
    { attributes = ["quantity"], numericality = { only_integer = true, greater_than = 0 } },
]

[[actions]]
name = "array_create"
attributes = [
    { name = "items", type = "array", element_validator = "ItemValidator" },
]
"#;

    #[test]
    fn test_build_from_toml() {
        let document = SchemaDocument::from_toml_str(ORDERS).unwrap();
        let schemas = document.build().unwrap();
        assert_eq!(schemas.len(), 1);

        let (action, schema) = &schemas[0];
        assert_eq!(action, "array_create");
        assert!(matches!(
            schema.attribute("items").unwrap().kind,
            AttributeKind::Array(ElementKind::External(_))
        ));

        let report = validate(
            schema,
            &json!({"items": [{"name": "", "quantity": 2}, {"name": "Item 2", "quantity": 0}]}),
        );
        assert_eq!(
            report.display_messages(),
            vec![
                "Items[0].name can't be blank",
                "Items[1].quantity must be greater than 0"
            ]
        );
    }

    #[test]
    fn test_nested_block_from_json() {
        let document = SchemaDocument::from_json_str(
            r#"{
                "actions": [{
                    "name": "profile_update",
                    "attributes": [{
                        "name": "profile",
                        "attributes": [{ "name": "nick_name" }],
                        "rules": [{ "attributes": ["nick_name"], "length": { "maximum": 3 } }]
                    }]
                }]
            }"#,
        )
        .unwrap();
        let schemas = document.build().unwrap();

        let report = validate(&schemas[0].1, &json!({"profile": {"nick_name": "abcd"}}));
        assert_eq!(
            report.display_messages(),
            vec!["Profile.nick name is too long (maximum is 3 characters)"]
        );
    }

    #[test]
    fn test_unknown_validator() {
        let document = SchemaDocument::from_toml_str(
            r#"
[[actions]]
name = "create"
attributes = [{ name = "address", type = "AddressValidator" }]
"#,
        )
        .unwrap();
        let err = document.build().unwrap_err();
        assert!(matches!(err, SchemaError::UnknownValidator(name) if name == "AddressValidator"));
    }

    #[test]
    fn test_validators_resolve_in_order() {
        let document = SchemaDocument::from_toml_str(
            r#"
[[validators]]
name = "Outer"
attributes = [{ name = "inner", type = "Inner" }]

[[validators]]
name = "Inner"
attributes = [{ name = "value" }]
"#,
        )
        .unwrap();
        assert!(document.build().is_err());
    }

    #[test]
    fn test_unknown_rule_option_is_rejected() {
        let document = SchemaDocument::from_toml_str(
            r#"
[[actions]]
name = "create"
attributes = [{ name = "email" }]
rules = [{ attributes = ["email"], uniqueness = true }]
"#,
        )
        .unwrap();
        let err = document.build().unwrap_err();
        assert!(err.to_string().contains("uniqueness"), "{}", err);
    }

    #[test]
    fn test_default_type_is_string() {
        let document = SchemaDocument::from_toml_str(
            r#"
[[actions]]
name = "create"
attributes = [{ name = "title", default = "untitled" }]
"#,
        )
        .unwrap();
        let schemas = document.build().unwrap();
        let attribute = schemas[0].1.attribute("title").unwrap();
        assert!(matches!(attribute.kind, AttributeKind::Scalar(ScalarType::String)));
        assert_eq!(attribute.options.default, Some(json!("untitled")));
    }
}

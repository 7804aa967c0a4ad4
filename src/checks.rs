//! Built-in attribute checks
//!
//! [`RuleOptions`] is the declaration-side description of a rule (what the
//! schema author writes, also deserializable from TOML/JSON). It compiles
//! into a list of [`Check`]s, which are run against one attribute value at a
//! time and produce plain messages such as `"can't be blank"`.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::coerce::as_text;
use crate::error::{Result, SchemaError};

/// Pattern for the usual `format: { with: email }` rule
pub const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$";

/// Options of one `rule(names..., options)` declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleOptions {
    #[serde(default, skip_serializing_if = "is_false")]
    pub presence: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FormatOptions>,

    #[serde(
        default,
        deserialize_with = "flag_or_options",
        skip_serializing_if = "Option::is_none"
    )]
    pub numericality: Option<NumericalityOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<LengthOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion: Option<MembershipOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusion: Option<MembershipOptions>,

    /// Keys nobody recognised; rejected when the rule is compiled
    #[serde(flatten, default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unknown: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatOptions {
    /// Value must match this pattern
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with: Option<String>,
    /// Value must not match this pattern
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub without: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericalityOptions {
    #[serde(default, skip_serializing_if = "is_false")]
    pub only_integer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greater_than: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greater_than_or_equal_to: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equal_to: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_than: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_than_or_equal_to: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_than: Option<f64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub odd: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub even: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LengthOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MembershipOptions {
    #[serde(rename = "in")]
    pub values: Vec<Value>,
}

impl NumericalityOptions {
    /// Every comparison bound with its option name
    fn bounds(&self) -> [(&'static str, Option<f64>); 6] {
        [
            ("greater_than", self.greater_than),
            ("greater_than_or_equal_to", self.greater_than_or_equal_to),
            ("equal_to", self.equal_to),
            ("less_than", self.less_than),
            ("less_than_or_equal_to", self.less_than_or_equal_to),
            ("other_than", self.other_than),
        ]
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Accept `numericality = true` as shorthand for an empty options table
fn flag_or_options<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlagOr<T> {
        Flag(bool),
        Options(T),
    }

    Ok(match Option::<FlagOr<T>>::deserialize(deserializer)? {
        None | Some(FlagOr::Flag(false)) => None,
        Some(FlagOr::Flag(true)) => Some(T::default()),
        Some(FlagOr::Options(options)) => Some(options),
    })
}

impl RuleOptions {
    pub fn presence() -> Self {
        Self {
            presence: true,
            ..Default::default()
        }
    }

    pub fn format(pattern: impl Into<String>) -> Self {
        Self {
            format: Some(FormatOptions {
                with: Some(pattern.into()),
                without: None,
            }),
            ..Default::default()
        }
    }

    pub fn numericality(options: NumericalityOptions) -> Self {
        Self {
            numericality: Some(options),
            ..Default::default()
        }
    }

    pub fn length(options: LengthOptions) -> Self {
        Self {
            length: Some(options),
            ..Default::default()
        }
    }

    pub fn inclusion(values: Vec<Value>) -> Self {
        Self {
            inclusion: Some(MembershipOptions { values }),
            ..Default::default()
        }
    }

    pub fn exclusion(values: Vec<Value>) -> Self {
        Self {
            exclusion: Some(MembershipOptions { values }),
            ..Default::default()
        }
    }

    /// Add presence to an existing set of options
    pub fn and_presence(mut self) -> Self {
        self.presence = true;
        self
    }

    /// Parse options written as untyped data, e.g. `{"presence": true}`
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Compile into checks, in a fixed order: presence, length, format,
    /// inclusion, exclusion, numericality.
    ///
    /// `context` names the rule's attributes for error messages.
    pub fn compile(&self, context: &str) -> Result<Vec<Check>> {
        if let Some(key) = self.unknown.keys().next() {
            return Err(SchemaError::definition(
                context,
                format!("unknown validation option '{}'", key),
            ));
        }

        let mut checks = Vec::new();

        if self.presence {
            checks.push(Check::Presence);
        }

        if let Some(length) = &self.length {
            if length.minimum.is_none() && length.maximum.is_none() && length.is.is_none() {
                return Err(SchemaError::definition(
                    context,
                    "length requires one of minimum, maximum or is",
                ));
            }
            if let (Some(minimum), Some(maximum)) = (length.minimum, length.maximum) {
                if minimum > maximum {
                    return Err(SchemaError::definition(
                        context,
                        format!("length minimum {} exceeds maximum {}", minimum, maximum),
                    ));
                }
            }
            checks.push(Check::Length(length.clone()));
        }

        if let Some(format) = &self.format {
            match (&format.with, &format.without) {
                (Some(pattern), None) => checks.push(Check::Format {
                    pattern: compile_pattern(pattern)?,
                    must_match: true,
                }),
                (None, Some(pattern)) => checks.push(Check::Format {
                    pattern: compile_pattern(pattern)?,
                    must_match: false,
                }),
                _ => {
                    return Err(SchemaError::definition(
                        context,
                        "format requires exactly one of 'with' or 'without'",
                    ))
                }
            }
        }

        if let Some(inclusion) = &self.inclusion {
            checks.push(Check::Inclusion(inclusion.values.clone()));
        }

        if let Some(exclusion) = &self.exclusion {
            checks.push(Check::Exclusion(exclusion.values.clone()));
        }

        if let Some(numericality) = &self.numericality {
            if let Some((name, bound)) = numericality
                .bounds()
                .into_iter()
                .find_map(|(name, bound)| bound.filter(|b| !b.is_finite()).map(|b| (name, b)))
            {
                return Err(SchemaError::definition(
                    context,
                    format!("numericality {} must be a finite number, got {}", name, bound),
                ));
            }
            if numericality.odd && numericality.even {
                return Err(SchemaError::definition(
                    context,
                    "numericality cannot require both odd and even",
                ));
            }
            checks.push(Check::Numericality(numericality.clone()));
        }

        if checks.is_empty() {
            return Err(SchemaError::definition(context, "rule declares no checks"));
        }

        Ok(checks)
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| SchemaError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// A compiled, ready-to-run check
#[derive(Debug, Clone)]
pub enum Check {
    Presence,
    Format { pattern: Regex, must_match: bool },
    Numericality(NumericalityOptions),
    Length(LengthOptions),
    Inclusion(Vec<Value>),
    Exclusion(Vec<Value>),
}

impl Check {
    /// Run against an attribute value (`None` when the key is missing).
    ///
    /// Everything except presence passes on a missing or null value.
    pub fn run(&self, value: Option<&Value>) -> Vec<String> {
        if let Check::Presence = self {
            return if is_blank(value) {
                vec!["can't be blank".to_string()]
            } else {
                Vec::new()
            };
        }

        let value = match value {
            None | Some(Value::Null) => return Vec::new(),
            Some(value) => value,
        };

        match self {
            Check::Presence => Vec::new(),
            Check::Format {
                pattern,
                must_match,
            } => {
                let matched = as_text(value).is_some_and(|s| pattern.is_match(&s));
                // Non-scalars can never satisfy a format
                let ok = as_text(value).is_some() && matched == *must_match;
                if ok {
                    Vec::new()
                } else {
                    vec!["is invalid".to_string()]
                }
            }
            Check::Numericality(options) => numericality(options, value),
            Check::Length(options) => length(options, value),
            Check::Inclusion(values) => {
                if values.contains(value) {
                    Vec::new()
                } else {
                    vec!["is not included in the list".to_string()]
                }
            }
            Check::Exclusion(values) => {
                if values.contains(value) {
                    vec!["is reserved".to_string()]
                } else {
                    Vec::new()
                }
            }
        }
    }
}

/// Missing, null, whitespace-only strings and empty collections are blank
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(_) => false,
    }
}

struct Numeric {
    value: f64,
    integer: bool,
}

fn parse_numeric(value: &Value) -> Option<Numeric> {
    match value {
        Value::Number(n) => Some(Numeric {
            value: n.as_f64()?,
            integer: n.is_i64() || n.is_u64(),
        }),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(Numeric {
                    value: i as f64,
                    integer: true,
                });
            }
            s.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|value| Numeric {
                    value,
                    integer: false,
                })
        }
        _ => None,
    }
}

/// Render a bound the way it was most likely written (`0`, not `0.0`)
fn display_bound(bound: f64) -> String {
    debug_assert!(bound.is_finite(), "non-finite bounds are rejected at compile time");
    if bound.fract() == 0.0 && bound.abs() < 1e15 {
        format!("{}", bound as i64)
    } else {
        format!("{}", bound)
    }
}

fn numericality(options: &NumericalityOptions, value: &Value) -> Vec<String> {
    let Some(number) = parse_numeric(value) else {
        return vec!["is not a number".to_string()];
    };

    if options.only_integer && !number.integer {
        return vec!["must be an integer".to_string()];
    }

    let n = number.value;
    let bounds: [(Option<f64>, fn(f64, f64) -> bool, &str); 6] = [
        (options.greater_than, |n, b| n > b, "must be greater than"),
        (
            options.greater_than_or_equal_to,
            |n, b| n >= b,
            "must be greater than or equal to",
        ),
        (options.equal_to, |n, b| n == b, "must be equal to"),
        (options.less_than, |n, b| n < b, "must be less than"),
        (
            options.less_than_or_equal_to,
            |n, b| n <= b,
            "must be less than or equal to",
        ),
        (options.other_than, |n, b| n != b, "must be other than"),
    ];

    let mut messages: Vec<String> = bounds
        .iter()
        .filter_map(|(bound, holds, message)| {
            let bound = (*bound)?;
            (!holds(n, bound)).then(|| format!("{} {}", message, display_bound(bound)))
        })
        .collect();

    let truncated = n.trunc() as i64;
    if options.odd && truncated % 2 == 0 {
        messages.push("must be odd".to_string());
    }
    if options.even && truncated % 2 != 0 {
        messages.push("must be even".to_string());
    }

    messages
}

fn characters(count: usize) -> &'static str {
    if count == 1 {
        "character"
    } else {
        "characters"
    }
}

fn length(options: &LengthOptions, value: &Value) -> Vec<String> {
    let actual = match value {
        Value::String(s) => s.chars().count(),
        Value::Array(a) => a.len(),
        other => match as_text(other) {
            Some(s) => s.chars().count(),
            None => return Vec::new(),
        },
    };

    let mut messages = Vec::new();

    if let Some(is) = options.is {
        if actual != is {
            messages.push(format!(
                "is the wrong length (should be {} {})",
                is,
                characters(is)
            ));
        }
    }
    if let Some(minimum) = options.minimum {
        if actual < minimum {
            messages.push(format!(
                "is too short (minimum is {} {})",
                minimum,
                characters(minimum)
            ));
        }
    }
    if let Some(maximum) = options.maximum {
        if actual > maximum {
            messages.push(format!(
                "is too long (maximum is {} {})",
                maximum,
                characters(maximum)
            ));
        }
    }

    messages
}

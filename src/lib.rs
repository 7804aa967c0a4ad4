//! Param Schemas
//!
//! Declarative, recursive validation of untyped request parameters before
//! they reach business logic.
//!
//! ## Features
//!
//! - **Four attribute kinds**: scalars, nested blocks, external validators,
//!   and arrays of any of them
//! - **Exact paths**: errors are located as `items[0].name`, `address.city`
//! - **Built once, read forever**: schemas are immutable and shareable across
//!   threads without locking
//! - **Total evaluation**: validation never fails, it returns a report
//! - **Declarations as data**: schemas can be loaded from TOML or JSON
//!
//! ## Architecture
//!
//! ```text
//! SchemaBuilder ──build()──▶ Schema ──register──▶ SchemaRegistry
//!                                                     │
//!                      payload ──▶ Evaluator ◀────────┘
//!                                     │
//!                              ErrorAggregator ──▶ ValidationReport
//!                                                     │
//!                                          render(json | plain)
//! ```
//!
//! ## Example
//!
//! ```
//! use param_schemas::{validate, RuleOptions, ScalarType, Schema, EMAIL_PATTERN};
//! use serde_json::json;
//!
//! let schema = Schema::builder()
//!     .attribute("customer_name", ScalarType::String)
//!     .attribute("email", ScalarType::String)
//!     .rule(["customer_name", "email"], RuleOptions::presence())
//!     .rule(["email"], RuleOptions::format(EMAIL_PATTERN))
//!     .build()
//!     .unwrap();
//!
//! let report = validate(&schema, &json!({"customer_name": "", "email": "invalid-email"}));
//! assert!(!report.valid);
//! assert_eq!(
//!     report.display_messages(),
//!     vec!["Customer name can't be blank", "Email is invalid"]
//! );
//! ```

pub mod checks;
pub mod coerce;
pub mod config;
pub mod definition;
pub mod error;
pub mod evaluator;
pub mod external;
pub mod registry;
pub mod report;
pub mod schema;

pub use checks::{
    FormatOptions, LengthOptions, MembershipOptions, NumericalityOptions, RuleOptions,
    EMAIL_PATTERN,
};
pub use coerce::ScalarType;
pub use config::EngineConfig;
pub use definition::SchemaDocument;
pub use error::{Result, SchemaError};
pub use evaluator::{
    validate, validate_serializable, EvaluationContext, EvaluationOptions, Evaluator,
};
pub use external::{ExternalValidator, SchemaValidator, ValidatorRef};
pub use registry::SchemaRegistry;
pub use report::{
    display_message, humanize, ErrorAggregator, ErrorResponse, ResponseFormat, StructuredError,
    ValidationReport, UNPROCESSABLE_ENTITY,
};
pub use schema::{
    AttributeDescriptor, AttributeKind, AttributeOptions, ElementKind, KindSpec, Schema,
    SchemaBuilder, ValidationRule,
};

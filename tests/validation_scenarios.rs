//! End-to-end validation scenarios
//!
//! Orders API schemas declared in code: a flat form, an order with an
//! external address validator, and an order with an array of items.

use param_schemas::{
    humanize, validate, AttributeOptions, ErrorAggregator, Evaluator, NumericalityOptions,
    ResponseFormat, RuleOptions, ScalarType, Schema, SchemaValidator, StructuredError,
    ValidatorRef, EMAIL_PATTERN, UNPROCESSABLE_ENTITY,
};
use serde_json::{json, Value};

fn basic_schema() -> Schema {
    Schema::builder()
        .attribute("customer_name", ScalarType::String)
        .attribute("email", ScalarType::String)
        .rule(["customer_name", "email"], RuleOptions::presence())
        .rule(["email"], RuleOptions::format(EMAIL_PATTERN))
        .build()
        .unwrap()
}

fn address_validator() -> ValidatorRef {
    let schema = Schema::builder()
        .attribute("street", ScalarType::String)
        .attribute("city", ScalarType::String)
        .rule(["street", "city"], RuleOptions::presence())
        .build()
        .unwrap();
    SchemaValidator::new("TestAddressValidator", schema).shared()
}

fn nested_schema() -> Schema {
    Schema::builder()
        .attribute("order_id", ScalarType::Integer)
        .attribute("address", address_validator())
        .rule(["order_id"], RuleOptions::presence())
        .build()
        .unwrap()
}

fn item_validator() -> ValidatorRef {
    let schema = Schema::builder()
        .attribute("name", ScalarType::String)
        .attribute("quantity", ScalarType::Integer)
        .rule(["name"], RuleOptions::presence())
        .rule(
            ["quantity"],
            RuleOptions::numericality(NumericalityOptions {
                only_integer: true,
                greater_than: Some(0.0),
                ..Default::default()
            }),
        )
        .build()
        .unwrap();
    SchemaValidator::new("TestItemValidator", schema).shared()
}

fn array_schema() -> Schema {
    Schema::builder()
        .array("items", AttributeOptions::element_validator(item_validator()))
        .build()
        .unwrap()
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_flat_schema_reports_blank_and_invalid() {
    let report = validate(
        &basic_schema(),
        &json!({"customer_name": "", "email": "invalid-email"}),
    );

    assert!(!report.valid);
    let messages = report.display_messages();
    assert!(messages.contains(&"Customer name can't be blank".to_string()));
    assert!(messages.contains(&"Email is invalid".to_string()));
}

#[test]
fn test_external_validator_errors_are_prefixed() {
    let report = validate(
        &nested_schema(),
        &json!({"order_id": 123, "address": {"street": "", "city": ""}}),
    );

    assert!(!report.valid);
    assert_eq!(
        report.display_messages(),
        vec!["Address.street can't be blank", "Address.city can't be blank"]
    );
}

#[test]
fn test_array_elements_are_indexed() {
    let report = validate(
        &array_schema(),
        &json!({"items": [{"name": "", "quantity": 2}, {"name": "Item 2", "quantity": 0}]}),
    );

    assert!(!report.valid);
    assert_eq!(
        report.display_messages(),
        vec![
            "Items[0].name can't be blank",
            "Items[1].quantity must be greater than 0"
        ]
    );
}

#[test]
fn test_non_array_value_is_a_single_error() {
    let report = validate(&array_schema(), &json!({"items": "not an array"}));
    assert_eq!(report.display_messages(), vec!["Items must be an array"]);
}

#[test]
fn test_conforming_input_is_valid() {
    let cases = [
        (
            basic_schema(),
            json!({"customer_name": "Test User", "email": "test@example.com"}),
        ),
        (
            nested_schema(),
            json!({"order_id": 123, "address": {"street": "123 Main St", "city": "Anytown"}}),
        ),
        (
            array_schema(),
            json!({"items": [{"name": "Item 1", "quantity": 2}, {"name": "Item 2", "quantity": 1}]}),
        ),
    ];

    for (schema, input) in cases {
        let report = validate(&schema, &input);
        assert!(report.valid, "{:?}", report.errors);
        assert!(report.errors.is_empty());
    }
}

#[test]
fn test_non_object_elements_of_validator_array() {
    let report = validate(
        &array_schema(),
        &json!({"items": [5, {"name": "Item 1", "quantity": 1}, "x"]}),
    );
    assert_eq!(
        report.errors,
        vec![
            StructuredError::new("items[0]", "must be an object"),
            StructuredError::new("items[2]", "must be an object"),
        ]
    );
    assert_eq!(report.display_messages()[0], "Items[0] must be an object");
}

#[test]
fn test_evaluate_under_a_path_prefix() {
    let evaluator = Evaluator::default();
    let mut errors = ErrorAggregator::new();

    let payload = json!({"order_id": "", "address": {"street": "", "city": "Anytown"}});
    evaluator.evaluate(
        &nested_schema(),
        payload.as_object().unwrap(),
        "orders[3]",
        &mut errors,
    );

    assert_eq!(
        errors.errors(),
        &[
            StructuredError::new("orders[3].order_id", "can't be blank"),
            StructuredError::new("orders[3].address.street", "can't be blank"),
        ]
    );
    assert_eq!(
        errors.into_report().display_messages(),
        vec![
            "Orders[3].order id can't be blank",
            "Orders[3].address.street can't be blank"
        ]
    );
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn test_validation_is_idempotent() {
    let schema = array_schema();
    let input = json!({"items": [{"name": ""}, 5, {"quantity": "x"}]});

    let first = validate(&schema, &input);
    let second = validate(&schema, &input);
    assert_eq!(first, second);
}

#[test]
fn test_validation_is_total_over_odd_shapes() {
    let schemas = [basic_schema(), nested_schema(), array_schema()];
    let inputs = [
        Value::Null,
        json!(42),
        json!("string"),
        json!([1, 2, 3]),
        json!({}),
        json!({"customer_name": {"deep": [1, {"x": null}]}, "email": [], "order_id": [],
               "address": null, "items": [null, [], {"name": {"a": 1}, "quantity": [1]}]}),
    ];

    for schema in &schemas {
        for input in &inputs {
            let report = validate(schema, input);
            assert_eq!(report.valid, report.errors.is_empty());
        }
    }
}

#[test]
fn test_presence_law() {
    let schema = basic_schema();
    let blanks = [None, Some(Value::Null), Some(json!("")), Some(json!([])), Some(json!({}))];

    for blank in blanks {
        let mut input = json!({"email": "test@example.com"});
        if let Some(value) = blank.clone() {
            input["customer_name"] = value;
        }
        let report = validate(&schema, &input);
        assert!(
            report
                .errors
                .contains(&StructuredError::new("customer_name", "can't be blank")),
            "blank value {:?} not reported",
            blank
        );
    }
}

#[test]
fn test_type_mismatch_short_circuits_for_every_element_kind() {
    let nested_items = Schema::builder()
        .array_of("items", |b| {
            b.attribute("name", ScalarType::String)
                .rule(["name"], RuleOptions::presence())
        })
        .build()
        .unwrap();
    let typed_items = Schema::builder()
        .array("items", AttributeOptions::element_type(ScalarType::Integer))
        .build()
        .unwrap();

    for schema in [array_schema(), nested_items, typed_items] {
        for value in [json!("x"), json!(3), json!({"0": {"name": ""}})] {
            let report = validate(&schema, &json!({ "items": value }));
            assert_eq!(
                report.errors,
                vec![StructuredError::new("items", "must be an array")]
            );
        }
    }
}

#[test]
fn test_overlapping_rules_are_deduplicated() {
    let schema = Schema::builder()
        .attribute("email", ScalarType::String)
        .rule(["email"], RuleOptions::format(EMAIL_PATTERN).and_presence())
        .rule(["email"], RuleOptions::format(EMAIL_PATTERN))
        .build()
        .unwrap();

    let report = validate(&schema, &json!({"email": "nope"}));
    assert_eq!(report.errors, vec![StructuredError::new("email", "is invalid")]);
}

#[test]
fn test_humanization_keeps_dots_and_brackets() {
    for path in ["items[12].unit_price", "address.zip_code", "a_b.c_d[0].e_f"] {
        let human = humanize(path);
        assert_eq!(human.replace(' ', "_").to_lowercase(), path.to_lowercase());
        assert!(human.chars().next().unwrap().is_uppercase());
    }
}

#[test]
fn test_presence_on_absent_structures_stays_attribute_level() {
    let schema = Schema::builder()
        .attribute("address", address_validator())
        .array("items", AttributeOptions::element_validator(item_validator()))
        .rule(["address", "items"], RuleOptions::presence())
        .build()
        .unwrap();

    let report = validate(&schema, &json!({}));
    assert_eq!(
        report.display_messages(),
        vec!["Address can't be blank", "Items can't be blank"]
    );
}

#[test]
fn test_rendered_responses() {
    let report = validate(&array_schema(), &json!({"items": "not an array"}));

    let json_response = report
        .render(ResponseFormat::Json, UNPROCESSABLE_ENTITY)
        .unwrap();
    assert_eq!(json_response.status, 422);
    let body: Value = serde_json::from_str(&json_response.body).unwrap();
    assert_eq!(body["errors"], json!(["Items must be an array"]));

    let report = validate(
        &basic_schema(),
        &json!({"customer_name": "", "email": "invalid-email"}),
    );
    let plain = report
        .render(ResponseFormat::Plain, UNPROCESSABLE_ENTITY)
        .unwrap();
    assert_eq!(plain.body, "Customer name can't be blank, Email is invalid");
}

#[test]
fn test_schema_shared_across_threads() {
    let schema = std::sync::Arc::new(array_schema());

    std::thread::scope(|scope| {
        for i in 0..16 {
            let schema = std::sync::Arc::clone(&schema);
            scope.spawn(move || {
                let input = json!({"items": [{"name": format!("item {}", i), "quantity": i}]});
                let report = validate(&schema, &input);
                assert_eq!(report.valid, i > 0);
            });
        }
    });
}

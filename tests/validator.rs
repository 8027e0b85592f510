//! Validator synthesis: create/update/read acceptance derived from columns.

mod common;

use adminforge::validate::is_strict_timestamp;
use adminforge::ValidatorSet;
use serde_json::{json, Map, Value};

fn record(v: Value) -> Map<String, Value> {
    v.as_object().expect("object literal").clone()
}

fn products() -> ValidatorSet {
    ValidatorSet::synthesize(common::registry().get("products").unwrap())
}

fn orders() -> ValidatorSet {
    ValidatorSet::synthesize(common::registry().get("orders").unwrap())
}

fn users() -> ValidatorSet {
    ValidatorSet::synthesize(common::registry().get("users").unwrap())
}

#[test]
fn synthesis_is_deterministic() {
    let a = products();
    let b = products();
    let samples = [
        record(json!({"name": "Widget", "price": 9.99})),
        record(json!({"name": "Widget"})),
        record(json!({"price": "not a number", "name": "x"})),
        record(json!({})),
    ];
    for sample in &samples {
        assert_eq!(a.create.accepts(sample), b.create.accepts(sample));
        assert_eq!(a.update.accepts(sample), b.update.accepts(sample));
        for _ in 0..3 {
            assert_eq!(a.create.accepts(sample), a.create.accepts(sample));
        }
    }
}

#[test]
fn create_omits_generated_fields() {
    let v = products();
    // No id (auto-increment pk), no created_at (now default).
    let covered: Vec<&str> = v.create.field_names().collect();
    assert_eq!(covered, vec!["name", "price", "description", "in_stock"]);
    assert!(v.create.accepts(&record(json!({"name": "Widget", "price": 9.99}))));

    // A supplied id is dropped during normalization, never stored.
    let normalized = v
        .create
        .normalize(record(json!({"id": 999, "name": "Widget", "price": 9.99})));
    assert!(!normalized.contains_key("id"));
    assert!(!normalized.contains_key("created_at"));
    assert_eq!(normalized.get("name"), Some(&json!("Widget")));
}

#[test]
fn create_requires_fields_without_default_or_null() {
    let v = products();
    let errors = v.create.validate(&record(json!({"name": "Widget"}))).unwrap_err();
    assert!(errors.contains_key("price"));
    assert!(!errors.contains_key("description"));
    assert!(!errors.contains_key("in_stock"));
}

#[test]
fn nullable_columns_accept_null_on_create() {
    let v = products();
    assert!(v.create.accepts(&record(json!({
        "name": "Widget", "price": 1.5, "description": null
    }))));
    assert!(!v.create.accepts(&record(json!({
        "name": null, "price": 1.5
    }))));
}

#[test]
fn update_is_fully_partial() {
    assert!(products().update.accepts(&record(json!({}))));
    assert!(orders().update.accepts(&record(json!({}))));
    assert!(users().update.accepts(&record(json!({}))));
    // Present fields are still type-checked.
    assert!(!products().update.accepts(&record(json!({"price": "forty"}))));
}

#[test]
fn integer_columns_coerce_numeric_strings() {
    let v = orders();
    let base = json!({"product_id": 1, "user_id": "u1", "quantity": 2});
    assert!(v.create.accepts(&record(base.clone())));

    let mut with_string = record(base.clone());
    with_string.insert("quantity".into(), json!("42"));
    assert!(v.create.accepts(&with_string));
    let normalized = v.create.normalize(with_string);
    assert_eq!(normalized.get("quantity"), Some(&json!(42)));

    let mut bad = record(base);
    bad.insert("quantity".into(), json!("forty-two"));
    let errors = v.create.validate(&bad).unwrap_err();
    // The failure names the value as supplied, before coercion.
    assert!(errors["quantity"].contains("forty-two"));
}

#[test]
fn real_columns_accept_floats_and_numeric_strings() {
    let v = products();
    assert!(v.create.accepts(&record(json!({"name": "W", "price": "9.99"}))));
    assert!(!v.create.accepts(&record(json!({"name": "W", "price": ""}))));
}

#[test]
fn boolean_coercion_set_is_closed() {
    let v = products();
    for ok in [json!(true), json!(false), json!(1), json!(0), json!("true"), json!("false"), json!("1"), json!("0")] {
        let mut r = record(json!({"name": "W", "price": 1.0}));
        r.insert("in_stock".into(), ok.clone());
        assert!(v.create.accepts(&r), "expected {:?} to be accepted", ok);
    }
    for bad in [json!("yes"), json!("no"), json!(2), json!([true])] {
        let mut r = record(json!({"name": "W", "price": 1.0}));
        r.insert("in_stock".into(), bad.clone());
        assert!(!v.create.accepts(&r), "expected {:?} to be rejected", bad);
    }
}

#[test]
fn boolean_strings_normalize_to_bools() {
    let v = products();
    let normalized = v
        .create
        .normalize(record(json!({"name": "W", "price": 1.0, "in_stock": "1"})));
    assert_eq!(normalized.get("in_stock"), Some(&json!(true)));
}

#[test]
fn email_and_password_heuristics() {
    let v = users();
    assert!(v.create.accepts(&record(json!({
        "email": "a@example.com", "password": "longenough"
    }))));
    let errors = v
        .create
        .validate(&record(json!({"email": "not-an-email", "password": "short"})))
        .unwrap_err();
    assert!(errors.contains_key("email"));
    assert!(errors.contains_key("password"));
}

#[test]
fn datetime_accepts_offset_timestamps_and_plain_strings() {
    let v = products();
    // created_at is generated at insert, so it is ignored on create; the
    // read validator applies the datetime rule.
    assert!(is_strict_timestamp("2024-03-01T10:00:00+02:00"));
    assert!(!is_strict_timestamp("yesterday"));

    let full = record(json!({
        "id": 1, "name": "W", "price": 1.0, "description": null,
        "in_stock": true, "created_at": "yesterday"
    }));
    assert!(v.read.accepts(&full));

    let mut non_string = full.clone();
    non_string.insert("created_at".into(), json!(123));
    assert!(!v.read.accepts(&non_string));
}

#[test]
fn read_validator_checks_full_shape() {
    let v = products();
    let full = record(json!({
        "id": 1, "name": "W", "price": 1.0, "description": null,
        "in_stock": true, "created_at": "2024-01-01T00:00:00Z"
    }));
    assert!(v.read.accepts(&full));

    let mut missing = full.clone();
    missing.remove("name");
    assert!(!v.read.accepts(&missing));

    let mut null_in_non_nullable = full;
    null_in_non_nullable.insert("name".into(), Value::Null);
    assert!(!v.read.accepts(&null_in_non_nullable));
}

#[test]
fn unknown_fields_are_ignored_and_stripped() {
    let v = products();
    let r = record(json!({"name": "W", "price": 1.0, "bogus": "x"}));
    assert!(v.create.accepts(&r));
    assert!(!v.create.normalize(r).contains_key("bogus"));
}

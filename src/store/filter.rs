//! Field/operator/value filters shared by list queries, mutation guards, and
//! permission-condition checks.

use crate::permission::ConditionOp;
use crate::store::Record;
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Clone, Debug)]
pub struct Filter {
    pub field: String,
    pub op: ConditionOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: ConditionOp, value: Value) -> Self {
        Filter {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Filter::new(field, ConditionOp::Eq, value)
    }

    pub fn matches(&self, record: &Record) -> bool {
        value_matches(record.get(&self.field), self.op, &self.value)
    }
}

/// Compare two JSON scalars for ordering purposes. Numbers compare
/// numerically (string numerals are parsed), strings lexically.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x == y;
    }
    a == b
}

pub fn value_matches(actual: Option<&Value>, op: ConditionOp, expected: &Value) -> bool {
    let actual = match actual {
        Some(v) => v,
        None => return matches!(op, ConditionOp::Ne | ConditionOp::Nin),
    };
    match op {
        ConditionOp::Eq => loose_eq(actual, expected),
        ConditionOp::Ne => !loose_eq(actual, expected),
        ConditionOp::Gt => compare_values(actual, expected) == Some(Ordering::Greater),
        ConditionOp::Gte => matches!(
            compare_values(actual, expected),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        ),
        ConditionOp::Lt => compare_values(actual, expected) == Some(Ordering::Less),
        ConditionOp::Lte => matches!(
            compare_values(actual, expected),
            Some(Ordering::Less) | Some(Ordering::Equal)
        ),
        ConditionOp::In => expected
            .as_array()
            .map(|arr| arr.iter().any(|v| loose_eq(actual, v)))
            .unwrap_or(false),
        ConditionOp::Nin => expected
            .as_array()
            .map(|arr| !arr.iter().any(|v| loose_eq(actual, v)))
            .unwrap_or(false),
        ConditionOp::Contains => match (actual, expected) {
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
            (Value::Array(items), needle) => items.iter().any(|v| loose_eq(v, needle)),
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn eq_compares_numbers_loosely() {
        assert!(value_matches(Some(&json!(42)), ConditionOp::Eq, &json!(42.0)));
        assert!(!value_matches(Some(&json!(42)), ConditionOp::Eq, &json!(43)));
    }

    #[test]
    fn missing_field_only_satisfies_negative_ops() {
        assert!(!value_matches(None, ConditionOp::Eq, &json!("x")));
        assert!(value_matches(None, ConditionOp::Ne, &json!("x")));
        assert!(value_matches(None, ConditionOp::Nin, &json!(["x"])));
    }

    #[test]
    fn in_and_nin_use_array_membership() {
        assert!(value_matches(Some(&json!("a")), ConditionOp::In, &json!(["a", "b"])));
        assert!(!value_matches(Some(&json!("c")), ConditionOp::In, &json!(["a", "b"])));
        assert!(value_matches(Some(&json!("c")), ConditionOp::Nin, &json!(["a", "b"])));
    }

    #[test]
    fn contains_covers_substrings_and_arrays() {
        assert!(value_matches(Some(&json!("archived")), ConditionOp::Contains, &json!("chive")));
        assert!(value_matches(Some(&json!([1, 2, 3])), ConditionOp::Contains, &json!(2)));
        assert!(!value_matches(Some(&json!([1, 2, 3])), ConditionOp::Contains, &json!(4)));
    }

    #[test]
    fn ordering_ops_compare_numerically() {
        assert!(value_matches(Some(&json!(10)), ConditionOp::Gt, &json!(9.5)));
        assert!(value_matches(Some(&json!("10")), ConditionOp::Gte, &json!(10)));
        assert!(!value_matches(Some(&json!(1)), ConditionOp::Gt, &json!(2)));
    }
}

//! Maps a column definition to a field rule: the scalar type picks the check
//! and coercion, the column name adds format constraints for text columns.

use crate::schema::{ColumnDefinition, ScalarType};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

const PASSWORD_MIN_LEN: usize = 8;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    Email,
    Password,
}

/// Acceptance rule for one field. Closed over the scalar-type enum, so every
/// variant is handled explicitly.
#[derive(Clone, Debug)]
pub enum FieldRule {
    Integer,
    Real,
    Text(TextFormat),
    Boolean,
    DateTime,
    Blob,
}

impl FieldRule {
    pub fn for_column(column: &ColumnDefinition) -> Self {
        match column.scalar_type {
            ScalarType::Integer => FieldRule::Integer,
            ScalarType::Real => FieldRule::Real,
            ScalarType::Text => {
                let lower = column.name.to_lowercase();
                if lower.contains("email") {
                    FieldRule::Text(TextFormat::Email)
                } else if lower.contains("password") {
                    FieldRule::Text(TextFormat::Password)
                } else {
                    FieldRule::Text(TextFormat::Plain)
                }
            }
            ScalarType::Boolean => FieldRule::Boolean,
            ScalarType::DateTime => FieldRule::DateTime,
            ScalarType::Blob => FieldRule::Blob,
        }
    }

    /// Check a non-null value. Errors name the problem against the value as
    /// supplied, before any coercion.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            FieldRule::Integer => check_integer(value),
            FieldRule::Real => check_real(value),
            FieldRule::Text(format) => check_text(value, *format),
            FieldRule::Boolean => check_boolean(value),
            FieldRule::DateTime => check_datetime(value),
            FieldRule::Blob => Ok(()),
        }
    }
}

fn check_integer(value: &Value) -> Result<(), String> {
    match value {
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Ok(())
            } else {
                Err("must be an integer".into())
            }
        }
        // Coercion: a non-empty string is parsed before the type check.
        Value::String(s) if !s.is_empty() => s
            .parse::<i64>()
            .map(|_| ())
            .map_err(|_| format!("'{}' is not a valid integer", s)),
        _ => Err("must be an integer".into()),
    }
}

fn check_real(value: &Value) -> Result<(), String> {
    match value {
        Value::Number(_) => Ok(()),
        Value::String(s) if !s.is_empty() => s
            .parse::<f64>()
            .map(|_| ())
            .map_err(|_| format!("'{}' is not a valid number", s)),
        _ => Err("must be a number".into()),
    }
}

fn check_text(value: &Value, format: TextFormat) -> Result<(), String> {
    let s = match value {
        Value::String(s) => s,
        _ => return Err("must be a string".into()),
    };
    match format {
        TextFormat::Plain => Ok(()),
        TextFormat::Email => {
            if email_regex().is_match(s) {
                Ok(())
            } else {
                Err("must be a valid email address".into())
            }
        }
        TextFormat::Password => {
            if s.len() >= PASSWORD_MIN_LEN {
                Ok(())
            } else {
                Err(format!("must be at least {} characters", PASSWORD_MIN_LEN))
            }
        }
    }
}

fn check_boolean(value: &Value) -> Result<(), String> {
    match value {
        Value::Bool(_) => Ok(()),
        Value::Number(n) => match n.as_i64() {
            Some(0) | Some(1) => Ok(()),
            _ => Err("must be a boolean".into()),
        },
        Value::String(s) => match s.as_str() {
            "true" | "1" | "false" | "0" => Ok(()),
            other => Err(format!("'{}' is not a valid boolean", other)),
        },
        _ => Err("must be a boolean".into()),
    }
}

fn check_datetime(value: &Value) -> Result<(), String> {
    match value {
        // Offset-aware timestamp preferred; any other string is accepted as a
        // lenient fallback and left for the store to interpret.
        Value::String(_) => Ok(()),
        _ => Err("must be a timestamp string".into()),
    }
}

/// True when the string is an offset-aware RFC 3339 timestamp. The datetime
/// rule does not require this form, but coercion normalizes it when present.
pub fn is_strict_timestamp(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(s).is_ok()
}

/// Coerce an accepted value into its canonical JSON form (string numbers to
/// numbers, boolean literals to booleans). Called after `check` succeeds.
pub fn coerce(rule: &FieldRule, value: Value) -> Value {
    match (rule, &value) {
        (FieldRule::Integer, Value::String(s)) => s
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .unwrap_or(value),
        (FieldRule::Real, Value::String(s)) => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(value),
        (FieldRule::Boolean, Value::String(s)) => match s.as_str() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => value,
        },
        (FieldRule::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(1) => Value::Bool(true),
            Some(0) => Value::Bool(false),
            _ => value,
        },
        _ => value,
    }
}

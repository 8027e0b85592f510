//! Row-level condition predicates gating resource-scoped actions.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Wire form of the ownership placeholder. Kept only for the persisted
/// counterpart of the catalogue; in memory the value is a typed variant.
pub const CURRENT_USER_PLACEHOLDER: &str = "{current_user_id}";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Contains,
}

/// Condition target: a literal, or the requesting principal's id resolved
/// structurally at evaluation time.
#[derive(Clone, Debug, PartialEq)]
pub enum ConditionValue {
    Literal(Value),
    CurrentUser,
}

impl Serialize for ConditionValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ConditionValue::Literal(v) => v.serialize(serializer),
            ConditionValue::CurrentUser => serializer.serialize_str(CURRENT_USER_PLACEHOLDER),
        }
    }
}

impl<'de> Deserialize<'de> for ConditionValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = Value::deserialize(deserializer)?;
        match v {
            Value::String(s) if s == CURRENT_USER_PLACEHOLDER => Ok(ConditionValue::CurrentUser),
            other => Ok(ConditionValue::Literal(other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PermissionCondition {
    pub field: String,
    pub operator: ConditionOp,
    pub value: ConditionValue,
}

impl PermissionCondition {
    pub fn eq_literal(field: impl Into<String>, value: Value) -> Self {
        PermissionCondition {
            field: field.into(),
            operator: ConditionOp::Eq,
            value: ConditionValue::Literal(value),
        }
    }

    pub fn owned_by_current_user(field: impl Into<String>) -> Self {
        PermissionCondition {
            field: field.into(),
            operator: ConditionOp::Eq,
            value: ConditionValue::CurrentUser,
        }
    }

    /// Resolve the condition target against the authenticated principal.
    pub fn resolve(&self, principal_id: &str) -> (String, ConditionOp, Value) {
        let value = match &self.value {
            ConditionValue::Literal(v) => v.clone(),
            ConditionValue::CurrentUser => Value::String(principal_id.to_string()),
        };
        (self.field.clone(), self.operator, value)
    }

    pub fn references_current_user(&self) -> bool {
        self.value == ConditionValue::CurrentUser
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn current_user_round_trips_as_placeholder() {
        let cond = PermissionCondition::owned_by_current_user("user_id");
        let wire = serde_json::to_value(&cond).unwrap();
        assert_eq!(wire["value"], json!("{current_user_id}"));
        let back: PermissionCondition = serde_json::from_value(wire).unwrap();
        assert_eq!(back.value, ConditionValue::CurrentUser);
    }

    #[test]
    fn resolve_substitutes_principal_id() {
        let cond = PermissionCondition::owned_by_current_user("user_id");
        let (field, op, value) = cond.resolve("u-42");
        assert_eq!(field, "user_id");
        assert_eq!(op, ConditionOp::Eq);
        assert_eq!(value, json!("u-42"));
    }
}

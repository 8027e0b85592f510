//! Column and table definitions as read from the schema registry catalogue.

use serde::{Deserialize, Deserializer, Serialize};

/// Closed set of storage scalar types. Matches over this enum are exhaustive,
/// so a new variant forces every consumer to handle it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Integer,
    Real,
    Text,
    Boolean,
    DateTime,
    Blob,
}

impl ScalarType {
    /// Map a storage type name to a scalar type. Unrecognized names fall back
    /// to Text at catalogue load time (the one place a fallback is allowed).
    pub fn from_type_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("serial") || lower.contains("int") {
            ScalarType::Integer
        } else if lower.contains("real")
            || lower.contains("float")
            || lower.contains("double")
            || lower.contains("numeric")
            || lower.contains("decimal")
        {
            ScalarType::Real
        } else if lower.contains("bool") || lower.contains("bit") {
            ScalarType::Boolean
        } else if lower.contains("timestamp") || lower.contains("date") || lower.contains("time") {
            ScalarType::DateTime
        } else if lower.contains("blob") || lower.contains("bytea") || lower.contains("binary") {
            ScalarType::Blob
        } else if lower.contains("char") || lower.contains("text") || lower.contains("uuid") {
            ScalarType::Text
        } else {
            tracing::warn!(type_name = %name, "unrecognized column type, treating as text");
            ScalarType::Text
        }
    }
}

/// Column default: a literal value or a storage-side expression.
#[derive(Clone, Debug, Serialize)]
pub enum ColumnDefault {
    Literal(serde_json::Value),
    Expression { expression: String },
}

impl<'de> Deserialize<'de> for ColumnDefault {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        match v {
            serde_json::Value::Object(mut obj) => {
                if let Some(serde_json::Value::String(s)) = obj.remove("expression") {
                    return Ok(ColumnDefault::Expression { expression: s });
                }
                if let Some(lit) = obj.remove("value").or_else(|| obj.remove("literal")) {
                    return Ok(ColumnDefault::Literal(lit));
                }
                Err(serde::de::Error::custom(format!(
                    "column default must be a value, {{ \"expression\": \"...\" }}, or {{ \"value\": ... }}; got object with keys: {:?}",
                    obj.keys().collect::<Vec<_>>()
                )))
            }
            other => Ok(ColumnDefault::Literal(other)),
        }
    }
}

impl ColumnDefault {
    /// True when the value is produced by the store at insert time
    /// (current timestamp or a server-generated id). Callers must never
    /// supply these fields on create.
    pub fn is_insert_generated(&self) -> bool {
        match self {
            ColumnDefault::Literal(_) => false,
            ColumnDefault::Expression { expression } => {
                let lower = expression.to_lowercase();
                lower.contains("now")
                    || lower.contains("current_timestamp")
                    || lower.contains("gen_random_uuid")
                    || lower.contains("uuid_generate")
            }
        }
    }
}

/// Foreign-key reference to another table's column.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type", deserialize_with = "scalar_from_name", serialize_with = "scalar_to_name")]
    pub scalar_type: ScalarType,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub default: Option<ColumnDefault>,
    #[serde(default)]
    pub foreign_key: Option<ForeignKey>,
}

fn default_true() -> bool {
    true
}

fn scalar_from_name<'de, D>(deserializer: D) -> Result<ScalarType, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    Ok(ScalarType::from_type_name(&name))
}

fn scalar_to_name<S>(t: &ScalarType, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let name = match t {
        ScalarType::Integer => "integer",
        ScalarType::Real => "real",
        ScalarType::Text => "text",
        ScalarType::Boolean => "boolean",
        ScalarType::DateTime => "datetime",
        ScalarType::Blob => "blob",
    };
    serializer.serialize_str(name)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn primary_key(&self) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.primary_key)
    }

    /// Primary key column name; "id" when the catalogue marks none.
    pub fn pk_name(&self) -> &str {
        self.primary_key().map(|c| c.name.as_str()).unwrap_or("id")
    }
}

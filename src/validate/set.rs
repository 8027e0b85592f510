//! Validator synthesis: one create/update/read validator triple per table,
//! derived from the column list. Pure over the schema; synthesizing twice
//! yields identical acceptance behavior.

use crate::schema::{ColumnDefinition, TableSchema};
use crate::validate::mapper::{coerce, FieldRule};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
struct FieldValidator {
    name: String,
    rule: FieldRule,
    required: bool,
    nullable: bool,
}

/// Structural validator over a record-shaped JSON object. Unknown keys are
/// ignored; only declared fields are checked.
#[derive(Clone, Debug)]
pub struct RecordValidator {
    fields: Vec<FieldValidator>,
}

impl RecordValidator {
    pub fn validate(&self, record: &Map<String, Value>) -> Result<(), BTreeMap<String, String>> {
        let mut errors = BTreeMap::new();
        for field in &self.fields {
            match record.get(&field.name) {
                None => {
                    if field.required {
                        errors.insert(field.name.clone(), format!("{} is required", field.name));
                    }
                }
                Some(Value::Null) => {
                    if !field.nullable {
                        errors.insert(field.name.clone(), format!("{} must not be null", field.name));
                    }
                }
                Some(value) => {
                    if let Err(message) = field.rule.check(value) {
                        errors.insert(field.name.clone(), message);
                    }
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn accepts(&self, record: &Map<String, Value>) -> bool {
        self.validate(record).is_ok()
    }

    /// Names of the fields this validator covers, in column order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Drop unknown keys and coerce accepted values to canonical JSON form.
    /// A client-supplied generated field (e.g. `id` on create) is dropped
    /// here, never stored.
    pub fn normalize(&self, record: Map<String, Value>) -> Map<String, Value> {
        let mut out = Map::new();
        for (key, value) in record {
            if let Some(field) = self.fields.iter().find(|f| f.name == key) {
                let value = if value.is_null() {
                    value
                } else {
                    coerce(&field.rule, value)
                };
                out.insert(key, value);
            }
        }
        out
    }
}

/// The create/update/read validators for one table.
#[derive(Clone, Debug)]
pub struct ValidatorSet {
    pub create: RecordValidator,
    pub update: RecordValidator,
    pub read: RecordValidator,
}

/// A column the caller must never supply: auto-increment primary keys and
/// store-generated defaults (current timestamp, server-generated id).
fn generated_at_insert(column: &ColumnDefinition) -> bool {
    (column.auto_increment && column.primary_key)
        || column
            .default
            .as_ref()
            .map(|d| d.is_insert_generated())
            .unwrap_or(false)
}

impl ValidatorSet {
    pub fn synthesize(schema: &TableSchema) -> Self {
        let mut create_fields = Vec::new();
        let mut update_fields = Vec::new();
        let mut read_fields = Vec::new();

        for column in &schema.columns {
            let rule = FieldRule::for_column(column);

            read_fields.push(FieldValidator {
                name: column.name.clone(),
                rule: rule.clone(),
                required: true,
                nullable: column.nullable,
            });

            if generated_at_insert(column) {
                continue;
            }

            let optional = column.default.is_some() || column.nullable;
            create_fields.push(FieldValidator {
                name: column.name.clone(),
                rule: rule.clone(),
                required: !optional,
                nullable: column.nullable,
            });
            update_fields.push(FieldValidator {
                name: column.name.clone(),
                rule,
                required: false,
                nullable: column.nullable,
            });
        }

        ValidatorSet {
            create: RecordValidator { fields: create_fields },
            update: RecordValidator { fields: update_fields },
            read: RecordValidator { fields: read_fields },
        }
    }
}

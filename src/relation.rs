//! Relation resolver: follows foreign-key columns to the referenced rows.

use crate::error::AppError;
use crate::schema::SchemaRegistry;
use crate::store::{Filter, Record, RecordStore, StoreError};
use serde_json::Value;

/// Reserved response key for resolved relations, distinct from data columns.
pub const RELATED_KEY: &str = "_related";

pub fn store_err(e: StoreError) -> AppError {
    match e {
        StoreError::UnknownTable(t) => AppError::NotFound(t),
        StoreError::Rejected(m) => AppError::BadRequest(m),
        StoreError::Conflict(m) => AppError::Conflict(m),
        StoreError::Backend(m) => AppError::Storage(m),
    }
}

/// Resolve every outgoing foreign key of `table` for one record and attach
/// the results under [`RELATED_KEY`]. A null or absent join key resolves to
/// null.
pub async fn attach_related(
    store: &dyn RecordStore,
    registry: &SchemaRegistry,
    table: &str,
    record: &mut Record,
) -> Result<(), AppError> {
    let mut related = Record::new();
    for rel in registry.outgoing(table) {
        let resolved = match record.get(&rel.column) {
            None | Some(Value::Null) => Value::Null,
            Some(key) => store
                .find_one(
                    &rel.references_table,
                    &[Filter::eq(rel.references_column.clone(), key.clone())],
                )
                .await
                .map_err(store_err)?
                .map(Value::Object)
                .unwrap_or(Value::Null),
        };
        related.insert(rel.column.clone(), resolved);
    }
    record.insert(RELATED_KEY.to_string(), Value::Object(related));
    Ok(())
}

/// Resolve one named relation of a record: the relation name is the
/// foreign-key column, its value the join key into the referenced table.
pub async fn resolve_named(
    store: &dyn RecordStore,
    registry: &SchemaRegistry,
    table: &str,
    record: &Record,
    relation: &str,
) -> Result<Vec<Record>, AppError> {
    let rel = registry
        .outgoing(table)
        .iter()
        .find(|r| r.column == relation)
        .ok_or_else(|| AppError::BadRequest(format!("{} is not a relation of {}", relation, table)))?
        .clone();
    let key = record
        .get(&rel.column)
        .ok_or_else(|| AppError::BadRequest(format!("record has no field {}", relation)))?;
    if key.is_null() {
        return Ok(Vec::new());
    }
    store
        .find_many(
            &rel.references_table,
            &[Filter::eq(rel.references_column, key.clone())],
        )
        .await
        .map_err(store_err)
}

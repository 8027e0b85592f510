//! In-memory record store for tests and embedded setups. Schema-aware:
//! fills auto-increment ids, generated uuid/timestamp defaults, and literal
//! defaults the way a relational backend would.

use crate::schema::{ColumnDefault, ScalarType, SchemaRegistry, TableSchema};
use crate::store::filter::{compare_values, Filter};
use crate::store::{ListQuery, OrderDirection, Record, RecordStore, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct TableData {
    rows: Vec<Record>,
    next_id: i64,
}

pub struct MemoryRecordStore {
    registry: Arc<SchemaRegistry>,
    tables: RwLock<HashMap<String, TableData>>,
}

impl MemoryRecordStore {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        MemoryRecordStore {
            registry,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a row directly, bypassing default generation. Test seeding.
    pub fn seed(&self, table: &str, row: Record) {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.entry(table.to_string()).or_default().rows.push(row);
    }

    fn schema(&self, table: &str) -> Result<&TableSchema, StoreError> {
        self.registry
            .get(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }

    fn fill_defaults(schema: &TableSchema, data: &mut TableData, fields: &mut Record) {
        for column in &schema.columns {
            if fields.contains_key(&column.name) {
                continue;
            }
            if column.auto_increment && column.primary_key {
                data.next_id += 1;
                fields.insert(column.name.clone(), Value::Number(data.next_id.into()));
                continue;
            }
            match &column.default {
                Some(ColumnDefault::Literal(v)) => {
                    fields.insert(column.name.clone(), v.clone());
                }
                Some(d @ ColumnDefault::Expression { .. }) if d.is_insert_generated() => {
                    let generated = match column.scalar_type {
                        ScalarType::DateTime => {
                            Value::String(chrono::Utc::now().to_rfc3339())
                        }
                        _ => Value::String(uuid::Uuid::new_v4().to_string()),
                    };
                    fields.insert(column.name.clone(), generated);
                }
                _ => {
                    fields.insert(column.name.clone(), Value::Null);
                }
            }
        }
    }
}

fn order_rows(rows: &mut [Record], order_by: &str, direction: Option<OrderDirection>) {
    rows.sort_by(|a, b| {
        let ord = match (a.get(order_by), b.get(order_by)) {
            (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        match direction {
            Some(OrderDirection::Desc) => ord.reverse(),
            _ => ord,
        }
    });
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list(&self, table: &str, query: &ListQuery) -> Result<Vec<Record>, StoreError> {
        self.schema(table)?;
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        let mut rows: Vec<Record> = tables
            .get(table)
            .map(|d| {
                d.rows
                    .iter()
                    .filter(|r| query.filters.iter().all(|f| f.matches(r)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        order_rows(&mut rows, &query.order_by, query.direction);
        Ok(rows
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn find_one(&self, table: &str, filters: &[Filter]) -> Result<Option<Record>, StoreError> {
        self.schema(table)?;
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        Ok(tables.get(table).and_then(|d| {
            d.rows
                .iter()
                .find(|r| filters.iter().all(|f| f.matches(r)))
                .cloned()
        }))
    }

    async fn find_many(&self, table: &str, filters: &[Filter]) -> Result<Vec<Record>, StoreError> {
        self.schema(table)?;
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        Ok(tables
            .get(table)
            .map(|d| {
                d.rows
                    .iter()
                    .filter(|r| filters.iter().all(|f| f.matches(r)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, table: &str, mut fields: Record) -> Result<Record, StoreError> {
        let schema = self.schema(table)?;
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let data = tables.entry(table.to_string()).or_default();

        Self::fill_defaults(schema, data, &mut fields);

        let pk = schema.pk_name();
        if let Some(id) = fields.get(pk) {
            if !id.is_null() && data.rows.iter().any(|r| r.get(pk) == Some(id)) {
                return Err(StoreError::Conflict(format!("{}.{} already exists", table, pk)));
            }
        }
        for column in &schema.columns {
            if !column.nullable
                && column.default.is_none()
                && fields.get(&column.name).map(|v| v.is_null()).unwrap_or(true)
            {
                return Err(StoreError::Rejected(format!(
                    "column {} may not be null",
                    column.name
                )));
            }
        }

        data.rows.push(fields.clone());
        Ok(fields)
    }

    async fn update(
        &self,
        table: &str,
        pk: &str,
        id: &Value,
        guards: &[Filter],
        fields: Record,
    ) -> Result<Option<Record>, StoreError> {
        self.schema(table)?;
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let Some(data) = tables.get_mut(table) else {
            return Ok(None);
        };
        let id_filter = Filter::eq(pk, id.clone());
        let row = data
            .rows
            .iter_mut()
            .find(|r| id_filter.matches(r) && guards.iter().all(|g| g.matches(r)));
        Ok(row.map(|r| {
            for (k, v) in fields {
                r.insert(k, v);
            }
            r.clone()
        }))
    }

    async fn delete(
        &self,
        table: &str,
        pk: &str,
        id: &Value,
        guards: &[Filter],
    ) -> Result<bool, StoreError> {
        self.schema(table)?;
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let Some(data) = tables.get_mut(table) else {
            return Ok(false);
        };
        let id_filter = Filter::eq(pk, id.clone());
        let before = data.rows.len();
        data.rows
            .retain(|r| !(id_filter.matches(r) && guards.iter().all(|g| g.matches(r))));
        Ok(data.rows.len() < before)
    }
}

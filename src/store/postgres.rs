//! PostgreSQL record store: parameterized single-statement CRUD keyed by
//! table name, with identifiers taken only from the schema registry.

use crate::permission::ConditionOp;
use crate::schema::{SchemaRegistry, TableSchema};
use crate::store::{Filter, ListQuery, OrderDirection, Record, RecordStore, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgPool, PgRow, PgTypeInfo, Postgres};
use sqlx::Database;
use std::sync::Arc;

pub struct PgRecordStore {
    pool: PgPool,
    registry: Arc<SchemaRegistry>,
}

impl PgRecordStore {
    pub fn new(pool: PgPool, registry: Arc<SchemaRegistry>) -> Self {
        PgRecordStore { pool, registry }
    }

    fn schema(&self, table: &str) -> Result<&TableSchema, StoreError> {
        self.registry
            .get(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }

    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<Record>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(&self.pool).await.map_err(map_sqlx)?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<Record>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query.fetch_optional(&self.pool).await.map_err(map_sqlx)?;
        Ok(row.as_ref().map(row_to_record))
    }
}

/// Quote an identifier. Identifiers come from the registry or are checked
/// against it before reaching this point.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

struct QueryBuf {
    sql: String,
    params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

fn require_column(schema: &TableSchema, name: &str) -> Result<(), StoreError> {
    if schema.has_column(name) {
        Ok(())
    } else {
        Err(StoreError::Rejected(format!(
            "unknown column {} on table {}",
            name, schema.name
        )))
    }
}

/// Render one filter into a WHERE fragment, binding its parameters.
fn filter_sql(buf: &mut QueryBuf, schema: &TableSchema, filter: &Filter) -> Result<String, StoreError> {
    require_column(schema, &filter.field)?;
    let col = quoted(&filter.field);
    let sql = match filter.op {
        ConditionOp::Eq => format!("{} = ${}", col, buf.push_param(filter.value.clone())),
        ConditionOp::Ne => format!("{} <> ${}", col, buf.push_param(filter.value.clone())),
        ConditionOp::Gt => format!("{} > ${}", col, buf.push_param(filter.value.clone())),
        ConditionOp::Gte => format!("{} >= ${}", col, buf.push_param(filter.value.clone())),
        ConditionOp::Lt => format!("{} < ${}", col, buf.push_param(filter.value.clone())),
        ConditionOp::Lte => format!("{} <= ${}", col, buf.push_param(filter.value.clone())),
        ConditionOp::In | ConditionOp::Nin => {
            let values = filter
                .value
                .as_array()
                .ok_or_else(|| StoreError::Rejected("in/nin filter requires an array".into()))?;
            if values.is_empty() {
                return Ok(match filter.op {
                    ConditionOp::In => "1 = 0".to_string(),
                    _ => "1 = 1".to_string(),
                });
            }
            let placeholders: Vec<String> = values
                .iter()
                .map(|v| format!("${}", buf.push_param(v.clone())))
                .collect();
            let keyword = if filter.op == ConditionOp::In { "IN" } else { "NOT IN" };
            format!("{} {} ({})", col, keyword, placeholders.join(", "))
        }
        ConditionOp::Contains => {
            let n = buf.push_param(filter.value.clone());
            format!("{}::text LIKE '%' || ${} || '%'", col, n)
        }
    };
    Ok(sql)
}

fn where_clause(
    buf: &mut QueryBuf,
    schema: &TableSchema,
    filters: &[Filter],
) -> Result<String, StoreError> {
    if filters.is_empty() {
        return Ok(String::new());
    }
    let mut parts = Vec::with_capacity(filters.len());
    for f in filters {
        parts.push(filter_sql(buf, schema, f)?);
    }
    Ok(format!(" WHERE {}", parts.join(" AND ")))
}

fn guarded_filters(pk: &str, id: &Value, guards: &[Filter]) -> Vec<Filter> {
    let mut filters = Vec::with_capacity(guards.len() + 1);
    filters.push(Filter::eq(pk, id.clone()));
    filters.extend(guards.iter().cloned());
    filters
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if let Some(code) = db.code() {
            if code == "23505" {
                return StoreError::Conflict(db.message().to_string());
            }
            // Other integrity violations (not-null, FK, check) are caller errors.
            if code.starts_with("23") || code.starts_with("22") {
                return StoreError::Rejected(db.message().to_string());
            }
        }
    }
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn list(&self, table: &str, query: &ListQuery) -> Result<Vec<Record>, StoreError> {
        let schema = self.schema(table)?;
        require_column(schema, &query.order_by)?;
        let mut q = QueryBuf::new();
        let where_sql = where_clause(&mut q, schema, &query.filters)?;
        let direction = match query.direction {
            Some(OrderDirection::Desc) => " DESC",
            Some(OrderDirection::Asc) => " ASC",
            None => "",
        };
        q.sql = format!(
            "SELECT * FROM {}{} ORDER BY {}{} LIMIT {} OFFSET {}",
            quoted(table),
            where_sql,
            quoted(&query.order_by),
            direction,
            query.limit,
            query.offset
        );
        self.fetch_all(&q).await
    }

    async fn find_one(&self, table: &str, filters: &[Filter]) -> Result<Option<Record>, StoreError> {
        let schema = self.schema(table)?;
        let mut q = QueryBuf::new();
        let where_sql = where_clause(&mut q, schema, filters)?;
        q.sql = format!("SELECT * FROM {}{} LIMIT 1", quoted(table), where_sql);
        self.fetch_optional(&q).await
    }

    async fn find_many(&self, table: &str, filters: &[Filter]) -> Result<Vec<Record>, StoreError> {
        let schema = self.schema(table)?;
        let mut q = QueryBuf::new();
        let where_sql = where_clause(&mut q, schema, filters)?;
        q.sql = format!(
            "SELECT * FROM {}{} ORDER BY {}",
            quoted(table),
            where_sql,
            quoted(schema.pk_name())
        );
        self.fetch_all(&q).await
    }

    async fn insert(&self, table: &str, fields: Record) -> Result<Record, StoreError> {
        let schema = self.schema(table)?;
        let mut q = QueryBuf::new();
        if fields.is_empty() {
            q.sql = format!("INSERT INTO {} DEFAULT VALUES RETURNING *", quoted(table));
        } else {
            let mut columns = Vec::with_capacity(fields.len());
            let mut placeholders = Vec::with_capacity(fields.len());
            for (name, value) in &fields {
                require_column(schema, name)?;
                columns.push(quoted(name));
                placeholders.push(format!("${}", q.push_param(value.clone())));
            }
            q.sql = format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                quoted(table),
                columns.join(", "),
                placeholders.join(", ")
            );
        }
        let row = self
            .fetch_optional(&q)
            .await?
            .ok_or_else(|| StoreError::Backend("insert returned no row".into()))?;
        Ok(row)
    }

    async fn update(
        &self,
        table: &str,
        pk: &str,
        id: &Value,
        guards: &[Filter],
        fields: Record,
    ) -> Result<Option<Record>, StoreError> {
        let schema = self.schema(table)?;
        let filters = guarded_filters(pk, id, guards);
        if fields.is_empty() {
            // Nothing to set; an empty partial update reads the row back
            // under the same guards.
            return self.find_one(table, &filters).await;
        }
        let mut q = QueryBuf::new();
        let mut sets = Vec::with_capacity(fields.len());
        for (name, value) in &fields {
            require_column(schema, name)?;
            sets.push(format!("{} = ${}", quoted(name), q.push_param(value.clone())));
        }
        let where_sql = where_clause(&mut q, schema, &filters)?;
        q.sql = format!(
            "UPDATE {} SET {}{} RETURNING *",
            quoted(table),
            sets.join(", "),
            where_sql
        );
        self.fetch_optional(&q).await
    }

    async fn delete(
        &self,
        table: &str,
        pk: &str,
        id: &Value,
        guards: &[Filter],
    ) -> Result<bool, StoreError> {
        let schema = self.schema(table)?;
        let filters = guarded_filters(pk, id, guards);
        let mut q = QueryBuf::new();
        let where_sql = where_clause(&mut q, schema, &filters)?;
        q.sql = format!(
            "DELETE FROM {}{} RETURNING {}",
            quoted(table),
            where_sql,
            quoted(pk)
        );
        Ok(self.fetch_optional(&q).await?.is_some())
    }
}

/// A value that can be bound to a PostgreSQL query. Converts from serde_json.
#[derive(Clone, Debug)]
enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Uuid(uuid::Uuid),
    Json(Value),
}

impl PgBindValue {
    fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PgBindValue::I64(i)
                } else {
                    PgBindValue::F64(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => {
                if let Ok(u) = uuid::Uuid::parse_str(s) {
                    PgBindValue::Uuid(u)
                } else {
                    PgBindValue::String(s.clone())
                }
            }
            Value::Array(_) | Value::Object(_) => PgBindValue::Json(v.clone()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null => <Option<i32> as Encode<Postgres>>::encode_by_ref(&None, buf)?,
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::String(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)?
            }
            PgBindValue::Uuid(u) => <uuid::Uuid as Encode<Postgres>>::encode_by_ref(u, buf)?,
            PgBindValue::Json(v) => <Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }

    // Each variant declares its own wire type so integer and uuid
    // comparisons typecheck server-side.
    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            PgBindValue::Null | PgBindValue::String(_) => PgTypeInfo::with_name("TEXT"),
            PgBindValue::Bool(_) => PgTypeInfo::with_name("BOOL"),
            PgBindValue::I64(_) => PgTypeInfo::with_name("INT8"),
            PgBindValue::F64(_) => PgTypeInfo::with_name("FLOAT8"),
            PgBindValue::Uuid(_) => PgTypeInfo::with_name("UUID"),
            PgBindValue::Json(_) => PgTypeInfo::with_name("JSONB"),
        })
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

fn row_to_record(row: &PgRow) -> Record {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Record::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(v)) = row.try_get::<Option<Vec<u8>>, _>(name) {
        return Value::Array(v.into_iter().map(|b| Value::Number(b.into())).collect());
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}

//! Record CRUD and relation handlers. Each mounted route carries its table
//! name as a request extension; handlers resolve the schema from the
//! registry snapshot, authorize, then delegate to the record store.

use crate::auth::AuthContext;
use crate::error::AppError;
use crate::permission::Action;
use crate::relation::{attach_related, resolve_named, store_err};
use crate::response;
use crate::schema::{ScalarType, TableSchema};
use crate::state::AppState;
use crate::store::{Filter, ListQuery, OrderDirection, Record};
use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde_json::Value;
use std::collections::HashMap;

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 1000;

/// Table served by the mounted route, attached at mount time.
#[derive(Clone)]
pub struct RouteTable(pub String);

fn parse_id(schema: &TableSchema, id_str: &str) -> Result<Value, AppError> {
    let pk_type = schema
        .primary_key()
        .map(|c| c.scalar_type)
        .unwrap_or(ScalarType::Integer);
    Ok(match pk_type {
        ScalarType::Integer => {
            let n: i64 = id_str
                .parse()
                .map_err(|_| AppError::BadRequest("invalid id".into()))?;
            Value::Number(n.into())
        }
        _ => Value::String(id_str.to_string()),
    })
}

fn body_to_record(value: Value) -> Result<Record, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

/// Coerce a query-string filter value by the column's scalar type so exact
/// matching works against typed storage.
fn query_value_for_column(schema: &TableSchema, col: &str, s: &str) -> Value {
    match schema.column(col).map(|c| c.scalar_type) {
        Some(ScalarType::Integer) => s
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .unwrap_or_else(|_| Value::String(s.to_string())),
        Some(ScalarType::Real) => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(s.to_string())),
        Some(ScalarType::Boolean) => {
            if s.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if s.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                Value::String(s.to_string())
            }
        }
        _ => Value::String(s.to_string()),
    }
}

/// Gate one action. Anonymous principals get 401, missing permission or a
/// failed row condition 403; the response never names the condition.
async fn authorize(
    state: &AppState,
    auth: &AuthContext,
    schema: &TableSchema,
    action: Action,
    resource_id: Option<&Value>,
) -> Result<(), AppError> {
    if !state.auth_enabled {
        return Ok(());
    }
    if !auth.is_authenticated {
        return Err(AppError::Unauthenticated);
    }
    if state
        .evaluator
        .check(auth, &schema.name, action, resource_id, schema.pk_name())
        .await
    {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Row-condition guards for a mutation, resolved against the principal.
/// Embedded in the mutation statement so the condition is re-checked
/// atomically with the act.
fn mutation_guards(state: &AppState, auth: &AuthContext, table: &str) -> Vec<Filter> {
    if !state.auth_enabled {
        return Vec::new();
    }
    state
        .evaluator
        .resolved_conditions(auth, table)
        .unwrap_or_default()
}

fn require_schema<'a>(state: &'a AppState, table: &str) -> Result<&'a TableSchema, AppError> {
    state
        .registry
        .get(table)
        .ok_or_else(|| AppError::NotFound(table.to_string()))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(table): Extension<RouteTable>,
    auth: AuthContext,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let schema = require_schema(&state, &table.0)?;
    authorize(&state, &auth, schema, Action::List, None).await?;

    // Non-numeric limit/offset fall back to the defaults, never to an error.
    let limit = params
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_LIMIT)
        .min(MAX_LIMIT);
    let offset = params.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);

    let order_by = params
        .get("orderBy")
        .map(|s| s.as_str())
        .unwrap_or_else(|| schema.pk_name());
    if !schema.has_column(order_by) {
        return Err(AppError::BadRequest(format!("unknown orderBy column: {}", order_by)));
    }
    let direction = match params.get("orderDirection") {
        None => None,
        Some(raw) => Some(OrderDirection::from_param(raw).ok_or_else(|| {
            AppError::validation_one("orderDirection", "must be ASC or DESC")
        })?),
    };
    let include_relations = params.get("includeRelations").map(|v| v == "true").unwrap_or(false);

    let mut filters = Vec::new();
    for (key, value) in &params {
        if matches!(key.as_str(), "limit" | "offset" | "orderBy" | "orderDirection" | "includeRelations") {
            continue;
        }
        if schema.has_column(key) {
            filters.push(Filter::eq(key.clone(), query_value_for_column(schema, key, value)));
        }
    }

    let query = ListQuery {
        filters,
        limit,
        offset,
        order_by: order_by.to_string(),
        direction,
    };
    let mut rows = state.store.list(&table.0, &query).await.map_err(store_err)?;
    if include_relations {
        for row in &mut rows {
            attach_related(state.store.as_ref(), &state.registry, &table.0, row).await?;
        }
    }
    Ok(response::ok_many(rows, limit, offset))
}

pub async fn get_one(
    State(state): State<AppState>,
    Extension(table): Extension<RouteTable>,
    auth: AuthContext,
    Path(id_str): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let schema = require_schema(&state, &table.0)?;
    let id = parse_id(schema, &id_str)?;
    authorize(&state, &auth, schema, Action::View, Some(&id)).await?;

    let mut record = state
        .store
        .find_one(&table.0, &[Filter::eq(schema.pk_name(), id)])
        .await
        .map_err(store_err)?
        .ok_or_else(|| AppError::NotFound(id_str))?;
    if params.get("includeRelations").map(|v| v == "true").unwrap_or(false) {
        attach_related(state.store.as_ref(), &state.registry, &table.0, &mut record).await?;
    }
    Ok(response::ok_one(record))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(table): Extension<RouteTable>,
    auth: AuthContext,
    Json(body): Json<Value>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let schema = require_schema(&state, &table.0)?;
    authorize(&state, &auth, schema, Action::Create, None).await?;

    let body = body_to_record(body)?;
    let validators = state
        .validator_set(&schema.name)
        .ok_or_else(|| AppError::NotFound(schema.name.clone()))?;
    validators
        .create
        .validate(&body)
        .map_err(|fields| AppError::Validation { fields })?;
    let fields = validators.create.normalize(body);

    let record = state.store.insert(&table.0, fields).await.map_err(store_err)?;
    Ok(response::created(record))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(table): Extension<RouteTable>,
    auth: AuthContext,
    Path(id_str): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let schema = require_schema(&state, &table.0)?;
    let id = parse_id(schema, &id_str)?;
    authorize(&state, &auth, schema, Action::Update, Some(&id)).await?;

    let body = body_to_record(body)?;
    let validators = state
        .validator_set(&schema.name)
        .ok_or_else(|| AppError::NotFound(schema.name.clone()))?;
    validators
        .update
        .validate(&body)
        .map_err(|fields| AppError::Validation { fields })?;
    let fields = validators.update.normalize(body);

    let guards = mutation_guards(&state, &auth, &table.0);
    let updated = state
        .store
        .update(&table.0, schema.pk_name(), &id, &guards, fields)
        .await
        .map_err(store_err)?;
    match updated {
        Some(record) => Ok(response::ok_one(record)),
        None => Err(miss_to_error(&state, schema, &id, &id_str).await),
    }
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(table): Extension<RouteTable>,
    auth: AuthContext,
    Path(id_str): Path<String>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let schema = require_schema(&state, &table.0)?;
    let id = parse_id(schema, &id_str)?;
    authorize(&state, &auth, schema, Action::Delete, Some(&id)).await?;

    let guards = mutation_guards(&state, &auth, &table.0);
    let removed = state
        .store
        .delete(&table.0, schema.pk_name(), &id, &guards)
        .await
        .map_err(store_err)?;
    if removed {
        Ok(response::ok_message("record deleted"))
    } else {
        Err(miss_to_error(&state, schema, &id, &id_str).await)
    }
}

/// A guarded mutation matched nothing: the row either no longer satisfies
/// its conditions (403, kept generic) or does not exist (404).
async fn miss_to_error(state: &AppState, schema: &TableSchema, id: &Value, id_str: &str) -> AppError {
    let exists = state
        .store
        .find_one(&schema.name, &[Filter::eq(schema.pk_name(), id.clone())])
        .await;
    match exists {
        Ok(Some(_)) if state.auth_enabled => AppError::Forbidden,
        Ok(Some(_)) => AppError::NotFound(id_str.to_string()),
        Ok(None) => AppError::NotFound(id_str.to_string()),
        Err(e) => store_err(e),
    }
}

pub async fn related(
    State(state): State<AppState>,
    Extension(table): Extension<RouteTable>,
    auth: AuthContext,
    Path((id_str, relation)): Path<(String, String)>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let schema = require_schema(&state, &table.0)?;
    let id = parse_id(schema, &id_str)?;
    authorize(&state, &auth, schema, Action::View, Some(&id)).await?;

    let record = state
        .store
        .find_one(&table.0, &[Filter::eq(schema.pk_name(), id)])
        .await
        .map_err(store_err)?
        .ok_or_else(|| AppError::NotFound(id_str))?;
    let rows = resolve_named(state.store.as_ref(), &state.registry, &table.0, &record, &relation).await?;
    Ok(response::ok_one(rows))
}

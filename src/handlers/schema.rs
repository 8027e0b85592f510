//! Schema introspection handlers: table listing, full schema dump, and
//! single-table schema with its relation map.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

fn relations_for(state: &AppState, table: &str) -> Value {
    json!({
        "outgoing": state.registry.outgoing(table),
        "incoming": state.registry.incoming(table),
    })
}

pub async fn tables(State(state): State<AppState>) -> Json<Value> {
    let tables: Vec<Value> = state
        .registry
        .tables()
        .iter()
        .map(|t| json!({ "name": t.name, "columns": t.columns.len() }))
        .collect();
    Json(json!({ "tables": tables }))
}

pub async fn schemas(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let mut relations = serde_json::Map::new();
    for table in state.registry.tables() {
        relations.insert(table.name.clone(), relations_for(&state, &table.name));
    }
    Ok(Json(json!({
        "schemas": state.registry.tables(),
        "relations": relations,
    })))
}

pub async fn schema_one(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<Value>, AppError> {
    let schema = state
        .registry
        .get(&table)
        .ok_or_else(|| AppError::NotFound(table.clone()))?;
    Ok(Json(json!({
        "schema": schema,
        "relations": relations_for(&state, &table),
    })))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

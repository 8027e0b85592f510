//! Route construction. The route table is built once at boot from the
//! registry snapshot; mounting is a plain iteration over it, with each
//! table's name attached to its routes as a request extension.

use crate::handlers::{records, schema};
use crate::handlers::records::RouteTable;
use crate::permission::Action;
use crate::state::AppState;
use axum::http::Method;
use axum::routing::{get, MethodRouter};
use axum::{Extension, Router};
use std::collections::BTreeMap;
use tower_http::limit::RequestBodyLimitLayer;

const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteKind {
    List,
    Read,
    Create,
    Update,
    Delete,
    Related,
}

impl RouteKind {
    pub const ALL: [RouteKind; 6] = [
        RouteKind::List,
        RouteKind::Read,
        RouteKind::Create,
        RouteKind::Update,
        RouteKind::Delete,
        RouteKind::Related,
    ];

    pub fn method(&self) -> Method {
        match self {
            RouteKind::List | RouteKind::Read | RouteKind::Related => Method::GET,
            RouteKind::Create => Method::POST,
            RouteKind::Update => Method::PUT,
            RouteKind::Delete => Method::DELETE,
        }
    }

    pub fn action(&self) -> Action {
        match self {
            RouteKind::List => Action::List,
            RouteKind::Read | RouteKind::Related => Action::View,
            RouteKind::Create => Action::Create,
            RouteKind::Update => Action::Update,
            RouteKind::Delete => Action::Delete,
        }
    }

    fn path(&self, table: &str) -> String {
        match self {
            RouteKind::List | RouteKind::Create => format!("/{}", table),
            RouteKind::Read | RouteKind::Update | RouteKind::Delete => format!("/{}/:id", table),
            RouteKind::Related => format!("/{}/:id/related/:relation", table),
        }
    }
}

/// One mounted route: table, concrete path, and what the route does.
#[derive(Clone, Debug)]
pub struct RouteSpec {
    pub table: String,
    pub path: String,
    pub kind: RouteKind,
}

/// Build the static route table for every table in the registry.
pub fn build_route_table(registry: &crate::schema::SchemaRegistry) -> Vec<RouteSpec> {
    let mut specs = Vec::with_capacity(registry.tables().len() * RouteKind::ALL.len());
    for table in registry.tables() {
        for kind in RouteKind::ALL {
            specs.push(RouteSpec {
                table: table.name.clone(),
                path: kind.path(&table.name),
                kind,
            });
        }
    }
    specs
}

/// Mount the record routes: iterate the route table, group specs sharing a
/// path into one method router, and attach the table name as an extension.
pub fn record_routes(state: AppState, specs: &[RouteSpec]) -> Router {
    let mut grouped: BTreeMap<(String, String), Vec<RouteKind>> = BTreeMap::new();
    for spec in specs {
        grouped
            .entry((spec.table.clone(), spec.path.clone()))
            .or_default()
            .push(spec.kind);
    }

    let mut router = Router::new();
    for ((table, path), kinds) in grouped {
        let mut mr: MethodRouter<AppState> = MethodRouter::new();
        for kind in &kinds {
            mr = match kind {
                RouteKind::List => mr.get(records::list),
                RouteKind::Read => mr.get(records::get_one),
                RouteKind::Create => mr.post(records::create),
                RouteKind::Update => mr.put(records::update),
                RouteKind::Delete => mr.delete(records::remove),
                RouteKind::Related => mr.get(records::related),
            };
        }
        tracing::debug!(table = %table, path = %path, methods = ?kinds, "mounting route");
        router = router.route(&path, mr.layer(Extension(RouteTable(table))));
    }
    router.with_state(state)
}

/// Introspection and health routes.
pub fn schema_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(schema::health))
        .route("/tables", get(schema::tables))
        .route("/schemas", get(schema::schemas))
        .route("/schema/:table", get(schema::schema_one))
        .with_state(state)
}

/// Full router: introspection plus the generated per-table routes.
pub fn build_router(state: AppState) -> Router {
    let specs = build_route_table(&state.registry);
    tracing::info!(routes = specs.len(), tables = state.registry.tables().len(), "mounting generated routes");
    Router::new()
        .merge(schema_routes(state.clone()))
        .merge(record_routes(state, &specs))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
}

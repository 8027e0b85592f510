//! Adminforge: schema-driven admin CRUD backend library.
//!
//! Turns a table catalogue into typed input validators, a uniform
//! CRUD-plus-relations route surface, and a derived `<table>:<action>`
//! permission model with row-level conditions.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod permission;
pub mod relation;
pub mod response;
pub mod routes;
pub mod schema;
pub mod state;
pub mod store;
pub mod validate;

pub use auth::AuthContext;
pub use error::{AppError, SchemaError};
pub use identity::{IdentityProvider, Principal, StaticIdentityProvider};
pub use permission::{
    Action, ConditionOverrides, PermissionCatalogue, PermissionCondition, PermissionEvaluator,
};
pub use routes::{build_route_table, build_router, RouteKind, RouteSpec};
pub use schema::{ColumnDefinition, ScalarType, SchemaRegistry, TableSchema};
pub use state::AppState;
pub use store::{MemoryRecordStore, PgRecordStore, RecordStore};
pub use validate::ValidatorSet;

//! Record storage accessor seam: generic find/create/update/delete keyed by
//! table name. The core calls this; query execution belongs to the backend.

pub mod filter;
pub mod memory;
pub mod postgres;

pub use filter::Filter;
pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub type Record = serde_json::Map<String, Value>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("table not found: {0}")]
    UnknownTable(String),
    /// The store rejected the operation (constraint, bad reference, bad input).
    #[error("{0}")]
    Rejected(String),
    #[error("duplicate: {0}")]
    Conflict(String),
    #[error("backend: {0}")]
    Backend(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    /// Parse the query-string form. Anything outside the enum is an error,
    /// not silently ignored.
    pub fn from_param(s: &str) -> Option<Self> {
        match s {
            "ASC" => Some(OrderDirection::Asc),
            "DESC" => Some(OrderDirection::Desc),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub limit: u32,
    pub offset: u32,
    pub order_by: String,
    pub direction: Option<OrderDirection>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list(&self, table: &str, query: &ListQuery) -> Result<Vec<Record>, StoreError>;

    async fn find_one(&self, table: &str, filters: &[Filter]) -> Result<Option<Record>, StoreError>;

    async fn find_many(&self, table: &str, filters: &[Filter]) -> Result<Vec<Record>, StoreError>;

    async fn insert(&self, table: &str, fields: Record) -> Result<Record, StoreError>;

    /// Update the row with `pk = id`, additionally constrained by `guards`.
    /// The guards are part of the same statement, so a row condition is
    /// re-validated atomically with the mutation. `None` when no row matched.
    async fn update(
        &self,
        table: &str,
        pk: &str,
        id: &Value,
        guards: &[Filter],
        fields: Record,
    ) -> Result<Option<Record>, StoreError>;

    /// Delete the row with `pk = id` under the same guard semantics as
    /// `update`. Returns whether a row was removed.
    async fn delete(
        &self,
        table: &str,
        pk: &str,
        id: &Value,
        guards: &[Filter],
    ) -> Result<bool, StoreError>;
}

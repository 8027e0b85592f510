//! Read-only snapshot of the table catalogue plus the foreign-key relation
//! map derived from it. Built once at boot; schema changes require a restart.

use crate::error::SchemaError;
use crate::schema::types::TableSchema;
use serde::Serialize;
use std::collections::HashMap;

/// One foreign-key-derived link: `table.column` references
/// `references_table.references_column`.
#[derive(Clone, Debug, Serialize)]
pub struct Relation {
    pub table: String,
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

#[derive(Debug)]
pub struct SchemaRegistry {
    tables: Vec<TableSchema>,
    by_name: HashMap<String, usize>,
    outgoing: HashMap<String, Vec<Relation>>,
    incoming: HashMap<String, Vec<Relation>>,
}

impl SchemaRegistry {
    pub fn new(tables: Vec<TableSchema>) -> Self {
        let by_name = tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();

        let mut outgoing: HashMap<String, Vec<Relation>> = HashMap::new();
        let mut incoming: HashMap<String, Vec<Relation>> = HashMap::new();
        for table in &tables {
            for column in &table.columns {
                if let Some(fk) = &column.foreign_key {
                    let rel = Relation {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        references_table: fk.table.clone(),
                        references_column: fk.column.clone(),
                    };
                    outgoing.entry(table.name.clone()).or_default().push(rel.clone());
                    incoming.entry(fk.table.clone()).or_default().push(rel);
                }
            }
        }

        SchemaRegistry {
            tables,
            by_name,
            outgoing,
            incoming,
        }
    }

    /// Load a registry snapshot from a JSON array of table schemas.
    pub fn from_json(raw: &str) -> Result<Self, SchemaError> {
        let tables: Vec<TableSchema> =
            serde_json::from_str(raw).map_err(|e| SchemaError::Load(e.to_string()))?;
        Ok(Self::new(tables))
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.by_name.get(name).map(|&i| &self.tables[i])
    }

    pub fn require(&self, name: &str) -> Result<&TableSchema, SchemaError> {
        self.get(name)
            .ok_or_else(|| SchemaError::UnknownTable(name.to_string()))
    }

    /// Foreign keys declared on `table` itself.
    pub fn outgoing(&self, table: &str) -> &[Relation] {
        self.outgoing.get(table).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Foreign keys on other tables that reference `table`.
    pub fn incoming(&self, table: &str) -> &[Relation] {
        self.incoming.get(table).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// True when the table participates in any relation, either direction.
    pub fn has_relations(&self, table: &str) -> bool {
        !self.outgoing(table).is_empty() || !self.incoming(table).is_empty()
    }
}

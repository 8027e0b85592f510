//! Permission catalogue derived from the schema snapshot: the canonical
//! `<table>:<action>` set per table plus inferred row conditions.

use crate::identity::{IdentityError, IdentityProvider};
use crate::permission::condition::PermissionCondition;
use crate::schema::SchemaRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    List,
    View,
    Create,
    Update,
    Delete,
    Export,
    Import,
}

impl Action {
    pub const BASE: [Action; 5] = [
        Action::List,
        Action::View,
        Action::Create,
        Action::Update,
        Action::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::List => "list",
            Action::View => "view",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Export => "export",
            Action::Import => "import",
        }
    }

    /// Actions whose conditions apply to one concrete row.
    pub fn is_resource_scoped(&self) -> bool {
        matches!(self, Action::View | Action::Update | Action::Delete)
    }

    pub fn permission_name(&self, table: &str) -> String {
        format!("{}:{}", table, self.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TablePermission {
    pub table: String,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub conditions: Vec<PermissionCondition>,
}

/// Per-table override for the heuristic condition inference: `None` disables
/// inference for the table, `Some(conds)` replaces the inferred set.
#[derive(Clone, Debug, Default)]
pub struct ConditionOverrides {
    per_table: HashMap<String, Option<Vec<PermissionCondition>>>,
}

impl ConditionOverrides {
    pub fn disable(mut self, table: impl Into<String>) -> Self {
        self.per_table.insert(table.into(), None);
        self
    }

    pub fn replace(mut self, table: impl Into<String>, conditions: Vec<PermissionCondition>) -> Self {
        self.per_table.insert(table.into(), Some(conditions));
        self
    }

    fn get(&self, table: &str) -> Option<&Option<Vec<PermissionCondition>>> {
        self.per_table.get(table)
    }
}

#[derive(Clone, Debug)]
pub struct PermissionCatalogue {
    by_table: HashMap<String, TablePermission>,
}

impl PermissionCatalogue {
    pub fn build(registry: &SchemaRegistry) -> Self {
        Self::build_with(registry, &ConditionOverrides::default())
    }

    pub fn build_with(registry: &SchemaRegistry, overrides: &ConditionOverrides) -> Self {
        let mut by_table = HashMap::new();
        for schema in registry.tables() {
            let mut actions = Action::BASE.to_vec();
            if registry.has_relations(&schema.name) {
                actions.push(Action::Export);
                actions.push(Action::Import);
            }

            let conditions = match overrides.get(&schema.name) {
                Some(None) => Vec::new(),
                Some(Some(explicit)) => explicit.clone(),
                None => infer_conditions(schema),
            };

            by_table.insert(
                schema.name.clone(),
                TablePermission {
                    table: schema.name.clone(),
                    actions,
                    conditions,
                },
            );
        }
        PermissionCatalogue { by_table }
    }

    pub fn table(&self, name: &str) -> Option<&TablePermission> {
        self.by_table.get(name)
    }

    /// Row conditions for a table; combined with AND semantics by callers.
    pub fn conditions(&self, table: &str) -> &[PermissionCondition] {
        self.by_table
            .get(table)
            .map(|t| t.conditions.as_slice())
            .unwrap_or(&[])
    }

    /// All `<table>:<action>` names, sorted and deduplicated.
    pub fn permission_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .by_table
            .values()
            .flat_map(|t| t.actions.iter().map(|a| a.permission_name(&t.table)))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Persist the catalogue through the identity service. Upsert-by-name:
    /// re-running never errors or duplicates.
    pub async fn apply(&self, identity: &dyn IdentityProvider) -> Result<(), IdentityError> {
        for name in self.permission_names() {
            identity.upsert_permission(&name).await?;
        }
        Ok(())
    }
}

/// Condition inference from column names: a `status`/`active` column must
/// equal "active"; a `user_id`/`userId` column must equal the requesting
/// principal's id (row ownership).
fn infer_conditions(schema: &crate::schema::TableSchema) -> Vec<PermissionCondition> {
    let mut conditions = Vec::new();
    for candidate in ["status", "active"] {
        if schema.has_column(candidate) {
            conditions.push(PermissionCondition::eq_literal(
                candidate,
                Value::String("active".to_string()),
            ));
            break;
        }
    }
    for candidate in ["user_id", "userId"] {
        if schema.has_column(candidate) {
            conditions.push(PermissionCondition::owned_by_current_user(candidate));
            break;
        }
    }
    conditions
}

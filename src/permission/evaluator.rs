//! Request-time permission checks: base `<table>:<action>` membership first,
//! then row conditions for resource-scoped actions. Storage errors deny.

use crate::auth::AuthContext;
use crate::permission::{Action, PermissionCatalogue, PermissionCondition};
use crate::store::{Filter, RecordStore};
use serde_json::Value;
use std::sync::Arc;

pub struct PermissionEvaluator {
    catalogue: Arc<PermissionCatalogue>,
    store: Arc<dyn RecordStore>,
}

impl PermissionEvaluator {
    pub fn new(catalogue: Arc<PermissionCatalogue>, store: Arc<dyn RecordStore>) -> Self {
        PermissionEvaluator { catalogue, store }
    }

    /// Resolve a table's conditions against the principal as store filters.
    /// `None` when a condition needs a principal id and there is none.
    pub fn resolved_conditions(&self, ctx: &AuthContext, table: &str) -> Option<Vec<Filter>> {
        let conditions = self.catalogue.conditions(table);
        let mut filters = Vec::with_capacity(conditions.len());
        for cond in conditions {
            if cond.references_current_user() && ctx.principal_id.is_none() {
                return None;
            }
            let principal = ctx.principal_id.as_deref().unwrap_or("");
            let (field, op, value) = cond.resolve(principal);
            filters.push(Filter::new(field, op, value));
        }
        Some(filters)
    }

    pub async fn check(
        &self,
        ctx: &AuthContext,
        table: &str,
        action: Action,
        resource_id: Option<&Value>,
        pk: &str,
    ) -> bool {
        // Conditions are never evaluated without the base permission.
        if !ctx.permissions.contains(&action.permission_name(table)) {
            return false;
        }
        let Some(id) = resource_id else {
            return true;
        };
        if !action.is_resource_scoped() {
            return true;
        }
        if self.catalogue.conditions(table).is_empty() {
            return true;
        }
        let Some(mut filters) = self.resolved_conditions(ctx, table) else {
            return false;
        };
        filters.insert(0, Filter::eq(pk, id.clone()));
        match self.store.find_one(table, &filters).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                // Fail closed: a storage failure during a condition check is a
                // denial, not a 500.
                tracing::warn!(table = %table, action = %action.as_str(), error = %e, "condition check failed, denying");
                false
            }
        }
    }

    pub fn conditions(&self, table: &str) -> &[PermissionCondition] {
        self.catalogue.conditions(table)
    }
}

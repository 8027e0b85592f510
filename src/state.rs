//! Shared application state: immutable artifacts built once at boot.
//! Schema changes require a process restart; there is no reload protocol.

use crate::identity::{IdentityError, IdentityProvider};
use crate::permission::{ConditionOverrides, PermissionCatalogue, PermissionEvaluator};
use crate::schema::SchemaRegistry;
use crate::store::RecordStore;
use crate::validate::ValidatorSet;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SchemaRegistry>,
    pub validators: Arc<HashMap<String, ValidatorSet>>,
    pub catalogue: Arc<PermissionCatalogue>,
    pub evaluator: Arc<PermissionEvaluator>,
    pub store: Arc<dyn RecordStore>,
    pub identity: Arc<dyn IdentityProvider>,
    /// When false, handlers skip authentication and permission checks.
    pub auth_enabled: bool,
}

impl AppState {
    pub fn build(
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn RecordStore>,
        identity: Arc<dyn IdentityProvider>,
        auth_enabled: bool,
    ) -> Self {
        Self::build_with(registry, store, identity, auth_enabled, &ConditionOverrides::default())
    }

    pub fn build_with(
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn RecordStore>,
        identity: Arc<dyn IdentityProvider>,
        auth_enabled: bool,
        overrides: &ConditionOverrides,
    ) -> Self {
        let validators: HashMap<String, ValidatorSet> = registry
            .tables()
            .iter()
            .map(|t| (t.name.clone(), ValidatorSet::synthesize(t)))
            .collect();
        let catalogue = Arc::new(PermissionCatalogue::build_with(&registry, overrides));
        let evaluator = Arc::new(PermissionEvaluator::new(catalogue.clone(), store.clone()));
        AppState {
            registry,
            validators: Arc::new(validators),
            catalogue,
            evaluator,
            store,
            identity,
            auth_enabled,
        }
    }

    pub fn validator_set(&self, table: &str) -> Option<&ValidatorSet> {
        self.validators.get(table)
    }

    /// Persist the permission catalogue through the identity service.
    /// Idempotent; typically called once at boot.
    pub async fn apply_permissions(&self) -> Result<(), IdentityError> {
        self.catalogue.apply(self.identity.as_ref()).await
    }
}

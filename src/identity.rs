//! Identity service seam: token authentication, role-backed permission sets,
//! and the persisted permission store the catalogue writes through.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("identity backend: {0}")]
    Backend(String),
}

/// Authenticated actor. `permissions` is the effective set: the union of the
/// permissions of every assigned role, deduplicated by the provider.
#[derive(Clone, Debug)]
pub struct Principal {
    pub id: String,
    pub permissions: HashSet<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer token. `Ok(None)` means the token is invalid or
    /// expired.
    async fn authenticate(&self, token: &str) -> Result<Option<Principal>, IdentityError>;

    /// Create a permission record by name if absent. Idempotent.
    async fn upsert_permission(&self, name: &str) -> Result<(), IdentityError>;

    /// Names currently in the permission store.
    async fn stored_permissions(&self) -> Result<Vec<String>, IdentityError>;
}

/// In-memory identity provider for tests and embedded setups. Roles hold
/// permission names; a token maps to a principal id plus assigned roles.
#[derive(Default)]
pub struct StaticIdentityProvider {
    roles: HashMap<String, HashSet<String>>,
    tokens: HashMap<String, (String, Vec<String>)>,
    store: Mutex<BTreeSet<String>>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, name: impl Into<String>, permissions: &[&str]) -> Self {
        self.roles.insert(
            name.into(),
            permissions.iter().map(|p| p.to_string()).collect(),
        );
        self
    }

    pub fn token(mut self, token: impl Into<String>, principal_id: impl Into<String>, roles: &[&str]) -> Self {
        self.tokens.insert(
            token.into(),
            (
                principal_id.into(),
                roles.iter().map(|r| r.to_string()).collect(),
            ),
        );
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn authenticate(&self, token: &str) -> Result<Option<Principal>, IdentityError> {
        let Some((id, roles)) = self.tokens.get(token) else {
            return Ok(None);
        };
        let mut permissions = HashSet::new();
        for role in roles {
            if let Some(perms) = self.roles.get(role) {
                permissions.extend(perms.iter().cloned());
            }
        }
        Ok(Some(Principal {
            id: id.clone(),
            permissions,
        }))
    }

    async fn upsert_permission(&self, name: &str) -> Result<(), IdentityError> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| IdentityError::Backend("permission store lock poisoned".into()))?;
        store.insert(name.to_string());
        Ok(())
    }

    async fn stored_permissions(&self) -> Result<Vec<String>, IdentityError> {
        let store = self
            .store
            .lock()
            .map_err(|_| IdentityError::Backend("permission store lock poisoned".into()))?;
        Ok(store.iter().cloned().collect())
    }
}

//! Per-request authentication context, supplied by the identity service.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::collections::HashSet;

#[derive(Clone, Debug)]
pub struct AuthContext {
    pub principal_id: Option<String>,
    pub permissions: HashSet<String>,
    pub is_authenticated: bool,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        AuthContext {
            principal_id: None,
            permissions: HashSet::new(),
            is_authenticated: false,
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(AuthContext::anonymous());
        };
        let principal = state
            .identity
            .authenticate(token)
            .await
            .map_err(|e| {
                // Identity backend failure: treat the principal as
                // unauthenticated rather than surfacing internals.
                tracing::warn!(error = %e, "identity backend failure during authentication");
                AppError::Unauthenticated
            })?
            .ok_or(AppError::Unauthenticated)?;
        Ok(AuthContext {
            principal_id: Some(principal.id),
            permissions: principal.permissions,
            is_authenticated: true,
        })
    }
}

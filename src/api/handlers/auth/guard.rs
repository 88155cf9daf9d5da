//! Access guard: per-request session validation and role checks.
//!
//! Protected sub-routers attach [`access_guard`] with a [`RequiredRoles`]
//! extension layered outside it; composing the two wraps every handler under
//! the router in the same decision.
//!
//! The guard audits only its two failure paths (`ACCESS_401`, `ACCESS_403`).
//! Ordinary passes stay silent here so the trail carries one
//! business-meaningful event per request, written by the handler itself.

use axum::{
    extract::{ConnectInfo, Extension, Request},
    middleware::Next,
    response::Response,
};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tracing::error;

use crate::api::error::ApiError;
use crate::api::handlers::audit::{actions, record, Outcome};

use super::state::AuthState;
use super::storage::lookup_account;
use super::types::Role;
use super::utils::{extract_bearer_token, extract_client_ip};

/// Authenticated operator context, inserted into request extensions on a
/// successful pass and read by handlers via `Extension<Principal>`.
#[derive(Clone, Debug)]
pub struct Principal {
    pub account_id: uuid::Uuid,
    pub username: String,
    pub role: Role,
}

/// Role set a protected sub-router requires. Attach as a route layer outside
/// the guard; absent means any authenticated operator passes.
#[derive(Clone, Copy, Debug)]
pub struct RequiredRoles(pub &'static [Role]);

pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Middleware protecting every route layered under it.
///
/// A malformed or missing bearer header is treated the same as no token at
/// all. Both failure paths emit an audit event before rejecting.
pub async fn access_guard(
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Extension(pool): Extension<PgPool>,
    Extension(auth_state): Extension<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = extract_client_ip(request.headers(), peer);
    let resource = request.uri().path().to_string();

    let account_id = match extract_bearer_token(request.headers()) {
        Some(token) => auth_state.sessions().validate(&token).await,
        None => None,
    };

    let account = match account_id {
        Some(id) => match lookup_account(&pool, id).await {
            Ok(found) => found,
            Err(err) => {
                error!("Failed to resolve session account: {err:#}");
                return Err(ApiError::Internal(err));
            }
        },
        None => None,
    };

    let Some(account) = account else {
        record(
            &pool,
            None,
            actions::ACCESS_401,
            &resource,
            Outcome::Failed,
            Some(ip.as_str()),
            None,
        )
        .await;
        return Err(ApiError::Unauthenticated);
    };

    if let Some(RequiredRoles(required)) = request.extensions().get::<RequiredRoles>() {
        if !required.contains(&account.role) {
            record(
                &pool,
                Some(account.id),
                actions::ACCESS_403,
                &resource,
                Outcome::Failed,
                Some(ip.as_str()),
                None,
            )
            .await;
            return Err(ApiError::Forbidden);
        }
    }

    request.extensions_mut().insert(Principal {
        account_id: account.id,
        username: account.username,
        role: account.role,
    });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_roles_membership() {
        let RequiredRoles(required) = RequiredRoles(ADMIN_ONLY);
        assert!(required.contains(&Role::Admin));
        assert!(!required.contains(&Role::Technician));
        assert!(!required.contains(&Role::Psychiatrist));
    }

    #[test]
    fn principal_is_cloneable_for_extensions() {
        let principal = Principal {
            account_id: uuid::Uuid::new_v4(),
            username: "alice".to_string(),
            role: Role::Admin,
        };
        let copy = principal.clone();
        assert_eq!(copy.account_id, principal.account_id);
        assert_eq!(copy.username, "alice");
    }
}

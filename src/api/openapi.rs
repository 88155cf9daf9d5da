#![allow(clippy::needless_for_each)]

use crate::api::handlers::{
    audit,
    audit::{__path_get_logs, __path_get_stats},
    auth::login::{__path_login, __path_logout, __path_session},
    auth::types,
    health,
    health::__path_health,
    users,
    users::{__path_list, __path_lock, __path_reset_password, __path_unlock},
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        login,
        session,
        logout,
        list,
        unlock,
        lock,
        reset_password,
        get_logs,
        get_stats
    ),
    components(schemas(
        health::Health,
        types::Role,
        types::LoginRequest,
        types::LoginResponse,
        types::SessionResponse,
        types::LogoutResponse,
        users::UserSummary,
        users::ResetPasswordRequest,
        users::UserActionResponse,
        users::OkResponse,
        audit::AuditLogEntry,
        audit::AuditLogsResponse,
        audit::AuditStatsResponse
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Login, session introspection and logout"),
        (name = "users", description = "Administrative account operations"),
        (name = "audit", description = "Audit trail queries and daily statistics"),
        (name = "health", description = "Service health")
    )
)]
struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .build(),
                ),
            );
        }
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_all_routes() {
        let spec = openapi();
        for path in [
            "/health",
            "/api/auth/login",
            "/api/auth/session",
            "/api/auth/logout",
            "/api/users",
            "/api/users/{id}/unlock",
            "/api/users/{id}/lock",
            "/api/users/{id}/reset-password",
            "/api/audit/logs",
            "/api/audit/stats",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing path: {path}");
        }
    }

    #[test]
    fn openapi_has_bearer_scheme() {
        let spec = openapi();
        let components = spec.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
    }

    #[test]
    fn openapi_tags() {
        let spec = openapi();
        let tags = spec.tags.unwrap_or_default();
        for name in ["auth", "users", "audit", "health"] {
            assert!(tags.iter().any(|tag| tag.name == name), "missing tag: {name}");
        }
    }
}

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::auth::token;
use crate::error::ApiError;
use crate::rbac::Permission;
use crate::store::AppState;

/// Authenticated principal extracted from a bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_name: String,
    pub permissions: Vec<Permission>,
    pub ip_addr: Option<String>,
}

impl AuthUser {
    pub fn has_permission(&self, perm: Permission) -> bool {
        self.permissions.contains(&perm)
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ip_addr = extract_ip(parts, state.config.trust_proxy_headers);

        let Some(raw_token) = extract_bearer_token(parts) else {
            return Err(ApiError::Unauthorized);
        };

        let hash = token::hash_token(&raw_token);
        let Some(principal) = state.principals.lookup_token(&hash).await? else {
            tracing::debug!(ip = ?ip_addr, "unknown api token");
            return Err(ApiError::Unauthorized);
        };
        if !principal.is_active {
            return Err(ApiError::Unauthorized);
        }

        Ok(Self {
            user_name: principal.user_name,
            permissions: principal.permissions,
            ip_addr,
        })
    }
}

/// Optional auth: `None` for unauthenticated requests instead of 401.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for OptionalAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(Self(Some(user))),
            Err(ApiError::Unauthorized) => Ok(Self(None)),
            Err(e) => Err(e),
        }
    }
}

fn extract_bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    if token.is_empty() {
        return None;
    }
    Some(token.to_owned())
}

fn extract_ip(parts: &Parts, trust_proxy: bool) -> Option<String> {
    // Only trust X-Forwarded-For when behind a configured reverse proxy
    if trust_proxy
        && let Some(forwarded) = parts.headers.get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(first_ip) = val.split(',').next()
    {
        return Some(first_ip.trim().to_owned());
    }
    parts
        .extensions
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
}

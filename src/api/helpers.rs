use crate::auth::middleware::AuthUser;
use crate::error::ApiError;
use crate::rbac::Permission;
use crate::store::AppState;

/// Return the caller if it holds `perm`, Forbidden otherwise. An anonymous
/// caller is also Forbidden, so this can run after a nonce check.
pub fn require_permission(auth: Option<&AuthUser>, perm: Permission) -> Result<&AuthUser, ApiError> {
    match auth {
        Some(user) if user.has_permission(perm) => Ok(user),
        Some(user) => {
            tracing::warn!(user = %user.user_name, permission = %perm, "permission denied");
            Err(ApiError::Forbidden)
        }
        None => Err(ApiError::Forbidden),
    }
}

/// Verify an action nonce for the caller (anonymous callers bind to `""`).
pub fn check_nonce(
    state: &AppState,
    nonce: &str,
    action: &str,
    auth: Option<&AuthUser>,
) -> Result<(), ApiError> {
    let principal = auth.map_or("", |u| u.user_name.as_str());
    if state.nonces.verify(nonce, action, principal) {
        Ok(())
    } else {
        tracing::warn!(action, principal, "rejected request with invalid nonce");
        Err(ApiError::InvalidNonce)
    }
}

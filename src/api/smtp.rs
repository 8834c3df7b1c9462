use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::helpers::{check_nonce, require_permission};
use crate::auth::middleware::{AuthUser, OptionalAuthUser};
use crate::error::ApiError;
use crate::mail::test_send::{self, TestSendError};
use crate::rbac::Permission;
use crate::settings::sanitize::{RawSettings, sanitize};
use crate::settings::{self, SettingsRecord, validate};
use crate::store::AppState;

pub const SAVE_NONCE_ACTION: &str = "smtp_settings_save";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Settings as shown to the client. The password is never echoed back.
#[derive(Debug, Serialize)]
pub struct SettingsView {
    #[serde(flatten)]
    pub record: SettingsRecord,
    pub has_password: bool,
}

impl From<SettingsRecord> for SettingsView {
    fn from(mut record: SettingsRecord) -> Self {
        let has_password = !record.smtp_pass.is_empty();
        record.smtp_pass.clear();
        Self {
            record,
            has_password,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Nonces {
    pub save: String,
    pub test: String,
}

#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub settings: SettingsView,
    pub issues: Vec<String>,
    pub nonces: Nonces,
    /// Placeholder for the test recipient field.
    pub default_admin_email: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub nonce: String,
    pub settings: RawSettings,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub settings: SettingsView,
    pub issues: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TestRequest {
    pub nonce: String,
    #[serde(default)]
    pub test_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TestResponse {
    pub success: bool,
    pub data: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/smtp", get(render).put(save))
        .route("/api/admin/smtp/test", post(send_test))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[tracing::instrument(skip(state, auth), fields(user = %auth.user_name), err)]
async fn render(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<RenderResponse>, ApiError> {
    require_permission(Some(&auth), Permission::SettingsRead)?;

    let record = settings::load(state.settings.as_ref()).await?;
    let issues = validate::issues(&record);

    Ok(Json(RenderResponse {
        settings: record.into(),
        issues,
        nonces: Nonces {
            save: state.nonces.issue(SAVE_NONCE_ACTION, &auth.user_name),
            test: state.nonces.issue(test_send::NONCE_ACTION, &auth.user_name),
        },
        default_admin_email: state.config.admin_email.clone(),
    }))
}

#[tracing::instrument(skip(state, auth, body), err)]
async fn save(
    State(state): State<AppState>,
    OptionalAuthUser(auth): OptionalAuthUser,
    Json(body): Json<SaveRequest>,
) -> Result<Json<SaveResponse>, ApiError> {
    check_nonce(&state, &body.nonce, SAVE_NONCE_ACTION, auth.as_ref())?;
    let auth = require_permission(auth.as_ref(), Permission::SettingsWrite)?;

    let previous = settings::load(state.settings.as_ref()).await?;
    let record = sanitize(&body.settings, Some(&previous));
    settings::save(state.settings.as_ref(), &record).await?;

    let issues = validate::issues(&record);
    tracing::info!(
        user = %auth.user_name,
        ip = ?auth.ip_addr,
        enabled = record.is_enabled(),
        password_changed = record.smtp_pass != previous.smtp_pass,
        issues = issues.len(),
        "smtp settings saved"
    );

    Ok(Json(SaveResponse {
        settings: record.into(),
        issues,
    }))
}

async fn send_test(
    State(state): State<AppState>,
    OptionalAuthUser(auth): OptionalAuthUser,
    Json(body): Json<TestRequest>,
) -> Result<Json<TestResponse>, TestSendError> {
    let data = test_send::send_test(
        &state,
        auth.as_ref(),
        &body.nonce,
        body.test_email.as_deref(),
    )
    .await?;
    Ok(Json(TestResponse {
        success: true,
        data,
    }))
}

use crate::auth::token;
use crate::config::Config;
use crate::rbac::Permission;
use crate::settings;
use crate::store::{AppState, PrincipalRecord};

pub const ADMIN_USER: &str = "admin";

/// Seed the admin principal and make sure the settings record exists.
///
/// With `MAILCFG_ADMIN_TOKEN` set, that token is (re)registered with every
/// permission. In dev mode without one, a fresh token is generated and logged.
#[tracing::instrument(skip(state), err)]
pub async fn run(state: &AppState) -> anyhow::Result<()> {
    if let Some(raw) = admin_token(&state.config) {
        let principal = PrincipalRecord {
            user_name: ADMIN_USER.into(),
            permissions: Permission::ALL.to_vec(),
            is_active: true,
        };
        state
            .principals
            .upsert_token(&token::hash_token(&raw), &principal)
            .await?;
        tracing::info!(user = ADMIN_USER, "admin token registered");
    } else {
        tracing::info!("no admin token configured; using existing principals");
    }

    settings::load(state.settings.as_ref()).await?;
    Ok(())
}

fn admin_token(config: &Config) -> Option<String> {
    if let Some(raw) = &config.admin_token {
        return Some(raw.clone());
    }
    if config.dev_mode {
        let (raw, _) = token::generate_api_token();
        tracing::warn!(token = %raw, "dev mode: generated admin token");
        return Some(raw);
    }
    None
}

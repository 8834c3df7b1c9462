pub mod bootstrap;
pub mod memory;
pub mod pg;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::auth::nonce::NonceKey;
use crate::config::Config;
use crate::mail::mailer::Mailer;
use crate::rbac::Permission;

/// Named JSON option storage. `set` replaces the whole value.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, name: &str) -> anyhow::Result<Option<Value>>;
    async fn set(&self, name: &str, value: Value) -> anyhow::Result<()>;
}

/// An API token holder, keyed by the token's SHA-256 hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalRecord {
    pub user_name: String,
    pub permissions: Vec<Permission>,
    pub is_active: bool,
}

#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Look up an unexpired token by hash.
    async fn lookup_token(&self, token_hash: &str) -> anyhow::Result<Option<PrincipalRecord>>;
    async fn upsert_token(&self, token_hash: &str, principal: &PrincipalRecord)
    -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<dyn SettingsStore>,
    pub principals: Arc<dyn PrincipalStore>,
    pub mailer: Arc<dyn Mailer>,
    pub nonces: NonceKey,
    pub config: Arc<Config>,
}

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;

use super::{PrincipalRecord, PrincipalStore, SettingsStore};
use crate::rbac::Permission;

/// Postgres-backed option and token storage.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[tracing::instrument(skip(url), err)]
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;

        tracing::info!("connected to postgres");

        sqlx::migrate!().run(&pool).await?;
        tracing::info!("migrations applied");

        Ok(Self { pool })
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn get(&self, name: &str) -> anyhow::Result<Option<Value>> {
        let row: Option<(Json<Value>,)> =
            sqlx::query_as("SELECT value FROM options WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(Json(value),)| value))
    }

    async fn set(&self, name: &str, value: Value) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO options (name, value, updated_at)
             VALUES ($1, $2, now())
             ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
        )
        .bind(name)
        .bind(Json(value))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PrincipalStore for PgStore {
    async fn lookup_token(&self, token_hash: &str) -> anyhow::Result<Option<PrincipalRecord>> {
        let row: Option<(String, Vec<String>, bool)> = sqlx::query_as(
            "SELECT user_name, permissions, is_active FROM api_tokens
             WHERE token_hash = $1 AND (expires_at IS NULL OR expires_at > now())",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        let Some((user_name, names, is_active)) = row else {
            return Ok(None);
        };

        // Names this build does not know are ignored rather than failing auth.
        let permissions = names
            .iter()
            .filter_map(|name| match name.parse::<Permission>() {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(permission = %name, error = %e, "ignoring stored permission");
                    None
                }
            })
            .collect();

        Ok(Some(PrincipalRecord {
            user_name,
            permissions,
            is_active,
        }))
    }

    async fn upsert_token(
        &self,
        token_hash: &str,
        principal: &PrincipalRecord,
    ) -> anyhow::Result<()> {
        let names: Vec<String> = principal
            .permissions
            .iter()
            .map(|p| p.as_str().to_owned())
            .collect();
        sqlx::query(
            "INSERT INTO api_tokens (token_hash, user_name, permissions, is_active)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (token_hash) DO UPDATE
             SET user_name = EXCLUDED.user_name,
                 permissions = EXCLUDED.permissions,
                 is_active = EXCLUDED.is_active",
        )
        .bind(token_hash)
        .bind(&principal.user_name)
        .bind(&names)
        .bind(principal.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

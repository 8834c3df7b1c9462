//! Process-local store used when no database is configured, and by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{PrincipalRecord, PrincipalStore, SettingsStore};

#[derive(Debug, Default)]
pub struct MemoryStore {
    options: RwLock<HashMap<String, Value>>,
    tokens: RwLock<HashMap<String, PrincipalRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, name: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.options.read().await.get(name).cloned())
    }

    async fn set(&self, name: &str, value: Value) -> anyhow::Result<()> {
        self.options.write().await.insert(name.to_owned(), value);
        Ok(())
    }
}

#[async_trait]
impl PrincipalStore for MemoryStore {
    async fn lookup_token(&self, token_hash: &str) -> anyhow::Result<Option<PrincipalRecord>> {
        Ok(self.tokens.read().await.get(token_hash).cloned())
    }

    async fn upsert_token(
        &self,
        token_hash: &str,
        principal: &PrincipalRecord,
    ) -> anyhow::Result<()> {
        self.tokens
            .write()
            .await
            .insert(token_hash.to_owned(), principal.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::Permission;

    #[tokio::test]
    async fn set_replaces_value() {
        let store = MemoryStore::new();
        store.set("k", serde_json::json!({"a": 1})).await.unwrap();
        store.set("k", serde_json::json!({"b": 2})).await.unwrap();
        assert_eq!(
            store.get("k").await.unwrap(),
            Some(serde_json::json!({"b": 2}))
        );
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn token_upsert_overwrites() {
        let store = MemoryStore::new();
        let mut principal = PrincipalRecord {
            user_name: "admin".into(),
            permissions: vec![Permission::SettingsRead],
            is_active: true,
        };
        store.upsert_token("h", &principal).await.unwrap();
        principal.permissions = Permission::ALL.to_vec();
        store.upsert_token("h", &principal).await.unwrap();

        let found = store.lookup_token("h").await.unwrap().unwrap();
        assert_eq!(found.permissions, Permission::ALL);
        assert!(store.lookup_token("other").await.unwrap().is_none());
    }
}

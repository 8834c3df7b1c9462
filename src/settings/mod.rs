pub mod sanitize;
pub mod validate;

use serde::{Deserialize, Deserializer, Serialize};

use crate::mail::address;
use crate::store::SettingsStore;

/// Key under which the settings record is persisted.
pub const OPTION_NAME: &str = "smtp_settings";

/// The persisted SMTP configuration. Every field is string-encoded; flags are
/// `"0"` / `"1"`. Missing keys in a stored record fall back to [`Default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub smtp_host: String,
    #[serde(deserialize_with = "lenient_string")]
    pub smtp_port: String,
    #[serde(deserialize_with = "lenient_string")]
    pub smtp_auth: String,
    #[serde(deserialize_with = "lenient_string")]
    pub smtp_user: String,
    #[serde(deserialize_with = "lenient_string")]
    pub smtp_pass: String,
    #[serde(deserialize_with = "lenient_string")]
    pub smtp_secure: String,
    #[serde(deserialize_with = "lenient_string")]
    pub from_email: String,
    #[serde(deserialize_with = "lenient_string")]
    pub from_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub enable_smtp: String,
    #[serde(deserialize_with = "lenient_string")]
    pub admin_email: String,
    #[serde(deserialize_with = "lenient_string")]
    pub test_email: String,
}

impl Default for SettingsRecord {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: "587".into(),
            smtp_auth: "0".into(),
            smtp_user: String::new(),
            smtp_pass: String::new(),
            smtp_secure: "tls".into(),
            from_email: String::new(),
            from_name: String::new(),
            enable_smtp: "0".into(),
            admin_email: String::new(),
            test_email: String::new(),
        }
    }
}

impl SettingsRecord {
    /// SMTP override is active only for the exact flag value `"1"`.
    pub fn is_enabled(&self) -> bool {
        self.enable_smtp == "1"
    }

    pub fn auth_enabled(&self) -> bool {
        self.smtp_auth == "1"
    }

    /// The configured sender, if it is a usable address.
    pub fn valid_from_email(&self) -> Option<&str> {
        address::is_email(&self.from_email).then_some(self.from_email.as_str())
    }
}

/// Stored values written by other tools may be numbers or booleans; read
/// them back in their string form.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Str(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Str(s)) => s,
        Some(Scalar::Int(n)) => n.to_string(),
        Some(Scalar::Float(n)) => n.to_string(),
        Some(Scalar::Bool(b)) => String::from(if b { "1" } else { "0" }),
        None => String::new(),
    })
}

/// Read the settings snapshot, persisting the defaults on first access.
#[tracing::instrument(skip(store), err)]
pub async fn load(store: &dyn SettingsStore) -> anyhow::Result<SettingsRecord> {
    if let Some(value) = store.get(OPTION_NAME).await? {
        return serde_json::from_value(value)
            .map_err(|e| anyhow::anyhow!("stored settings record is malformed: {e}"));
    }

    let record = SettingsRecord::default();
    store.set(OPTION_NAME, serde_json::to_value(&record)?).await?;
    tracing::info!("settings record initialised with defaults");
    Ok(record)
}

#[tracing::instrument(skip(store, record), err)]
pub async fn save(store: &dyn SettingsStore, record: &SettingsRecord) -> anyhow::Result<()> {
    store.set(OPTION_NAME, serde_json::to_value(record)?).await
}

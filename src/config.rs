use std::env;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::mail::transport::{SiteIdentity, TransportPolicy};

#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub database_url: Option<String>,
    pub site_name: String,
    pub admin_email: String,
    pub default_from: String,
    pub sendmail_command: Option<String>,
    pub smtp_verify_tls: bool,
    pub smtp_timeout_secs: u64,
    pub debug: bool,
    pub log: Option<String>,
    pub nonce_secret: Option<String>,
    pub admin_token: Option<String>,
    pub trust_proxy_headers: bool,
    pub dev_mode: bool,
}

fn is_true(v: &str) -> bool {
    matches!(v.trim(), "true" | "1")
}

impl Config {
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            listen: var("MAILCFG_LISTEN").unwrap_or_else(|| "0.0.0.0:8080".into()),
            database_url: var("DATABASE_URL"),
            site_name: var("MAILCFG_SITE_NAME").unwrap_or_else(|| "mailcfg".into()),
            admin_email: var("MAILCFG_ADMIN_EMAIL").unwrap_or_default(),
            default_from: var("MAILCFG_DEFAULT_FROM")
                .unwrap_or_else(|| "noreply@localhost".into()),
            sendmail_command: var("MAILCFG_SENDMAIL_COMMAND"),
            smtp_verify_tls: var("MAILCFG_SMTP_VERIFY_TLS").is_some_and(|v| is_true(&v)),
            smtp_timeout_secs: var("MAILCFG_SMTP_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            debug: var("MAILCFG_DEBUG").is_some_and(|v| is_true(&v)),
            log: var("MAILCFG_LOG"),
            nonce_secret: var("MAILCFG_NONCE_SECRET"),
            admin_token: var("MAILCFG_ADMIN_TOKEN"),
            trust_proxy_headers: var("MAILCFG_TRUST_PROXY").is_some_and(|v| is_true(&v)),
            dev_mode: var("MAILCFG_DEV").is_some_and(|v| is_true(&v)),
        }
    }

    /// Filter directives for the log subscriber. Debug mode also enables
    /// lettre's SMTP dialogue unless `MAILCFG_LOG` already sets lettre.
    pub fn log_directives(&self) -> String {
        let base = self.log.as_deref().unwrap_or("info");
        if self.debug && !base.contains("lettre") {
            format!("{base},lettre=debug")
        } else {
            base.to_owned()
        }
    }

    pub fn log_filter(&self) -> EnvFilter {
        EnvFilter::try_new(self.log_directives()).unwrap_or_else(|_| "info".into())
    }

    pub fn site_identity(&self) -> SiteIdentity {
        SiteIdentity {
            name: self.site_name.clone(),
            admin_email: self.admin_email.clone(),
            default_from: self.default_from.clone(),
        }
    }

    pub fn transport_policy(&self) -> TransportPolicy {
        TransportPolicy {
            sendmail_command: self.sendmail_command.clone(),
            verify_tls: self.smtp_verify_tls,
            timeout: Duration::from_secs(self.smtp_timeout_secs),
            debug: self.debug,
        }
    }
}

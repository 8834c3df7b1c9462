//! Outbound transport parameters derived from the stored settings.

use std::fmt;
use std::time::Duration;

use super::Sender;
use crate::settings::SettingsRecord;

/// Port used when the stored value does not parse.
pub const DEFAULT_SMTP_PORT: u16 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Local sendmail binary.
    Sendmail,
    Smtp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    None,
    /// Plain connection upgraded with STARTTLS; upgrade is mandatory.
    StartTls,
    /// TLS from the first byte.
    Implicit,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("pass", &"[redacted]")
            .finish()
    }
}

/// Site-wide identity used when the settings do not provide one.
#[derive(Debug, Clone)]
pub struct SiteIdentity {
    pub name: String,
    pub admin_email: String,
    pub default_from: String,
}

impl SiteIdentity {
    pub fn default_sender(&self) -> Sender {
        Sender {
            email: self.default_from.clone(),
            name: self.name.clone(),
        }
    }
}

/// Deployment-level transport knobs that are not part of the stored settings.
#[derive(Debug, Clone)]
pub struct TransportPolicy {
    pub sendmail_command: Option<String>,
    pub verify_tls: bool,
    pub timeout: Duration,
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub mode: Mode,
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
    pub security: Security,
    /// Upgrade with STARTTLS when the server offers it, even with `Security::None`.
    pub opportunistic_tls: bool,
    /// Pinned sender; `None` leaves the message's own sender in place.
    pub from: Option<Sender>,
    pub envelope_sender: Option<String>,
    pub verify_tls: bool,
    pub timeout: Duration,
    pub debug: bool,
    pub sendmail_command: Option<String>,
}

impl TransportConfig {
    /// Default transport: local sendmail, nothing pinned.
    pub fn ambient(policy: &TransportPolicy) -> Self {
        Self {
            mode: Mode::Sendmail,
            host: "localhost".into(),
            port: DEFAULT_SMTP_PORT,
            credentials: None,
            security: Security::None,
            opportunistic_tls: true,
            from: None,
            envelope_sender: None,
            verify_tls: policy.verify_tls,
            timeout: policy.timeout,
            debug: false,
            sendmail_command: policy.sendmail_command.clone(),
        }
    }
}

/// Point `transport` at the configured SMTP server. Leaves it untouched when
/// the override is disabled.
pub fn configure(
    transport: &mut TransportConfig,
    record: &SettingsRecord,
    identity: &SiteIdentity,
    policy: &TransportPolicy,
) {
    if !record.is_enabled() {
        return;
    }

    transport.mode = Mode::Smtp;
    transport.host.clone_from(&record.smtp_host);
    transport.port = parse_port(&record.smtp_port);

    transport.credentials = record.auth_enabled().then(|| Credentials {
        user: record.smtp_user.clone(),
        pass: record.smtp_pass.clone(),
    });

    let (security, opportunistic) = match record.smtp_secure.as_str() {
        "" => (Security::None, false),
        "ssl" => (Security::Implicit, true),
        _ => (Security::StartTls, true),
    };
    transport.security = security;
    transport.opportunistic_tls = opportunistic;

    let email = record
        .valid_from_email()
        .map_or_else(|| identity.admin_email.clone(), str::to_owned);
    let name = if record.from_name.is_empty() {
        identity.name.clone()
    } else {
        record.from_name.clone()
    };
    transport.envelope_sender = Some(email.clone());
    transport.from = Some(Sender { email, name });

    transport.verify_tls = policy.verify_tls;
    transport.timeout = policy.timeout;
    transport.debug = policy.debug;
}

fn parse_port(value: &str) -> u16 {
    match value.trim().parse::<u16>() {
        Ok(0) | Err(_) => DEFAULT_SMTP_PORT,
        Ok(port) => port,
    }
}

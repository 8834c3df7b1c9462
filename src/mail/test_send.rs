//! One-off test message that verifies the stored SMTP settings.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::address::{is_email, sanitize_email};
use super::{BodyFormat, OutgoingMail, Sender, TransportError, dispatch};
use crate::auth::middleware::AuthUser;
use crate::rbac::Permission;
use crate::settings::{self, SettingsRecord};
use crate::store::AppState;

pub const NONCE_ACTION: &str = "smtp_test_email";

const TEMPLATE_NAME: &str = "test_email.html";

const TEMPLATE: &str = "\
To jest testowa wiadomość e-mail wysłana z serwisu {{ site }} w celu sprawdzenia konfiguracji SMTP. \
Jeśli otrzymałeś tę wiadomość, oznacza to, że Twoje ustawienia SMTP działają poprawnie.<br><br>\
Użyte ustawienia:<br>\
- Serwer: {{ host }}<br>\
- Port: {{ port }}<br>\
- Zabezpieczenie: {{ security }}<br>\
- Uwierzytelnianie: {{ auth }}<br>\
- Nadawca: {{ sender }}<br>\
- Odbiorca testu: {{ recipient }}<br>\
<br>Czas wysłania: {{ sent_at }}<br>";

#[derive(Debug, thiserror::Error)]
pub enum TestSendError {
    #[error("Nieprawidłowy lub wygasły token bezpieczeństwa. Odśwież stronę i spróbuj ponownie.")]
    InvalidNonce,

    #[error("Brak uprawnień.")]
    Forbidden,

    #[error("SMTP nie jest włączone w ustawieniach. Włącz SMTP i zapisz ustawienia przed testem.")]
    SmtpDisabled,

    #[error("Serwer SMTP nie jest skonfigurowany. Wprowadź adres serwera SMTP i zapisz ustawienia.")]
    HostMissing,

    #[error(
        "Adres e-mail nadawcy jest nieprawidłowy. Wprowadź poprawny adres e-mail nadawcy i zapisz ustawienia."
    )]
    SenderInvalid,

    #[error("Adres e-mail odbiorcy jest nieprawidłowy. Wprowadź poprawny adres e-mail odbiorcy.")]
    RecipientInvalid,

    #[error("{}", delivery_message(.0))]
    Delivery(TransportError),

    #[error("Wystąpił błąd wewnętrzny. Spróbuj ponownie później.")]
    Internal(#[from] anyhow::Error),
}

fn delivery_message(err: &TransportError) -> String {
    match err.last_error() {
        Some(detail) => format!("Nie udało się wysłać e-maila testowego. Błąd: {detail}"),
        None => "Nie udało się wysłać e-maila testowego. Sprawdź ustawienia serwera SMTP i upewnij się, \
                 że adres e-mail nadawcy jest prawidłowy."
            .to_owned(),
    }
}

impl TestSendError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidNonce | Self::Forbidden => StatusCode::FORBIDDEN,
            Self::SmtpDisabled | Self::HostMissing | Self::SenderInvalid | Self::RecipientInvalid => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Delivery(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TestSendError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            tracing::error!(error = %err, "test send failed internally");
        }
        let body = serde_json::json!({ "success": false, "data": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

/// Run every check, then send one test message. Returns the success text.
#[tracing::instrument(
    skip(state, user, nonce),
    fields(user = user.map(|u| u.user_name.as_str())),
    err(Display)
)]
pub async fn send_test(
    state: &AppState,
    user: Option<&AuthUser>,
    nonce: &str,
    recipient: Option<&str>,
) -> Result<String, TestSendError> {
    let principal = user.map_or("", |u| u.user_name.as_str());
    if !state.nonces.verify(nonce, NONCE_ACTION, principal) {
        return Err(TestSendError::InvalidNonce);
    }

    let Some(user) = user else {
        return Err(TestSendError::Forbidden);
    };
    if !user.has_permission(Permission::MailTest) {
        return Err(TestSendError::Forbidden);
    }

    let record = settings::load(state.settings.as_ref()).await?;
    check_ready(&record)?;

    let to = resolve_recipient(recipient, &record, &state.config.admin_email)?;
    let sent_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let site = &state.config.site_name;

    let body = compose(&record, &to, site, &sent_at)
        .map_err(|e| anyhow::anyhow!("test email template failed: {e}"))?;

    let mail = OutgoingMail {
        to: to.clone(),
        subject: format!("Test ustawień SMTP - {site} - {sent_at}"),
        body,
        format: BodyFormat::Html,
        from: Some(Sender {
            email: record.from_email.clone(),
            name: record.from_name.clone(),
        }),
    };

    dispatch::deliver(state.mailer.as_ref(), &record, &state.config, mail)
        .await
        .map_err(TestSendError::Delivery)?;

    tracing::info!(%to, "test email sent");
    Ok(format!("E-mail testowy został wysłany pomyślnie na adres {to}"))
}

/// Configuration preconditions for a test send, checked in order.
pub fn check_ready(record: &SettingsRecord) -> Result<(), TestSendError> {
    if !record.is_enabled() {
        return Err(TestSendError::SmtpDisabled);
    }
    if record.smtp_host.is_empty() {
        return Err(TestSendError::HostMissing);
    }
    if record.valid_from_email().is_none() {
        return Err(TestSendError::SenderInvalid);
    }
    Ok(())
}

/// Pick the first valid recipient: the explicit one, the stored test
/// address, the stored admin address, then the system administrator.
pub fn resolve_recipient(
    explicit: Option<&str>,
    record: &SettingsRecord,
    system_admin: &str,
) -> Result<String, TestSendError> {
    let explicit = explicit
        .filter(|e| !e.is_empty())
        .map(sanitize_email)
        .filter(|e| is_email(e));

    let to = explicit
        .or_else(|| is_email(&record.test_email).then(|| record.test_email.clone()))
        .or_else(|| is_email(&record.admin_email).then(|| record.admin_email.clone()))
        .unwrap_or_else(|| system_admin.to_owned());

    if !is_email(&to) {
        return Err(TestSendError::RecipientInvalid);
    }
    Ok(to)
}

/// Render the HTML body. All interpolated values are escaped.
pub fn compose(
    record: &SettingsRecord,
    recipient: &str,
    site: &str,
    sent_at: &str,
) -> Result<String, minijinja::Error> {
    let mut env = minijinja::Environment::new();
    env.add_template(TEMPLATE_NAME, TEMPLATE)?;
    let tmpl = env.get_template(TEMPLATE_NAME)?;

    let security = if record.smtp_secure.is_empty() {
        "Brak"
    } else {
        record.smtp_secure.as_str()
    };
    let auth = if record.auth_enabled() { "Tak" } else { "Nie" };

    tmpl.render(minijinja::context! {
        site => site,
        host => &record.smtp_host,
        port => &record.smtp_port,
        security => security,
        auth => auth,
        sender => &record.from_email,
        recipient => recipient,
        sent_at => sent_at,
    })
}

//! The send path shared by every outgoing message.

use super::mailer::Mailer;
use super::transport::{TransportConfig, configure};
use super::{OutgoingMail, TransportError, filters};
use crate::config::Config;
use crate::settings::{self, SettingsRecord};
use crate::store::AppState;

/// Send `mail` using the current settings snapshot.
#[tracing::instrument(skip(state, mail), fields(to = %mail.to), err)]
pub async fn send_mail(state: &AppState, mail: OutgoingMail) -> Result<(), TransportError> {
    let record = settings::load(state.settings.as_ref())
        .await
        .map_err(|e| TransportError::Setup(format!("settings unavailable: {e}")))?;
    deliver(state.mailer.as_ref(), &record, &state.config, mail).await
}

/// Resolve the sender and transport for `record`, then hand off to `mailer`.
///
/// The sender filters run first; a configured SMTP transport then pins its
/// own sender identity, which wins over anything the filters produced.
pub async fn deliver(
    mailer: &dyn Mailer,
    record: &SettingsRecord,
    config: &Config,
    mut mail: OutgoingMail,
) -> Result<(), TransportError> {
    let identity = config.site_identity();
    let policy = config.transport_policy();

    let candidate = mail
        .from
        .take()
        .unwrap_or_else(|| identity.default_sender());
    let filtered = filters::apply(record, candidate);

    let mut transport = TransportConfig::ambient(&policy);
    configure(&mut transport, record, &identity, &policy);

    mail.from = Some(transport.from.clone().unwrap_or(filtered));
    mailer.send(&transport, &mail).await
}

use std::sync::Mutex;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MessageBuilder};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{
    Address, AsyncSendmailTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::transport::{Mode, Security, TransportConfig};
use super::{BodyFormat, OutgoingMail, TransportError};

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        transport: &TransportConfig,
        mail: &OutgoingMail,
    ) -> Result<(), TransportError>;
}

/// Delivers through lettre: SMTP when configured, local sendmail otherwise.
#[derive(Debug, Default, Clone)]
pub struct LettreMailer;

#[async_trait]
impl Mailer for LettreMailer {
    #[tracing::instrument(skip(self, transport, mail), fields(to = %mail.to, mode = ?transport.mode), err)]
    async fn send(
        &self,
        transport: &TransportConfig,
        mail: &OutgoingMail,
    ) -> Result<(), TransportError> {
        let message = build_message(transport, mail)?;

        match transport.mode {
            Mode::Smtp => {
                if transport.debug {
                    tracing::info!(
                        host = %transport.host,
                        port = transport.port,
                        security = ?transport.security,
                        auth = transport.credentials.is_some(),
                        verify_tls = transport.verify_tls,
                        "smtp debug: opening connection"
                    );
                }
                let smtp = smtp_transport(transport)?;
                smtp.send(message).await.map_err(|e| {
                    tracing::warn!(error = %e, host = %transport.host, "smtp delivery failed");
                    TransportError::Delivery(Some(e.to_string()))
                })?;
            }
            Mode::Sendmail => {
                let sendmail = match &transport.sendmail_command {
                    Some(cmd) => AsyncSendmailTransport::<Tokio1Executor>::new_with_command(cmd),
                    None => AsyncSendmailTransport::<Tokio1Executor>::new(),
                };
                sendmail.send(message).await.map_err(|e| {
                    tracing::warn!(error = %e, "sendmail delivery failed");
                    TransportError::Delivery(Some(e.to_string()))
                })?;
            }
        }

        tracing::info!(subject = %mail.subject, "email sent");
        Ok(())
    }
}

fn smtp_transport(
    transport: &TransportConfig,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, TransportError> {
    let tls_parameters = || {
        TlsParameters::builder(transport.host.clone())
            .dangerous_accept_invalid_certs(!transport.verify_tls)
            .build()
            .map_err(|e| TransportError::Setup(format!("TLS configuration error: {e}")))
    };

    let tls = match transport.security {
        Security::None if transport.opportunistic_tls => Tls::Opportunistic(tls_parameters()?),
        Security::None => Tls::None,
        Security::StartTls => Tls::Required(tls_parameters()?),
        Security::Implicit => Tls::Wrapper(tls_parameters()?),
    };

    let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(transport.host.as_str())
        .port(transport.port)
        .timeout(Some(transport.timeout))
        .tls(tls);

    if let Some(creds) = &transport.credentials {
        builder = builder.credentials(Credentials::new(creds.user.clone(), creds.pass.clone()));
    }

    Ok(builder.build())
}

/// Assemble the lettre message. Recipient and subject must be single-line.
pub fn build_message(
    transport: &TransportConfig,
    mail: &OutgoingMail,
) -> Result<Message, TransportError> {
    // Email header injection prevention: reject newlines in to/subject
    if mail.to.contains(['\r', '\n']) {
        return Err(TransportError::Message(
            "recipient address contains invalid characters".into(),
        ));
    }
    if mail.subject.contains(['\r', '\n']) {
        return Err(TransportError::Message(
            "subject contains invalid characters".into(),
        ));
    }

    let sender = mail
        .from
        .as_ref()
        .ok_or_else(|| TransportError::Message("no sender address".into()))?;
    let from_address: Address = sender.email.parse().map_err(|e| {
        TransportError::Message(format!("invalid sender address '{}': {e}", sender.email))
    })?;
    let to_address: Address = mail
        .to
        .parse()
        .map_err(|e| TransportError::Message(format!("invalid recipient address '{}': {e}", mail.to)))?;

    let envelope_from = match &transport.envelope_sender {
        Some(addr) => addr
            .parse()
            .map_err(|e| TransportError::Message(format!("invalid envelope sender '{addr}': {e}")))?,
        None => from_address.clone(),
    };
    let envelope = lettre::address::Envelope::new(Some(envelope_from), vec![to_address.clone()])
        .map_err(|e| TransportError::Message(format!("invalid envelope: {e}")))?;

    let name = (!sender.name.is_empty()).then(|| sender.name.clone());
    let builder: MessageBuilder = Message::builder()
        .from(Mailbox::new(name, from_address))
        .to(Mailbox::new(None, to_address))
        .subject(mail.subject.as_str())
        .envelope(envelope);

    let content_type = match mail.format {
        BodyFormat::Text => ContentType::TEXT_PLAIN,
        BodyFormat::Html => ContentType::TEXT_HTML,
    };

    builder
        .header(content_type)
        .body(mail.body.clone())
        .map_err(|e| TransportError::Message(format!("failed to build email: {e}")))
}

/// A delivery captured by [`RecordingMailer`].
#[derive(Debug, Clone)]
pub struct Delivery {
    pub transport: TransportConfig,
    pub mail: OutgoingMail,
}

/// In-process mailer that records what it was asked to send. Optionally
/// fails every delivery with a fixed error detail.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    deliveries: Mutex<Vec<Delivery>>,
    fail: bool,
    fail_detail: Option<String>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send fails with `TransportError::Delivery(detail)`.
    pub fn failing(detail: Option<&str>) -> Self {
        Self {
            deliveries: Mutex::default(),
            fail: true,
            fail_detail: detail.map(str::to_owned),
        }
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(
        &self,
        transport: &TransportConfig,
        mail: &OutgoingMail,
    ) -> Result<(), TransportError> {
        // Same validation as the real transport.
        build_message(transport, mail)?;

        if let Ok(mut deliveries) = self.deliveries.lock() {
            deliveries.push(Delivery {
                transport: transport.clone(),
                mail: mail.clone(),
            });
        }

        if self.fail {
            return Err(TransportError::Delivery(self.fail_detail.clone()));
        }
        Ok(())
    }
}

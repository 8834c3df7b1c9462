pub mod address;
pub mod dispatch;
pub mod filters;
pub mod mailer;
pub mod test_send;
pub mod transport;

/// Sender identity: address plus display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyFormat {
    #[default]
    Text,
    Html,
}

/// A message handed to the dispatch path. `from` is the caller's explicit
/// sender, if any; the sender filters and the transport may replace it.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub format: BodyFormat,
    pub from: Option<Sender>,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("message rejected: {0}")]
    Message(String),

    #[error("transport setup failed: {0}")]
    Setup(String),

    #[error("delivery failed: {}", .0.as_deref().unwrap_or("no detail"))]
    Delivery(Option<String>),
}

impl TransportError {
    /// The transport's own description of what went wrong, if it gave one.
    pub fn last_error(&self) -> Option<&str> {
        let detail = match self {
            Self::Message(msg) | Self::Setup(msg) => Some(msg.as_str()),
            Self::Delivery(detail) => detail.as_deref(),
        };
        detail.filter(|d| !d.trim().is_empty())
    }
}

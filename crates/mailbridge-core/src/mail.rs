//! Authenticated mail sending through the backend.
//!
//! The backend holds the provider credentials obtained during the popup
//! login; the client only posts the message and relies on the session
//! cookie.

use mailbridge_transport::{ApiClient, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::provider::Provider;

/// Errors that can occur while sending mail.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// The backend could not be reached or answered with an error status.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The backend accepted the request but the provider refused it.
    #[error("Send rejected: {0}")]
    Rejected(String),
}

/// A plain-text message to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    /// Recipient address.
    pub recipient: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub body: String,
}

impl OutgoingMail {
    /// Creates a message to `recipient`.
    #[must_use]
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            subject: String::new(),
            body: String::new(),
        }
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// Backend acknowledgement of a sent message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SendReceipt {
    /// Provider-defined payload (e.g. the Gmail message resource).
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SendReply {
    status: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Mail operations against the backend.
#[derive(Debug, Clone)]
pub struct MailApi {
    client: ApiClient,
}

impl MailApi {
    /// Creates the API on top of the shared backend client.
    #[must_use]
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Sends `mail` through `provider`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached, answers with an
    /// error status, or reports that the provider rejected the message.
    pub async fn send(&self, provider: Provider, mail: &OutgoingMail) -> Result<SendReceipt, MailError> {
        let reply: SendReply = self
            .client
            .post(&provider.send_email_path(), mail)
            .await
            .inspect_err(|e| error!(%provider, "Error sending mail: {e}"))?;

        if reply.status == "error" {
            let message = reply.message.unwrap_or_else(|| "Unknown error".to_string());
            error!(%provider, "Error sending mail: {message}");
            return Err(MailError::Rejected(message));
        }

        info!(%provider, recipient = %mail.recipient, "Mail sent");
        Ok(SendReceipt { data: reply.data })
    }

    /// Sends `mail` through Google.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_google_email(&self, mail: &OutgoingMail) -> Result<SendReceipt, MailError> {
        self.send(Provider::Google, mail).await
    }

    /// Sends `mail` through Microsoft.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_microsoft_email(&self, mail: &OutgoingMail) -> Result<SendReceipt, MailError> {
        self.send(Provider::Microsoft, mail).await
    }
}

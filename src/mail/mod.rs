//! Outbound mail delivery.
//!
//! The relay hands an [`EmailMessage`] to an [`EmailSender`]. The production
//! sender is [`SmtpEmailSender`], which builds a fresh SMTP transport from a
//! [`TransportStrategy`] for every message, verifies the connection and sends
//! once. There is no retry; a failed delivery is reported to the caller and the
//! persisted form file is the fallback.

pub mod config;
mod smtp;

pub use config::{FailoverPolicy, MailConfig, TransportStrategy};
pub use smtp::SmtpEmailSender;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("smtp server {0} failed connection verification")]
    Unverified(String),
    #[error("smtp server rejected the message: {0}")]
    Rejected(String),
}

/// Email delivery abstraction used by the form relay.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message. `Ok` means the server accepted it.
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

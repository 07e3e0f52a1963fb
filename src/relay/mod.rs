//! Form submission relay.
//!
//! A submission is persisted to disk first and mailed second. The two steps are
//! independent: a failed write is logged and the email is still attempted, a
//! failed email never removes the file. The outcome of both decides the reply:
//!
//! | file  | email | reply                                   |
//! |-------|-------|-----------------------------------------|
//! | any   | sent  | 200 `success: true`                     |
//! | saved | error | 200 `success: false`, contact the admin |
//! | error | error | 500 with the delivery error             |

pub mod form;
pub mod persist;

pub use form::{ContactForm, FormKind, MembershipForm};

use crate::mail::{EmailMessage, EmailSender, MailError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

pub const MSG_SENT: &str = "E-posta başarıyla gönderildi";
pub const MSG_SAVED_NOT_SENT: &str =
    "Form verileriniz kaydedildi ancak e-posta gönderilemedi. Lütfen yönetici ile iletişime geçin.";
pub const MSG_MISSING_FIELDS: &str = "Form verileri ve alıcı e-posta adresi gereklidir";
pub const MSG_PAYLOAD_TOO_LARGE: &str = "Form verileri izin verilen boyutu aşıyor";
pub const MSG_INVALID_RECIPIENT: &str = "Geçersiz alıcı e-posta adresi";
pub const MSG_UNKNOWN_FORM: &str = "Geçersiz form adresi";
pub const MSG_METHOD_NOT_ALLOWED: &str = "Yalnızca POST isteklerine izin verilir";
pub const MSG_DELIVERY_FAILED: &str = "E-posta gönderilemedi ve form verileri kaydedilemedi";
pub const MSG_SERVER_ERROR: &str = "Sunucu hatası oluştu";

/// Request body posted by the public forms.
#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    /// Form fields, keyed by input name.
    #[schema(value_type = Object)]
    pub form_data: Option<Value>,
    /// Mailbox that receives the notification.
    pub recipient_email: Option<String>,
}

/// Reply body for every relay outcome.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl RelayResponse {
    fn new(success: bool, message: &str, error: Option<String>) -> Self {
        Self {
            success,
            message: message.to_string(),
            error,
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("form data and recipient email are required")]
    MissingFields,
    #[error("invalid recipient email: {0}")]
    InvalidRecipient(String),
    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),
    #[error("unknown form endpoint: {0}")]
    UnknownForm(String),
    #[error("method {0} not allowed")]
    MethodNotAllowed(String),
    #[error("submission was not saved and email delivery failed: {0}")]
    Delivery(#[source] MailError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl RelayError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingFields | Self::InvalidRecipient(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnknownForm(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Delivery(_) | Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn response(&self) -> RelayResponse {
        match self {
            Self::MissingFields => RelayResponse::new(false, MSG_MISSING_FIELDS, None),
            Self::InvalidRecipient(_) => RelayResponse::new(false, MSG_INVALID_RECIPIENT, None),
            Self::PayloadTooLarge(_) => RelayResponse::new(false, MSG_PAYLOAD_TOO_LARGE, None),
            Self::UnknownForm(_) => RelayResponse::new(false, MSG_UNKNOWN_FORM, None),
            Self::MethodNotAllowed(_) => RelayResponse::new(false, MSG_METHOD_NOT_ALLOWED, None),
            Self::Delivery(err) => {
                RelayResponse::new(false, MSG_DELIVERY_FAILED, Some(err.to_string()))
            }
            Self::Unexpected(err) => RelayResponse::new(false, MSG_SERVER_ERROR, Some(err.clone())),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.response())).into_response()
    }
}

/// A validated submission: exactly one form object and one recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub form_data: Map<String, Value>,
    pub recipient_email: String,
}

impl Submission {
    /// Parse and validate a raw request body.
    ///
    /// # Errors
    /// Returns [`RelayError::MissingFields`] when the body is not JSON, `formData`
    /// is absent or not an object, or `recipientEmail` is absent or blank, and
    /// [`RelayError::InvalidRecipient`] when the recipient is not an address.
    pub fn from_body(body: &[u8]) -> Result<Self, RelayError> {
        let request: RelayRequest = serde_json::from_slice(body).map_err(|err| {
            warn!("unreadable relay body: {err}");
            RelayError::MissingFields
        })?;

        let Some(Value::Object(form_data)) = request.form_data else {
            return Err(RelayError::MissingFields);
        };

        let recipient_email = request
            .recipient_email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty())
            .ok_or(RelayError::MissingFields)?;

        if !valid_email(&recipient_email) {
            return Err(RelayError::InvalidRecipient(recipient_email));
        }

        Ok(Self {
            form_data,
            recipient_email,
        })
    }
}

#[derive(Debug)]
pub enum RelayOutcome {
    /// The email went out; `saved` is the file if the write succeeded.
    Delivered { saved: Option<PathBuf> },
    /// Only the file exists; the operator has to forward it by hand.
    Saved { path: PathBuf, error: MailError },
}

impl RelayOutcome {
    #[must_use]
    pub fn response(&self) -> RelayResponse {
        match self {
            Self::Delivered { .. } => RelayResponse::new(true, MSG_SENT, None),
            Self::Saved { error, .. } => {
                RelayResponse::new(false, MSG_SAVED_NOT_SENT, Some(error.to_string()))
            }
        }
    }
}

/// Lightweight email sanity check.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Build the notification email for a submission.
///
/// # Errors
/// Returns an error if the form data cannot be read as the given kind.
pub fn compose(kind: FormKind, submission: &Submission) -> Result<EmailMessage, RelayError> {
    let unreadable = |err: serde_json::Error| RelayError::Unexpected(err.to_string());

    let (subject, html) = match kind {
        FormKind::Contact => {
            let form = ContactForm::from_form_data(&submission.form_data).map_err(unreadable)?;
            (form.subject_line(), form.to_html())
        }
        FormKind::Membership => {
            let form = MembershipForm::from_form_data(&submission.form_data).map_err(unreadable)?;
            for warning in form.warnings() {
                warn!(full_name = %form.full_name, "membership application: {warning}");
            }
            (form.subject_line(), form.to_html())
        }
    };

    Ok(EmailMessage {
        to: submission.recipient_email.clone(),
        subject,
        html,
    })
}

/// Persist-then-email relay shared by both form endpoints.
pub struct Relay {
    form_data_dir: PathBuf,
    sender: Arc<dyn EmailSender>,
}

impl Relay {
    #[must_use]
    pub fn new(form_data_dir: impl Into<PathBuf>, sender: Arc<dyn EmailSender>) -> Self {
        Self {
            form_data_dir: form_data_dir.into(),
            sender,
        }
    }

    #[must_use]
    pub fn form_data_dir(&self) -> &Path {
        &self.form_data_dir
    }

    /// Persist the submission, then try to mail it.
    ///
    /// # Errors
    /// Returns [`RelayError::Delivery`] when neither the file nor the email
    /// succeeded, and [`RelayError::Unexpected`] if the email cannot be composed.
    #[instrument(skip(self, submission), fields(kind = %kind, recipient = %submission.recipient_email))]
    pub async fn submit(
        &self,
        kind: FormKind,
        submission: &Submission,
    ) -> Result<RelayOutcome, RelayError> {
        let saved = match persist::write_submission(&self.form_data_dir, kind, &submission.form_data)
            .await
        {
            Ok(path) => {
                info!(path = %path.display(), "submission saved");
                Some(path)
            }
            Err(err) => {
                error!("failed to save submission: {err}");
                None
            }
        };

        let message = compose(kind, submission)?;

        match self.sender.send(&message).await {
            Ok(()) => {
                info!(subject = %message.subject, "submission emailed");
                Ok(RelayOutcome::Delivered { saved })
            }
            Err(err) => {
                error!("failed to email submission: {err}");
                match saved {
                    Some(path) => Ok(RelayOutcome::Saved { path, error: err }),
                    None => Err(RelayError::Delivery(err)),
                }
            }
        }
    }
}

use super::{EmailMessage, EmailSender, MailConfig, MailError, TransportStrategy};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters, TlsVersion},
    },
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use tracing::{debug, error, info, instrument, warn};

/// SMTP sender. Holds configuration only; the transport is built per message.
#[derive(Clone, Debug)]
pub struct SmtpEmailSender {
    strategy: TransportStrategy,
}

impl SmtpEmailSender {
    #[must_use]
    pub fn new(strategy: TransportStrategy) -> Self {
        Self { strategy }
    }

    #[must_use]
    pub fn strategy(&self) -> &TransportStrategy {
        &self.strategy
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let primary_error = match deliver(&self.strategy.primary, message).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        let Some(secondary) = self.strategy.failover() else {
            return Err(primary_error);
        };

        warn!(
            primary = %self.strategy.primary.host,
            secondary = %secondary.host,
            "primary transport failed, trying secondary: {primary_error}"
        );

        deliver(secondary, message).await
    }
}

// The target mail host still speaks legacy TLS with a self-signed certificate.
fn transport(config: &MailConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
    let parameters = TlsParameters::builder(config.host.clone())
        .dangerous_accept_invalid_certs(true)
        .dangerous_accept_invalid_hostnames(true)
        .set_min_tls_version(TlsVersion::Tlsv10)
        .build()?;

    let tls = if config.secure {
        Tls::Wrapper(parameters)
    } else {
        Tls::Opportunistic(parameters)
    };

    let credentials = Credentials::new(
        config.user.clone(),
        config.password.expose_secret().to_string(),
    );

    Ok(
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.as_str())
            .port(config.port)
            .tls(tls)
            .credentials(credentials)
            .build(),
    )
}

pub(crate) fn build_message(
    config: &MailConfig,
    message: &EmailMessage,
) -> Result<Message, MailError> {
    let from_address: Address = config.from_address.parse()?;
    let from = Mailbox::new(Some(config.from_name.clone()), from_address);
    let to: Mailbox = message.to.parse()?;

    Ok(Message::builder()
        .from(from)
        .to(to)
        .subject(message.subject.clone())
        .header(ContentType::TEXT_HTML)
        .body(message.html.clone())?)
}

#[instrument(skip(config, message), fields(host = %config.host, port = config.port, to = %message.to))]
async fn deliver(config: &MailConfig, message: &EmailMessage) -> Result<(), MailError> {
    let email = build_message(config, message)?;
    let mailer = transport(config)?;

    match mailer.test_connection().await {
        Ok(true) => debug!("smtp connection verified"),
        Ok(false) => {
            error!("smtp connection verification failed");
            return Err(MailError::Unverified(config.host.clone()));
        }
        Err(err) => {
            error!("smtp connection verification failed: {err}");
            return Err(err.into());
        }
    }

    let response = mailer.send(email).await.map_err(|err| {
        error!("smtp send failed: {err}");
        MailError::from(err)
    })?;

    if !response.is_positive() {
        let reply = response
            .message()
            .collect::<Vec<_>>()
            .join(" ");
        error!(code = %response.code(), "smtp server rejected message: {reply}");
        return Err(MailError::Rejected(reply));
    }

    info!(subject = %message.subject, "email sent");

    Ok(())
}

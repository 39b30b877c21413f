// src/utils/mail.rs

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType, transport::smtp::authentication::Credentials,
};

use crate::{config::SmtpConfig, error::AppError};

/// An outbound e-mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Out-of-band mail dispatch.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), AppError>;
}

/// Builds the confirmation mail carrying the plaintext `code`.
pub fn confirmation_message(from: &str, to: &str, code: &str) -> MailMessage {
    MailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Confirmation code".to_string(),
        body: format!("Your confirmation code: {}", code),
    }
}

/// Writes messages to the log instead of delivering them.
/// Used when no SMTP relay is configured; meant for development only.
///
/// Envelope fields are logged at `info`. The body, which carries the
/// plaintext code, only at `debug`, so the default filter keeps it out of
/// the log files.
#[derive(Debug, Default, Clone)]
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, message: MailMessage) -> Result<(), AppError> {
        tracing::info!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            "Mail not delivered: no SMTP relay configured"
        );
        tracing::debug!(to = %message.to, "{}", message.body);
        Ok(())
    }
}

/// Delivers messages through an SMTP relay.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let builder = if config.tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| AppError::InternalServerError(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.as_str())
        };
        let mut builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: MailMessage) -> Result<(), AppError> {
        let email = Message::builder()
            .from(
                message
                    .from
                    .parse()
                    .map_err(|e| AppError::InternalServerError(format!("Bad sender: {}", e)))?,
            )
            .to(message
                .to
                .parse()
                .map_err(|e| AppError::BadRequest(format!("Bad recipient: {}", e)))?)
            .subject(message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        self.transport.send(email).await.map_err(|e| {
            tracing::error!("SMTP delivery failed: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(())
    }
}

//! Outbound mail.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::{Mailbox, Message, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use livenest_common::{AppError, AppResult, config::MailConfig};

/// Shared mail service handle.
pub type MailServiceRef = Arc<dyn MailService>;

/// Sends plain-text mail. Callers treat delivery as best-effort.
#[async_trait]
pub trait MailService: Send + Sync {
    /// Send one message.
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()>;
}

/// SMTP mailer.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build an SMTP mailer from configuration.
    pub fn new(config: &MailConfig) -> AppResult<Self> {
        let from = config
            .from_address
            .parse::<Mailbox>()
            .map_err(|e| AppError::Config(format!("Invalid mail.from_address: {e}")))?;

        let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| AppError::Config(format!("Failed to configure SMTP transport: {e}")))?
            .port(config.smtp_port);

        let builder = if let (Some(username), Some(password)) = (&config.username, &config.password)
        {
            builder.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            builder
        };

        Ok(Self {
            transport: Arc::new(builder.build()),
            from,
        })
    }
}

#[async_trait]
impl MailService for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| AppError::Validation(format!("Invalid recipient address: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::Internal(format!("Failed to build mail: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Upstream(format!("SMTP send failed: {e}")))?;

        tracing::debug!(subject = subject, "Mail sent");
        Ok(())
    }
}

/// Mailer used when SMTP is not configured. Logs and drops every message.
#[derive(Clone, Default)]
pub struct NoOpMailer;

#[async_trait]
impl MailService for NoOpMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> AppResult<()> {
        tracing::info!(to = to, subject = subject, "Mail delivery disabled, message dropped");
        Ok(())
    }
}

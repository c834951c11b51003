//! Outbound email
//!
//! Handlers and the reminder job talk to a [`Mailer`]; which implementation
//! backs it is chosen from `[mail] transport` in the config.

use std::sync::Mutex;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use ptrack_common::config::{MailConfig, MailTransport};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail configuration error: {0}")]
    Config(String),

    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Could not build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Recipient rejected: {0}")]
    Rejected(String),
}

/// A message ready to send; `html_body` makes it multipart/alternative
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Writes messages to the log; the default for development
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "Email (log transport)");
        debug!("{}", email.text_body);
        Ok(())
    }
}

/// Keeps every message in memory
///
/// Addresses passed to [`MemoryMailer::reject`] fail with
/// [`MailError::Rejected`] and are not kept.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<Email>>,
    rejected: Mutex<Vec<String>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn reject(&self, address: &str) {
        if let Ok(mut rejected) = self.rejected.lock() {
            rejected.push(address.to_string());
        }
    }

    fn is_rejected(&self, address: &str) -> bool {
        self.rejected
            .lock()
            .map(|r| r.iter().any(|a| a == address))
            .unwrap_or(false)
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        if self.is_rejected(&email.to) {
            return Err(MailError::Rejected(email.to.clone()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(())
    }
}

/// Delivers through an SMTP relay using STARTTLS
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| MailError::Config("smtp_host is not set".to_string()))?;

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?.port(config.smtp_port);
        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: config.from.parse()?,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let builder = Message::builder()
            .from(self.from.clone())
            .to(email.to.parse()?)
            .subject(email.subject.clone());

        let message = match &email.html_body {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                email.text_body.clone(),
                html.clone(),
            ))?,
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(email.text_body.clone())?,
        };

        self.transport.send(message).await?;
        info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

/// Build the mailer selected by configuration
pub fn mailer_from_config(config: &MailConfig) -> Result<Box<dyn Mailer>, MailError> {
    match config.transport {
        MailTransport::Log => Ok(Box::new(LogMailer)),
        MailTransport::Smtp => Ok(Box::new(SmtpMailer::new(config)?)),
    }
}

/// Escape text for interpolation into HTML bodies
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_mailer_records_messages() {
        let mailer = MemoryMailer::new();
        let email = Email {
            to: "pi@example.org".to_string(),
            subject: "Hello".to_string(),
            text_body: "Body".to_string(),
            html_body: None,
        };
        mailer.send(&email).await.unwrap();
        assert_eq!(mailer.sent(), vec![email]);
    }

    #[tokio::test]
    async fn test_memory_mailer_rejects_chosen_recipient() {
        let mailer = MemoryMailer::new();
        mailer.reject("bounce@example.org");
        let email = Email {
            to: "bounce@example.org".to_string(),
            subject: "Hello".to_string(),
            text_body: "Body".to_string(),
            html_body: None,
        };

        assert!(matches!(mailer.send(&email).await, Err(MailError::Rejected(_))));
        assert!(mailer.sent().is_empty());
    }

    #[test]
    fn test_smtp_mailer_requires_host() {
        let config = MailConfig {
            transport: MailTransport::Smtp,
            ..MailConfig::default()
        };
        assert!(matches!(SmtpMailer::new(&config), Err(MailError::Config(_))));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<b>O'Neil & \"Co\"</b>"),
            "&lt;b&gt;O&#x27;Neil &amp; &quot;Co&quot;&lt;/b&gt;"
        );
    }
}

//! Email notification channel over SMTP

use crate::error::DispatchError;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// SMTP relay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
}

fn default_smtp_port() -> u16 {
    587
}

/// Sends plain-text alert emails through an SMTP relay
#[derive(Debug, Clone)]
pub struct EmailChannel {
    config: EmailConfig,
    timeout: Duration,
}

impl EmailChannel {
    pub fn new(config: EmailConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    fn build_message(&self, subject: &str, body: &str) -> Result<Message, DispatchError> {
        if self.config.to.is_empty() {
            return Err(DispatchError::Config("no email recipients configured".to_string()));
        }

        let from: Mailbox = self
            .config
            .from
            .parse()
            .map_err(|e| DispatchError::Config(format!("invalid from address: {}", e)))?;

        let mut builder = Message::builder()
            .from(from)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);

        for recipient in &self.config.to {
            let to: Mailbox = recipient.parse().map_err(|e| {
                DispatchError::Config(format!("invalid recipient {}: {}", recipient, e))
            })?;
            builder = builder.to(to);
        }

        builder
            .body(body.to_string())
            .map_err(|e| DispatchError::Email(e.to_string()))
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, DispatchError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
            .map_err(|e| DispatchError::Email(e.to_string()))?
            .port(self.config.smtp_port)
            .timeout(Some(self.timeout));

        if !self.config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ));
        }

        Ok(builder.build())
    }

    /// Send one email to every configured recipient
    pub async fn send(&self, subject: &str, body: &str) -> Result<(), DispatchError> {
        let message = self.build_message(subject, body)?;
        let transport = self.transport()?;

        match tokio::time::timeout(self.timeout, transport.send(message)).await {
            Ok(Ok(_)) => {
                debug!(recipients = self.config.to.len(), "Email notification sent");
                Ok(())
            }
            Ok(Err(e)) => Err(DispatchError::Email(e.to_string())),
            Err(_) => Err(DispatchError::Timeout {
                channel: "email",
                secs: self.timeout.as_secs(),
            }),
        }
    }
}

// SMTP delivery of composed reports

use crate::config::EmailConfig;
use crate::errors::NotificationError;
use crate::report::EmailMessage;
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, instrument};

/// Outbound mail transport
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        recipients: &[String],
        message: &EmailMessage,
    ) -> Result<(), NotificationError>;
}

/// lettre-based SMTP mailer
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, NotificationError> {
        let from: Mailbox = config
            .from_address
            .parse()
            .map_err(|_| NotificationError::InvalidAddress(config.from_address.clone()))?;

        let transport = match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                    .map_err(|e| NotificationError::Transport(e.to_string()))?
                    .port(config.smtp_port)
                    .credentials(Credentials::new(username.clone(), password.clone()))
                    .build()
            }
            // Unauthenticated plain SMTP, for local relays and test sinks
            _ => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
                .port(config.smtp_port)
                .build(),
        };

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, message), fields(subject = %message.subject, recipients = recipients.len()))]
    async fn send(
        &self,
        recipients: &[String],
        message: &EmailMessage,
    ) -> Result<(), NotificationError> {
        if recipients.is_empty() {
            return Err(NotificationError::NoRecipients);
        }

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(&message.subject);

        for recipient in recipients {
            let mailbox: Mailbox = recipient
                .parse()
                .map_err(|_| NotificationError::InvalidAddress(recipient.clone()))?;
            builder = builder.to(mailbox);
        }

        let email = match &message.html_body {
            Some(html) => builder
                .multipart(MultiPart::alternative_plain_html(
                    message.text_body.clone(),
                    html.clone(),
                ))
                .map_err(|e| NotificationError::Compose(e.to_string()))?,
            None => builder
                .body(message.text_body.clone())
                .map_err(|e| NotificationError::Compose(e.to_string()))?,
        };

        self.transport
            .send(email)
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        info!(subject = %message.subject, "Notification delivered");
        Ok(())
    }
}

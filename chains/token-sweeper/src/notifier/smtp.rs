use async_trait::async_trait;
use chrono::Local;
use core_logic::MailConfig;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use super::templates::{render, TIMESTAMP_FORMAT};
use super::{Notification, Notifier, NotifyError};

/// Delivers notifications through an authenticated SMTP relay (Gmail by default).
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &MailConfig) -> Result<Self, NotifyError> {
        let from = parse_mailbox(&config.username)?;
        let to = parse_mailbox(&config.recipient)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from,
            to,
        })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| NotifyError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let now = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let rendered = render(notification, &now);
        debug!("Sending '{}' to {}", rendered.subject, self.to);

        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(rendered.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(rendered.body)?;

        self.transport.send(message).await?;
        info!("Mail sent: {}", rendered.subject);
        Ok(())
    }
}

use std::sync::Arc;

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport,
    AsyncTransport,
    Message,
    Tokio1Executor,
};
use log::*;
use settlement_engine::traits::{EmailMessage, MailError, Mailer};

use crate::{config::SmtpConfig, errors::ServerError};

/// Sends invoice emails over SMTP with STARTTLS. When SMTP is disabled, every send fails with
/// [`MailError::Disabled`] and the invoice records the failure.
#[derive(Clone)]
pub struct SmtpMailer {
    from: Option<Mailbox>,
    transport: Option<Arc<AsyncSmtpTransport<Tokio1Executor>>>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, ServerError> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| ServerError::ConfigurationError(format!("Invalid sender address {}: {e}", config.from)))?;
        let credentials = Credentials::new(config.user.clone(), config.password.reveal().clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| ServerError::ConfigurationError(format!("Could not create the SMTP relay: {e}")))?
            .port(config.port)
            .credentials(credentials)
            .build();
        info!("📧️ Invoice emails will be sent via {}:{} as {from}", config.host, config.port);
        Ok(Self { from: Some(from), transport: Some(Arc::new(transport)) })
    }

    pub fn disabled() -> Self {
        Self { from: None, transport: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }
}

impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            return Err(MailError::Disabled);
        };
        let to = message.to.parse::<Mailbox>().map_err(|e| MailError::InvalidRecipient(format!("{}: {e}", message.to)))?;
        let email = Message::builder()
            .from(from.clone())
            .to(to)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone())
            .map_err(|e| MailError::Transport(format!("Could not build the message: {e}")))?;
        let response = transport.send(email).await.map_err(|e| MailError::Transport(e.to_string()))?;
        debug!("📧️ Sent '{}' to {}. Server said {}", message.subject, message.to, response.code());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn disabled_mailer_refuses_to_send() {
        let mailer = SmtpMailer::new(&SmtpConfig::default()).unwrap();
        assert!(!mailer.is_enabled());
        let message = EmailMessage {
            to: "owner@example.com".into(),
            subject: "Ihre Rechnung".into(),
            html_body: "<p>Hallo</p>".into(),
        };
        assert_eq!(mailer.send(&message).await, Err(MailError::Disabled));
    }

    #[test]
    fn bad_sender_is_a_configuration_error() {
        let config = SmtpConfig {
            enabled: true,
            host: "smtp.example.com".into(),
            port: 587,
            user: "billing".into(),
            from: "not an address".into(),
            ..Default::default()
        };
        assert!(matches!(SmtpMailer::new(&config), Err(ServerError::ConfigurationError(_))));
    }
}

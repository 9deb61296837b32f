use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MailError {
    #[error("Email delivery is disabled")]
    Disabled,
    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),
    #[error("Email transport error: {0}")]
    Transport(String),
    #[error("Email delivery timed out")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// The outgoing email collaborator. Best effort: a failure is reported to the caller, never retried here.
#[allow(async_fn_in_trait)]
pub trait Mailer: Clone {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

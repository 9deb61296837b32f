use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The provider could not be reached: {0}")]
    Transport(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Invalid currency amount: {0}")]
    InvalidAmount(String),
    #[error("Authentication with the provider failed: {0}")]
    AuthError(String),
}

impl GatewayApiError {
    /// Whether retrying the same request later could succeed. Transport failures, throttling and 5xx answers are
    /// transient; any other 4xx is the provider refusing the request.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayApiError::Transport(_) => true,
            GatewayApiError::QueryError { status, .. } => *status >= 500 || *status == 429 || *status == 409,
            _ => false,
        }
    }
}

use thiserror::Error;

/// The single error type returned by all settlement backends and APIs.
///
/// Callers map the variants onto transport-level responses: `Validation` is a client error, `NotFound` and `Conflict`
/// speak for themselves, and the rest are server-side failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettlementError {
    #[error("Validation failed. {0}")]
    Validation(String),
    #[error("Not found. {0}")]
    NotFound(String),
    #[error("Conflict. {0}")]
    Conflict(String),
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Could not produce the invoice document. {0}")]
    DocumentError(String),
    #[error("The payment provider rejected the request. {0}")]
    ProviderRejected(String),
}

impl SettlementError {
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict<S: Into<String>>(what: S) -> Self {
        Self::Conflict(what.into())
    }

    pub fn validation<S: Into<String>>(what: S) -> Self {
        Self::Validation(what.into())
    }
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => SettlementError::NotFound("The requested record does not exist".into()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => SettlementError::Conflict(db.to_string()),
            sqlx::Error::Database(ref db) if db.is_check_violation() => {
                SettlementError::Validation(format!("Record failed an integrity check: {db}"))
            },
            e => SettlementError::DatabaseError(e.to_string()),
        }
    }
}

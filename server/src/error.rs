//! Error types of the session boundary and the transport

use shared::{CodecError, DriverId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("driver {0} not found")]
    NotFound(DriverId),
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Reasons a session is refused before any connection work starts
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("driver is not authorized")]
    Unauthorized,
    #[error("driver {0} not found")]
    DriverNotFound(DriverId),
    #[error("insufficient funds: balance {balance}, daily cost {cost}")]
    InsufficientFunds { balance: i64, cost: i64 },
    #[error(transparent)]
    Repository(RepositoryError),
}

impl SessionError {
    /// HTTP-style status a front end should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            SessionError::Unauthorized => 401,
            SessionError::InsufficientFunds { .. } => 402,
            SessionError::DriverNotFound(_) => 404,
            SessionError::Repository(_) => 500,
        }
    }
}

impl From<RepositoryError> for SessionError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => SessionError::DriverNotFound(id),
            other => SessionError::Repository(other),
        }
    }
}

/// Failures local to one connection; they end that session only
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed by peer")]
    Closed,
    #[error("connection lost: {0}")]
    Abnormal(#[from] std::io::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl TransportError {
    /// Whether the closure was an expected one, for log levels only
    pub fn is_expected_closure(&self) -> bool {
        matches!(self, TransportError::Closed)
    }
}

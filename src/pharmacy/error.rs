use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum PharmacyError {
    /// Precondition failure; raised before any network call.
    #[error("{0}")]
    Validation(String),

    /// HTTP 401 from the platform. Never retried.
    #[error("Pharmacy platform rejected the API credentials: {0}")]
    Authentication(String),

    #[error("Pharmacy platform returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Cannot reach pharmacy platform at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Unexpected response from pharmacy platform: {0}")]
    ResponseParsing(String),

    #[error("Patient {0} is not synced with the pharmacy platform")]
    NotSynced(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl PharmacyError {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Authentication(_) => Some(401),
            _ => None,
        }
    }
}

//! Error types for the remote catalog and the local store
//!
//! Remote failures are split by how callers must react to them: transient
//! errors are safe to retry, `NotFound` is recorded as absence, malformed
//! responses abort only the single operation that produced them.

use thiserror::Error;

use crate::domain::catalog_item::PageId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Remote service error [{code}]: {message}")]
    Transient { code: String, message: String },

    #[error("Page {id} has no content upstream")]
    NotFound { id: PageId },

    #[error("Malformed {context} response: {reason}")]
    MalformedResponse { context: String, reason: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },
}

impl CatalogError {
    pub fn transient(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn malformed(context: &str, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            context: context.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same request later can succeed
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Page {id} already exists in the store; reset the schema before a fresh enumeration")]
    DuplicateKey { id: PageId },

    #[error("Stored value for page {id} is invalid: {reason}")]
    CorruptRow { id: PageId, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

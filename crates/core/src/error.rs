//! Error types for transactional execution
//!
//! This module defines the lifecycle error taxonomy shared by the registry,
//! the transaction status and the coordinator.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Two channels carry these errors:
//! - Accessor operations (`get_transaction`, `commit`, `rollback`) return them
//! - Request dispatch captures them into a response's `error` string

use thiserror::Error;

/// Result type alias for transactional operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for transaction lifecycle management
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A transaction id was required but the caller supplied ""
    #[error("transaction id must not be empty")]
    EmptyTransactionId,

    /// No live transaction is registered under the id
    #[error("transaction does not exist, id={id}")]
    TransactionNotFound {
        /// Requested transaction id
        id: String,
    },

    /// The session factory could not hand out a session
    #[error("failed to open session: {reason}")]
    SessionOpen {
        /// Underlying failure
        reason: String,
    },

    /// The transaction was already committed or rolled back
    #[error("transaction {id} is already completed")]
    TransactionCompleted {
        /// Completed transaction id
        id: String,
    },

    /// A request carried a status code dispatch does not know
    #[error("unknown transaction action: status code {code}")]
    UnknownAction {
        /// Raw wire code
        code: u8,
    },

    /// Session-level execution failure, surfaced verbatim
    #[error("{reason}")]
    Session {
        /// Message reported by the session
        reason: String,
    },

    /// Operation not valid in the transaction's current state
    #[error("invalid state for transaction {id}: {reason}")]
    InvalidState {
        /// Transaction id
        id: String,
        /// What was wrong
        reason: String,
    },

    /// Configuration could not be read, parsed or validated
    #[error("configuration error: {reason}")]
    Config {
        /// What was wrong
        reason: String,
    },

    /// The reclamation worker could not be started
    #[error("reclaim scheduler error: {reason}")]
    Scheduler {
        /// What was wrong
        reason: String,
    },
}

impl Error {
    /// Create a TransactionNotFound error
    pub fn not_found(id: impl Into<String>) -> Self {
        Error::TransactionNotFound { id: id.into() }
    }

    /// Create a TransactionCompleted error
    pub fn completed(id: impl Into<String>) -> Self {
        Error::TransactionCompleted { id: id.into() }
    }

    /// Create a Session error
    pub fn session(reason: impl Into<String>) -> Self {
        Error::Session {
            reason: reason.into(),
        }
    }

    /// Create an InvalidState error
    pub fn invalid_state(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidState {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a Config error
    pub fn config(reason: impl Into<String>) -> Self {
        Error::Config {
            reason: reason.into(),
        }
    }

    /// Create a Scheduler error
    pub fn scheduler(reason: impl Into<String>) -> Self {
        Error::Scheduler {
            reason: reason.into(),
        }
    }
}

//! Core traits for the database session abstraction
//!
//! This module defines the Session and SessionFactory traits that the
//! transaction layer drives. Concrete drivers live outside this workspace;
//! `crate::testing` ships an in-memory implementation.

use crate::error::Result;
use crate::types::{ExecResult, Row};

/// One database connection with its own transaction scope
///
/// A session is owned by exactly one transaction at a time, so methods take
/// `&mut self`. Calls must return or fail; they are never expected to block
/// indefinitely.
pub trait Session: Send {
    /// Stable identifier, used in logs
    fn id(&self) -> &str;

    /// Start a database transaction on this session
    ///
    /// # Errors
    ///
    /// Returns an error if the driver refuses to begin.
    fn begin(&mut self) -> Result<()>;

    /// Commit the open database transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails to commit.
    fn commit(&mut self) -> Result<()>;

    /// Roll back the open database transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails to roll back.
    fn rollback(&mut self) -> Result<()>;

    /// Execute a statement that returns no rows
    ///
    /// # Errors
    ///
    /// Returns `Error::Session` with the driver's message on failure.
    fn exec(&mut self, sql: &str) -> Result<ExecResult>;

    /// Execute a statement that returns rows
    ///
    /// # Errors
    ///
    /// Returns `Error::Session` with the driver's message on failure.
    fn query(&mut self, sql: &str) -> Result<Vec<Row>>;

    /// Release the underlying connection
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails to close.
    fn close(&mut self) -> Result<()>;
}

/// Opens sessions on demand
///
/// Thread safety: the registry calls `open` from whichever thread first
/// references a transaction id (requires Send + Sync).
pub trait SessionFactory: Send + Sync {
    /// Open a fresh session
    ///
    /// # Errors
    ///
    /// Returns `Error::SessionOpen` if no session can be acquired.
    fn open(&self) -> Result<Box<dyn Session>>;
}

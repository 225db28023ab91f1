//! In-memory session for exercising the transaction layer
//!
//! Records every lifecycle call so tests can assert exactly-once release,
//! statement ordering, and which sessions were committed or rolled back.
//!
//! # Example
//!
//! ```
//! use strata_core::testing::MemorySessionFactory;
//! use strata_core::traits::SessionFactory;
//!
//! let factory = MemorySessionFactory::new();
//! let mut session = factory.open().unwrap();
//! session.begin().unwrap();
//! session.exec("UPDATE biz_activity SET name = 'x'").unwrap();
//! session.commit().unwrap();
//! session.close().unwrap();
//!
//! let log = factory.log();
//! assert_eq!(log.commits(), 1);
//! assert_eq!(log.closed(), 1);
//! ```

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::traits::{Session, SessionFactory};
use crate::types::{ExecResult, Row};

/// Shared record of everything the in-memory sessions did
#[derive(Debug, Default)]
pub struct SessionLog {
    opened: AtomicU64,
    closed: AtomicU64,
    double_closes: AtomicU64,
    begins: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
    statements: Mutex<Vec<(String, String)>>,
}

impl SessionLog {
    /// Sessions handed out
    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }

    /// Sessions closed (first close only)
    pub fn closed(&self) -> u64 {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close calls on an already closed session
    pub fn double_closes(&self) -> u64 {
        self.double_closes.load(Ordering::SeqCst)
    }

    /// Successful begin calls
    pub fn begins(&self) -> u64 {
        self.begins.load(Ordering::SeqCst)
    }

    /// Successful commit calls
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Successful rollback calls
    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::SeqCst)
    }

    /// Every statement that reached a session, in order
    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .iter()
            .map(|(_, sql)| sql.clone())
            .collect()
    }

    /// Statements executed by one session
    pub fn statements_for(&self, session_id: &str) -> Vec<String> {
        self.statements
            .lock()
            .iter()
            .filter(|(id, _)| id == session_id)
            .map(|(_, sql)| sql.clone())
            .collect()
    }
}

#[derive(Default)]
struct Behaviour {
    fail_open: AtomicBool,
    fail_begin: AtomicBool,
    fail_commit: AtomicBool,
    fail_marker: Mutex<Option<String>>,
    query_rows: Mutex<Vec<Row>>,
}

/// Factory producing [`MemorySession`]s that share one [`SessionLog`]
#[derive(Default)]
pub struct MemorySessionFactory {
    log: Arc<SessionLog>,
    behaviour: Arc<Behaviour>,
    next_id: AtomicU64,
}

impl MemorySessionFactory {
    /// Create a factory with an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared log of all sessions from this factory
    pub fn log(&self) -> Arc<SessionLog> {
        Arc::clone(&self.log)
    }

    /// Make subsequent `open` calls fail
    pub fn fail_open(&self, fail: bool) {
        self.behaviour.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `begin` calls fail
    pub fn fail_begin(&self, fail: bool) {
        self.behaviour.fail_begin.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `commit` calls fail, leaving the transaction open
    pub fn fail_commit(&self, fail: bool) {
        self.behaviour.fail_commit.store(fail, Ordering::SeqCst);
    }

    /// Fail any statement whose text contains `marker`
    pub fn fail_statements_containing(&self, marker: impl Into<String>) {
        *self.behaviour.fail_marker.lock() = Some(marker.into());
    }

    /// Rows every query returns
    pub fn stub_query_rows(&self, rows: Vec<Row>) {
        *self.behaviour.query_rows.lock() = rows;
    }
}

impl SessionFactory for MemorySessionFactory {
    fn open(&self) -> Result<Box<dyn Session>> {
        if self.behaviour.fail_open.load(Ordering::SeqCst) {
            return Err(Error::SessionOpen {
                reason: "memory session factory refused to open".to_string(),
            });
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            id: format!("mem-{}", n),
            log: Arc::clone(&self.log),
            behaviour: Arc::clone(&self.behaviour),
            in_transaction: false,
            closed: false,
            statements: 0,
        }))
    }
}

/// Session that records calls instead of talking to a database
pub struct MemorySession {
    id: String,
    log: Arc<SessionLog>,
    behaviour: Arc<Behaviour>,
    in_transaction: bool,
    closed: bool,
    statements: i64,
}

impl MemorySession {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::session(format!("session {} is closed", self.id)));
        }
        Ok(())
    }

    fn record(&mut self, sql: &str) -> Result<()> {
        self.ensure_open()?;
        if let Some(marker) = self.behaviour.fail_marker.lock().as_deref() {
            if sql.contains(marker) {
                return Err(Error::session(format!("statement failed: {}", sql)));
            }
        }
        self.statements += 1;
        self.log
            .statements
            .lock()
            .push((self.id.clone(), sql.to_string()));
        Ok(())
    }
}

impl Session for MemorySession {
    fn id(&self) -> &str {
        &self.id
    }

    fn begin(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.in_transaction {
            return Err(Error::session("transaction already begun"));
        }
        if self.behaviour.fail_begin.load(Ordering::SeqCst) {
            return Err(Error::session("begin refused"));
        }
        self.in_transaction = true;
        self.log.begins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        if !self.in_transaction {
            return Err(Error::session("no transaction in progress"));
        }
        if self.behaviour.fail_commit.load(Ordering::SeqCst) {
            return Err(Error::session("commit refused"));
        }
        self.in_transaction = false;
        self.log.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        if !self.in_transaction {
            return Err(Error::session("no transaction in progress"));
        }
        self.in_transaction = false;
        self.log.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn exec(&mut self, sql: &str) -> Result<ExecResult> {
        self.record(sql)?;
        Ok(ExecResult {
            rows_affected: 1,
            last_insert_id: self.statements,
        })
    }

    fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        self.record(sql)?;
        Ok(self.behaviour.query_rows.lock().clone())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            self.log.double_closes.fetch_add(1, Ordering::SeqCst);
            return Err(Error::session(format!("session {} already closed", self.id)));
        }
        self.closed = true;
        self.log.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_get_distinct_ids() {
        let factory = MemorySessionFactory::new();
        let a = factory.open().unwrap();
        let b = factory.open().unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(factory.log().opened(), 2);
    }

    #[test]
    fn test_fail_open() {
        let factory = MemorySessionFactory::new();
        factory.fail_open(true);
        assert!(matches!(factory.open(), Err(Error::SessionOpen { .. })));
        factory.fail_open(false);
        assert!(factory.open().is_ok());
    }

    #[test]
    fn test_failing_statement_is_not_recorded() {
        let factory = MemorySessionFactory::new();
        factory.fail_statements_containing("BROKEN");
        let mut session = factory.open().unwrap();
        let err = session.exec("BROKEN SQL").unwrap_err();
        assert_eq!(err, Error::session("statement failed: BROKEN SQL"));
        session.exec("SELECT 1").unwrap();
        assert_eq!(factory.log().statements(), vec!["SELECT 1".to_string()]);
    }

    #[test]
    fn test_double_close_is_counted() {
        let factory = MemorySessionFactory::new();
        let mut session = factory.open().unwrap();
        session.close().unwrap();
        assert!(session.close().is_err());
        let log = factory.log();
        assert_eq!(log.closed(), 1);
        assert_eq!(log.double_closes(), 1);
    }

    #[test]
    fn test_query_returns_stubbed_rows() {
        let factory = MemorySessionFactory::new();
        let mut row = Row::new();
        row.insert("name".to_string(), b"ada".to_vec());
        factory.stub_query_rows(vec![row.clone()]);

        let mut session = factory.open().unwrap();
        assert_eq!(session.query("SELECT name FROM t").unwrap(), vec![row]);
    }

    #[test]
    fn test_commit_requires_begin() {
        let factory = MemorySessionFactory::new();
        let mut session = factory.open().unwrap();
        assert!(session.commit().is_err());
        session.begin().unwrap();
        assert!(session.begin().is_err());
        session.commit().unwrap();
        assert_eq!(factory.log().commits(), 1);
    }
}

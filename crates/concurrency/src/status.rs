//! Per-id transaction state shared by every caller of that id.
//!
//! A `TransactionStatus` owns exactly one session for its whole life. All
//! transitions happen under one mutex, and the `flushed` flag is claimed
//! with a compare-exchange so the session is released exactly once no matter
//! how many callers (or the reclamation timer) race to flush it.
//!
//! ```text
//! Uninitialized ──begin──▶ Active ──commit/rollback──▶ Completed
//!       │                    │                            │
//!       └────────────────────┴───────────flush────────────┴──▶ released
//! ```

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use strata_core::error::{Error, Result};
use strata_core::traits::Session;
use tracing::{debug, warn};

use crate::factory::Registry;
use crate::reclaim::{FlushScheduler, ReclaimHandle};

/// Lifecycle state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// Created with a session, not begun
    Uninitialized,
    /// `begin` succeeded; statements run inside the database transaction
    Active,
    /// Committed or rolled back
    Completed,
}

/// A database transaction bound to one session
pub struct Transaction {
    session: Box<dyn Session>,
}

impl Transaction {
    /// Wrap a freshly opened session
    pub fn new(session: Box<dyn Session>) -> Self {
        Self { session }
    }

    /// Id of the bound session
    pub fn session_id(&self) -> &str {
        self.session.id()
    }
}

struct StatusInner {
    owner: Option<String>,
    state: TxnState,
    is_new: bool,
    /// `None` once flushed
    transaction: Option<Transaction>,
    reclaim: Option<ReclaimHandle>,
}

/// Shared state for one transaction id
pub struct TransactionStatus {
    id: String,
    inner: Mutex<StatusInner>,
    completed: AtomicBool,
    flushed: AtomicBool,
    registry: Weak<Registry>,
}

impl TransactionStatus {
    pub(crate) fn new(id: String, transaction: Transaction, registry: Weak<Registry>) -> Self {
        Self {
            id,
            inner: Mutex::new(StatusInner {
                owner: None,
                state: TxnState::Uninitialized,
                is_new: true,
                transaction: Some(transaction),
                reclaim: None,
            }),
            completed: AtomicBool::new(false),
            flushed: AtomicBool::new(false),
            registry,
        }
    }

    /// Transaction id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Caller that began the transaction, if any
    pub fn owner_id(&self) -> Option<String> {
        self.inner.lock().owner.clone()
    }

    /// True when `owner` began this transaction
    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.inner.lock().owner.as_deref() == Some(owner)
    }

    /// True until the first acquirer has claimed the transaction
    pub fn is_new_transaction(&self) -> bool {
        self.inner.lock().is_new
    }

    /// True once committed or rolled back
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// True once the session has been released
    pub fn is_flushed(&self) -> bool {
        self.flushed.load(Ordering::Acquire)
    }

    /// Current lifecycle state
    pub fn state(&self) -> TxnState {
        self.inner.lock().state
    }

    /// Id of the bound session, `None` after flush
    pub fn session_id(&self) -> Option<String> {
        self.inner
            .lock()
            .transaction
            .as_ref()
            .map(|t| t.session_id().to_string())
    }

    /// True while a reclamation timer is armed
    pub fn has_pending_flush(&self) -> bool {
        self.inner.lock().reclaim.is_some()
    }

    /// Claim newness without beginning
    ///
    /// Returns `true` for exactly one caller per status. Used when the
    /// caller will run statements in auto-commit mode.
    pub fn take_new(&self) -> bool {
        std::mem::replace(&mut self.inner.lock().is_new, false)
    }

    /// Begin the transaction for `owner` if nobody has claimed it yet
    ///
    /// Returns `Ok(true)` when this call began the transaction.
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotFound` if the status was flushed, or the
    /// session's begin failure.
    pub fn begin_if_new(&self, owner: &str) -> Result<bool> {
        let mut inner = self.inner.lock();
        self.ensure_live()?;
        if !inner.is_new {
            return Ok(false);
        }
        inner.is_new = false;
        inner.owner = Some(owner.to_string());
        self.begin_locked(&mut inner)?;
        Ok(true)
    }

    /// Begin the database transaction
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the status is `Uninitialized`, or the
    /// session's begin failure.
    pub fn begin(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.ensure_live()?;
        inner.is_new = false;
        self.begin_locked(&mut inner)
    }

    fn begin_locked(&self, inner: &mut StatusInner) -> Result<()> {
        if inner.state != TxnState::Uninitialized {
            return Err(Error::invalid_state(&self.id, "transaction already begun"));
        }
        let transaction = inner
            .transaction
            .as_mut()
            .ok_or_else(|| Error::not_found(&self.id))?;
        transaction.session.begin()?;
        inner.state = TxnState::Active;
        debug!(target: "strata::txn", txn_id = %self.id, session = transaction.session_id(), "Transaction begun");
        Ok(())
    }

    /// Commit the database transaction
    ///
    /// Cancels any armed reclamation timer first. A failed session commit
    /// leaves the status un-completed so the caller can still roll back.
    ///
    /// # Errors
    ///
    /// `TransactionCompleted` if already finalized, `InvalidState` if never
    /// begun, `TransactionNotFound` if flushed, or the session failure.
    pub fn commit(&self) -> Result<()> {
        self.finish(|session| session.commit(), "committed")
    }

    /// Roll back the database transaction
    ///
    /// # Errors
    ///
    /// Same as [`commit`](Self::commit).
    pub fn rollback(&self) -> Result<()> {
        self.finish(|session| session.rollback(), "rolled back")
    }

    fn finish(
        &self,
        op: impl FnOnce(&mut dyn Session) -> Result<()>,
        outcome: &'static str,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        self.ensure_live()?;
        match inner.state {
            TxnState::Completed => return Err(Error::completed(&self.id)),
            TxnState::Uninitialized => {
                return Err(Error::invalid_state(&self.id, "transaction has not begun"))
            }
            TxnState::Active => {}
        }
        if let Some(handle) = inner.reclaim.take() {
            handle.cancel();
        }
        let transaction = inner
            .transaction
            .as_mut()
            .ok_or_else(|| Error::not_found(&self.id))?;
        op(transaction.session.as_mut())?;
        inner.state = TxnState::Completed;
        self.completed.store(true, Ordering::Release);
        debug!(target: "strata::txn", txn_id = %self.id, "Transaction {}", outcome);
        Ok(())
    }

    /// Run `f` against the bound session under the status lock
    ///
    /// # Errors
    ///
    /// `TransactionCompleted` once finalized, `TransactionNotFound` once
    /// flushed, otherwise whatever `f` returns.
    pub fn with_session<T>(&self, f: impl FnOnce(&mut dyn Session) -> Result<T>) -> Result<T> {
        let mut inner = self.inner.lock();
        self.ensure_live()?;
        if inner.state == TxnState::Completed {
            return Err(Error::completed(&self.id));
        }
        let transaction = inner
            .transaction
            .as_mut()
            .ok_or_else(|| Error::not_found(&self.id))?;
        f(transaction.session.as_mut())
    }

    /// Arm a timer that flushes this transaction after `timeout`
    ///
    /// Re-arming replaces the previous timer.
    ///
    /// # Errors
    ///
    /// `TransactionNotFound` if flushed, `InvalidState` if the scheduler is
    /// full or shut down.
    pub fn delay_flush(self: &Arc<Self>, scheduler: &FlushScheduler, timeout: Duration) -> Result<()> {
        let mut inner = self.inner.lock();
        self.ensure_live()?;
        if let Some(previous) = inner.reclaim.take() {
            previous.cancel();
        }
        inner.reclaim = Some(scheduler.schedule(self, timeout)?);
        debug!(target: "strata::txn", txn_id = %self.id, timeout_ms = timeout.as_millis() as u64, "Reclamation armed");
        Ok(())
    }

    /// Disarm the reclamation timer
    ///
    /// Returns `true` if a timer was armed.
    pub fn cancel_delay_flush(&self) -> bool {
        match self.inner.lock().reclaim.take() {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Release the session and leave the registry
    ///
    /// Cancels any armed timer, rolls back a transaction that is still
    /// active, closes the session and removes the registry entry if it is
    /// still this status. Returns `true` only for the call that did the
    /// release.
    pub fn flush(&self) -> bool {
        if !self.claim_flush() {
            return false;
        }
        {
            let mut inner = self.inner.lock();
            if let Some(handle) = inner.reclaim.take() {
                handle.cancel();
            }
            self.release_locked(&mut inner);
        }
        self.unregister();
        true
    }

    /// Flush on behalf of the timer holding `ticket`
    ///
    /// Does nothing if that timer was cancelled or replaced, so a late fire
    /// never releases a session that was finalized in the meantime.
    pub(crate) fn expire(&self, ticket: u64) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.reclaim.as_ref().map(ReclaimHandle::ticket) != Some(ticket) {
                return false;
            }
            inner.reclaim = None;
            if !self.claim_flush() {
                return false;
            }
            warn!(target: "strata::txn", txn_id = %self.id, "Transaction timed out, reclaiming session");
            self.release_locked(&mut inner);
        }
        self.unregister();
        true
    }

    fn claim_flush(&self) -> bool {
        self.flushed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release_locked(&self, inner: &mut StatusInner) {
        let Some(mut transaction) = inner.transaction.take() else {
            return;
        };
        if inner.state == TxnState::Active {
            match transaction.session.rollback() {
                Ok(()) => debug!(target: "strata::txn", txn_id = %self.id, "Rolled back unfinished transaction on flush"),
                Err(e) => warn!(target: "strata::txn", txn_id = %self.id, error = %e, "Rollback on flush failed"),
            }
        }
        if let Err(e) = transaction.session.close() {
            warn!(target: "strata::txn", txn_id = %self.id, error = %e, "Session close failed");
        }
        debug!(target: "strata::txn", txn_id = %self.id, session = transaction.session_id(), "Transaction flushed");
    }

    fn unregister(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_if(&self.id, |_, entry| std::ptr::eq(Arc::as_ptr(entry), self));
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_flushed() {
            return Err(Error::not_found(&self.id));
        }
        Ok(())
    }
}

impl std::fmt::Debug for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionStatus")
            .field("id", &self.id)
            .field("completed", &self.is_completed())
            .field("flushed", &self.is_flushed())
            .finish_non_exhaustive()
    }
}

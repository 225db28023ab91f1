//! Registry of live transactions keyed by transaction id.
//!
//! The factory is the only place a [`TransactionStatus`] is constructed.
//! Creation goes through the `DashMap` entry API, so concurrent first
//! references to the same id open exactly one session.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use strata_core::error::{Error, Result};
use strata_core::traits::SessionFactory;
use tracing::debug;

use crate::status::{Transaction, TransactionStatus};

pub(crate) type Registry = DashMap<String, Arc<TransactionStatus>>;

/// Lookup-or-create registry of transaction statuses
pub struct TransactionFactory {
    sessions: Arc<dyn SessionFactory>,
    registry: Arc<Registry>,
}

impl TransactionFactory {
    /// Create an empty registry backed by `sessions`
    pub fn new(sessions: Arc<dyn SessionFactory>) -> Self {
        Self {
            sessions,
            registry: Arc::new(DashMap::new()),
        }
    }

    /// Return the live status for `id`, creating it on first reference
    ///
    /// A newly created status is bound to a freshly opened session and
    /// reports `is_new_transaction() == true`. An entry whose flush is in
    /// progress is replaced rather than returned.
    ///
    /// # Errors
    ///
    /// `EmptyTransactionId` for `""`, `SessionOpen` if no session can be
    /// acquired.
    pub fn get_transaction_status(&self, id: &str) -> Result<Arc<TransactionStatus>> {
        if id.is_empty() {
            return Err(Error::EmptyTransactionId);
        }
        match self.registry.entry(id.to_string()) {
            Entry::Occupied(entry) if !entry.get().is_flushed() => Ok(Arc::clone(entry.get())),
            Entry::Occupied(mut entry) => {
                let status = self.create(id)?;
                entry.insert(Arc::clone(&status));
                Ok(status)
            }
            Entry::Vacant(entry) => {
                let status = self.create(id)?;
                entry.insert(Arc::clone(&status));
                Ok(status)
            }
        }
    }

    fn create(&self, id: &str) -> Result<Arc<TransactionStatus>> {
        let session = self.sessions.open().map_err(|e| match e {
            Error::SessionOpen { .. } => e,
            other => Error::SessionOpen {
                reason: other.to_string(),
            },
        })?;
        debug!(target: "strata::txn", txn_id = id, session = session.id(), "Transaction status created");
        Ok(Arc::new(TransactionStatus::new(
            id.to_string(),
            Transaction::new(session),
            Arc::downgrade(&self.registry),
        )))
    }

    /// Return the live status for `id` without creating one
    pub fn lookup(&self, id: &str) -> Option<Arc<TransactionStatus>> {
        self.registry
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|status| !status.is_flushed())
    }

    /// True if a live status exists for `id`
    pub fn contains(&self, id: &str) -> bool {
        self.lookup(id).is_some()
    }

    /// Number of registered statuses
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// True if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Ids of every registered status
    pub fn ids(&self) -> Vec<String> {
        self.registry.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Flush every registered status, returning how many this call released
    pub fn flush_all(&self) -> usize {
        let statuses: Vec<_> = self
            .registry
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        statuses.iter().filter(|status| status.flush()).count()
    }
}

impl std::fmt::Debug for TransactionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionFactory")
            .field("live", &self.registry.len())
            .finish_non_exhaustive()
    }
}

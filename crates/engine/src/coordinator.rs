//! Transaction coordinator for request dispatch and lifecycle
//!
//! The coordinator resolves transactions through the registry, applies the
//! propagation policy, and dispatches `TransactionRequest`s:
//!
//! | status     | effect                                                       |
//! |------------|--------------------------------------------------------------|
//! | `None`     | run the statement, commit if the caller owns it, then flush |
//! | `Prepare`  | run the statement inside the open transaction                |
//! | `Commit`   | owner only; commit and flush. Non-owners get a silent no-op  |
//! | `Rollback` | any caller; roll back and flush                              |
//!
//! Accessors (`get_transaction`, `commit`, `rollback`) return `Err`.
//! `do_transaction` never fails; errors travel in the response.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use strata_concurrency::{
    FlushScheduler, Propagation, TransactionDefinition, TransactionFactory, TransactionStatus,
    TxnState,
};
use strata_core::traits::SessionFactory;
use strata_core::{Error, Result};
use tracing::{debug, info, warn};

use crate::config::CoordinatorConfig;
use crate::dto::{ActionType, RequestStatus, TransactionRequest, TransactionResponse};

/// Acquire, commit and roll back transactions by id
pub trait TransactionManager: Send + Sync {
    /// Resolve `transaction_id`, beginning it for `owner_id` when the
    /// propagation policy requires
    ///
    /// # Errors
    ///
    /// `EmptyTransactionId`, `SessionOpen`, `TransactionNotFound` (mandatory
    /// propagation without a transaction), or a begin failure.
    fn get_transaction(
        &self,
        definition: Option<&TransactionDefinition>,
        transaction_id: &str,
        owner_id: &str,
    ) -> Result<Arc<TransactionStatus>>;

    /// Commit a live transaction
    ///
    /// # Errors
    ///
    /// `TransactionNotFound` if no live transaction has this id, otherwise
    /// the status's commit error.
    fn commit(&self, transaction_id: &str) -> Result<()>;

    /// Roll back a live transaction
    ///
    /// # Errors
    ///
    /// Same as [`commit`](Self::commit).
    fn rollback(&self, transaction_id: &str) -> Result<()>;
}

/// Default [`TransactionManager`] backed by a registry and a reclaim timer
///
/// # Memory Ordering
///
/// The metric counters use Relaxed ordering: they are observational only
/// and do not synchronize any other memory.
pub struct TransactionCoordinator {
    factory: TransactionFactory,
    scheduler: FlushScheduler,
    definition: TransactionDefinition,
    total_started: AtomicU64,
    total_committed: AtomicU64,
    total_rolled_back: AtomicU64,
    total_statements: AtomicU64,
    total_failed: AtomicU64,
}

impl TransactionCoordinator {
    /// Create a coordinator with the default configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::Scheduler` if the reclaim worker cannot start.
    pub fn new(sessions: Arc<dyn SessionFactory>) -> Result<Self> {
        Self::from_config(&CoordinatorConfig::default(), sessions)
    }

    /// Create a coordinator from a loaded configuration
    ///
    /// # Errors
    ///
    /// `Error::Config` for invalid settings, `Error::Scheduler` if the
    /// reclaim worker cannot start.
    pub fn from_config(config: &CoordinatorConfig, sessions: Arc<dyn SessionFactory>) -> Result<Self> {
        config.validate()?;
        let scheduler = FlushScheduler::new(config.reclaim_queue_depth)?;
        info!(
            target: "strata::txn",
            propagation = %config.propagation,
            timeout_secs = config.timeout_secs,
            "Transaction coordinator started"
        );
        Ok(Self {
            factory: TransactionFactory::new(sessions),
            scheduler,
            definition: config.definition(),
            total_started: AtomicU64::new(0),
            total_committed: AtomicU64::new(0),
            total_rolled_back: AtomicU64::new(0),
            total_statements: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
        })
    }

    /// Definition applied when a caller passes none
    pub fn default_definition(&self) -> TransactionDefinition {
        self.definition
    }

    /// The registry of live transactions
    pub fn factory(&self) -> &TransactionFactory {
        &self.factory
    }

    /// Ids of every live transaction
    pub fn active_transactions(&self) -> Vec<String> {
        self.factory.ids()
    }

    /// Execute one request, capturing every failure into the response
    pub fn do_transaction(&self, request: &TransactionRequest) -> TransactionResponse {
        let id = request.transaction_id.as_str();
        let status = match self.get_transaction(None, id, &request.owner_id) {
            Ok(status) => status,
            Err(e) => {
                warn!(target: "strata::txn", txn_id = id, error = %e, "Transaction unavailable");
                return self.failed(id, format!("{}: {}", Error::not_found(id), e));
            }
        };
        let Some(session) = status.session_id() else {
            return self.failed(id, Error::not_found(id));
        };
        debug!(target: "strata::txn", txn_id = id, session = %session, status = ?request.status, "Dispatching request");

        match request.status {
            RequestStatus::None => {
                let mut response = self.do_action(request, &status);
                if response.is_ok()
                    && status.is_owned_by(&request.owner_id)
                    && status.state() == TxnState::Active
                {
                    if let Err(e) = self.commit_status(&status) {
                        response = self.failed(id, e);
                    }
                }
                status.flush();
                response
            }
            RequestStatus::Prepare => self.do_action(request, &status),
            RequestStatus::Commit => {
                if !status.is_owned_by(&request.owner_id) {
                    debug!(target: "strata::txn", txn_id = id, owner = %request.owner_id, "Commit by non-owner ignored");
                    return TransactionResponse::ok(id);
                }
                let result = self.commit_status(&status);
                status.flush();
                self.flush_residual(id);
                match result {
                    Ok(()) => TransactionResponse::ok(id),
                    Err(e) => self.failed(id, e),
                }
            }
            RequestStatus::Rollback => {
                let result = self.rollback_status(&status);
                status.flush();
                match result {
                    Ok(()) => TransactionResponse::ok(id),
                    Err(e) => self.failed(id, e),
                }
            }
            RequestStatus::Other(code) => self.failed(id, Error::UnknownAction { code }),
        }
    }

    /// Run the request's statement against `status`'s session
    ///
    /// Session errors are returned verbatim in the response and never roll
    /// the transaction back.
    pub fn do_action(&self, request: &TransactionRequest, status: &TransactionStatus) -> TransactionResponse {
        let id = request.transaction_id.as_str();
        if status.is_completed() {
            return self.failed(id, Error::completed(id));
        }
        let Some(sql) = request.sql.as_deref().filter(|sql| !sql.is_empty()) else {
            return TransactionResponse::ok(id);
        };

        self.total_statements.fetch_add(1, Ordering::Relaxed);
        match request.action_type {
            ActionType::Exec => {
                debug!(target: "strata::txn", txn_id = id, sql, "Exec");
                match status.with_session(|session| session.exec(sql)) {
                    Ok(exec) => TransactionResponse {
                        success: exec.rows_affected,
                        exec,
                        ..TransactionResponse::ok(id)
                    },
                    Err(e) => self.failed(id, e),
                }
            }
            ActionType::Query => {
                debug!(target: "strata::txn", txn_id = id, sql, "Query");
                match status.with_session(|session| session.query(sql)) {
                    Ok(rows) => TransactionResponse {
                        success: rows.len() as u64,
                        query: rows,
                        ..TransactionResponse::ok(id)
                    },
                    Err(e) => self.failed(id, e),
                }
            }
        }
    }

    fn commit_status(&self, status: &TransactionStatus) -> Result<()> {
        status.commit()?;
        self.total_committed.fetch_add(1, Ordering::Relaxed);
        info!(target: "strata::txn", txn_id = status.id(), "Transaction committed");
        Ok(())
    }

    fn rollback_status(&self, status: &TransactionStatus) -> Result<()> {
        status.rollback()?;
        self.total_rolled_back.fetch_add(1, Ordering::Relaxed);
        info!(target: "strata::txn", txn_id = status.id(), "Transaction rolled back");
        Ok(())
    }

    /// Flush whatever is still registered under `id` after a commit
    ///
    /// `lookup` skips flushed statuses, so an entry found here was started
    /// by another caller after the committed one was flushed. It is flushed
    /// all the same. Returns `true` if an entry was flushed.
    fn flush_residual(&self, id: &str) -> bool {
        let Some(residual) = self.factory.lookup(id) else {
            return false;
        };
        debug!(
            target: "strata::txn",
            txn_id = id,
            session = ?residual.session_id(),
            "Flushing transaction registered under the id after commit"
        );
        residual.flush()
    }

    fn failed(&self, id: &str, error: impl fmt::Display) -> TransactionResponse {
        self.total_failed.fetch_add(1, Ordering::Relaxed);
        warn!(target: "strata::txn", txn_id = id, error = %error, "Request failed");
        TransactionResponse::failed(id, error)
    }

    /// Get transaction metrics
    ///
    /// Returns current snapshot of transaction statistics.
    pub fn metrics(&self) -> TransactionMetrics {
        let started = self.total_started.load(Ordering::Relaxed);
        let committed = self.total_committed.load(Ordering::Relaxed);

        TransactionMetrics {
            active_count: self.factory.len() as u64,
            total_started: started,
            total_committed: committed,
            total_rolled_back: self.total_rolled_back.load(Ordering::Relaxed),
            total_reclaimed: self.scheduler.reclaimed(),
            total_statements: self.total_statements.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            commit_rate: if started > 0 {
                committed as f64 / started as f64
            } else {
                0.0
            },
        }
    }

    /// Flush every live transaction and stop the reclaim worker
    ///
    /// Returns the number of transactions released. Idempotent.
    pub fn shutdown(&self) -> usize {
        self.scheduler.shutdown();
        let released = self.factory.flush_all();
        info!(target: "strata::txn", released, "Transaction coordinator shut down");
        released
    }
}

impl TransactionManager for TransactionCoordinator {
    fn get_transaction(
        &self,
        definition: Option<&TransactionDefinition>,
        transaction_id: &str,
        owner_id: &str,
    ) -> Result<Arc<TransactionStatus>> {
        if transaction_id.is_empty() {
            return Err(Error::EmptyTransactionId);
        }
        let definition = definition.copied().unwrap_or(self.definition);
        let status = self.factory.get_transaction_status(transaction_id)?;

        let created = match definition.propagation {
            Propagation::Required => match status.begin_if_new(owner_id) {
                Ok(began) => began,
                Err(e) => {
                    status.flush();
                    return Err(e);
                }
            },
            Propagation::Supports => status.take_new(),
            Propagation::Mandatory => {
                if status.take_new() {
                    status.flush();
                    return Err(Error::not_found(transaction_id));
                }
                false
            }
        };

        if created {
            if definition.propagation == Propagation::Required {
                self.total_started.fetch_add(1, Ordering::Relaxed);
                debug!(target: "strata::txn", txn_id = transaction_id, owner = owner_id, "Transaction started");
            }
            if definition.has_timeout() {
                if let Err(e) = status.delay_flush(&self.scheduler, definition.timeout) {
                    status.flush();
                    return Err(e);
                }
            }
        }
        Ok(status)
    }

    fn commit(&self, transaction_id: &str) -> Result<()> {
        let status = self
            .factory
            .lookup(transaction_id)
            .ok_or_else(|| Error::not_found(transaction_id))?;
        self.commit_status(&status)
    }

    fn rollback(&self, transaction_id: &str) -> Result<()> {
        let status = self
            .factory
            .lookup(transaction_id)
            .ok_or_else(|| Error::not_found(transaction_id))?;
        self.rollback_status(&status)
    }
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("definition", &self.definition)
            .field("factory", &self.factory)
            .finish_non_exhaustive()
    }
}

/// Transaction metrics
///
/// Provides statistics about transaction lifecycle.
#[derive(Debug, Clone)]
pub struct TransactionMetrics {
    /// Number of live transactions in the registry
    pub active_count: u64,
    /// Total number of transactions begun
    pub total_started: u64,
    /// Total number of transactions committed
    pub total_committed: u64,
    /// Total number of transactions rolled back by a caller
    pub total_rolled_back: u64,
    /// Total number of transactions flushed by the timeout
    pub total_reclaimed: u64,
    /// Statements sent to a session
    pub total_statements: u64,
    /// Requests answered with an error
    pub total_failed: u64,
    /// Commit success rate (committed / started)
    pub commit_rate: f64,
}

impl TransactionMetrics {
    /// Total transactions that completed (committed + rolled back)
    pub fn total_completed(&self) -> u64 {
        self.total_committed + self.total_rolled_back
    }

    /// Rollback rate (rolled back / started)
    pub fn rollback_rate(&self) -> f64 {
        if self.total_started > 0 {
            self.total_rolled_back as f64 / self.total_started as f64
        } else {
            0.0
        }
    }
}

//! Transaction lifecycle for strata-mapper
//!
//! This crate owns the per-id transaction state and everything that
//! creates, finalizes or reclaims it:
//! - TransactionFactory: lookup-or-create registry, one session per live id
//! - TransactionStatus: begin/commit/rollback/flush under a per-status lock
//! - TransactionDefinition: propagation policy and timeout
//! - FlushScheduler: cancellable timers that flush unattended transactions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod definition;
pub mod factory;
pub mod reclaim;
pub mod status;

pub use definition::{Propagation, TransactionDefinition};
pub use factory::TransactionFactory;
pub use reclaim::{FlushScheduler, ReclaimHandle, DEFAULT_QUEUE_DEPTH};
pub use status::{Transaction, TransactionStatus, TxnState};

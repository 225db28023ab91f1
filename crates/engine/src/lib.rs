//! Transactional execution engine for strata-mapper
//!
//! This crate sits on top of the transaction lifecycle layer:
//! - TransactionCoordinator: propagation, ownership and request dispatch
//! - DTOs: TransactionRequest in, TransactionResponse out
//! - CoordinatorConfig: `strata-mapper.toml` settings
//!
//! Every request is answered with a response; failures are carried as
//! text in `TransactionResponse::error`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod coordinator;
pub mod dto;

pub use config::{CoordinatorConfig, CONFIG_FILE_NAME};
pub use coordinator::{TransactionCoordinator, TransactionManager, TransactionMetrics};
pub use dto::{ActionType, InvalidActionType, RequestStatus, TransactionRequest, TransactionResponse};

//! Strata Mapper - condition expressions and transactional execution
//!
//! Two halves, usable on their own or together:
//!
//! - [`expr`]: decides whether a dynamic SQL fragment is included, by
//!   evaluating conditions such as `.page <= 0 and .name != null` against
//!   the call's parameters.
//! - [`engine`]: runs statements inside transactions shared by id, with
//!   owner-only commit, rollback from anyone, and timeout reclamation.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use strata_mapper::testing::MemorySessionFactory;
//! use strata_mapper::{lexer_eval, Params, RequestStatus, ResolutionMode};
//! use strata_mapper::{TransactionCoordinator, TransactionRequest};
//!
//! let params = Params::new().with("name", "alice");
//! let mut sql = String::from("UPDATE users SET active = 1");
//! if lexer_eval(".name != null", &params, ResolutionMode::Map)? {
//!     sql.push_str(" WHERE name = 'alice'");
//! }
//!
//! let coordinator = TransactionCoordinator::new(Arc::new(MemorySessionFactory::new()))?;
//! let response = coordinator.do_transaction(
//!     &TransactionRequest::new(RequestStatus::None, "req-1", "svc").with_sql(sql),
//! );
//! assert!(response.is_ok());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use strata_concurrency as concurrency;
pub use strata_engine as engine;
pub use strata_expr as expr;

pub use strata_concurrency::{Propagation, TransactionDefinition, TransactionStatus};
pub use strata_core::testing;
pub use strata_core::{Error, ExecResult, Result, Row, Session, SessionFactory, Value};
pub use strata_engine::{
    ActionType, CoordinatorConfig, RequestStatus, TransactionCoordinator, TransactionManager,
    TransactionMetrics, TransactionRequest, TransactionResponse,
};
pub use strata_expr::{
    eval, lex, lexer_and_or_support, lexer_eval, Condition, ExprError, ExpressionEngine, Params,
    ResolutionMode,
};

//! Core types and traits for Strata Mapper
//!
//! This crate defines the foundational types used throughout the system:
//! - Value: Unified value enum for condition parameters
//! - Error: Transaction lifecycle error taxonomy
//! - Traits: Session and SessionFactory, the database seam
//! - Types: ExecResult and Row returned by sessions
//! - Testing: In-memory session that records every call

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod testing;
pub mod traits;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use traits::{Session, SessionFactory};
pub use types::{ExecResult, Row};
pub use value::Value;

//! Propagation policy and timeout for acquiring a transaction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How a caller joins or starts a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Propagation {
    /// Join the existing transaction, or begin a new one owned by the caller
    #[default]
    Required,
    /// Join an existing begun transaction; otherwise run without beginning
    Supports,
    /// Join an existing begun transaction; fail if there is none
    Mandatory,
}

impl Propagation {
    /// Lowercase name, as written in configuration files
    pub fn as_str(self) -> &'static str {
        match self {
            Propagation::Required => "required",
            Propagation::Supports => "supports",
            Propagation::Mandatory => "mandatory",
        }
    }
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings applied when a transaction is acquired
///
/// A zero `timeout` disables delayed reclamation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionDefinition {
    /// Propagation policy
    pub propagation: Propagation,
    /// How long an unattended transaction may hold its session
    pub timeout: Duration,
}

impl TransactionDefinition {
    /// Definition with the given propagation and no timeout
    pub fn new(propagation: Propagation) -> Self {
        Self {
            propagation,
            timeout: Duration::ZERO,
        }
    }

    /// Set the reclamation timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// True when a positive timeout is configured
    pub fn has_timeout(&self) -> bool {
        !self.timeout.is_zero()
    }
}

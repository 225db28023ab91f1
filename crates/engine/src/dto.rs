//! Request and response types for `TransactionCoordinator::do_transaction`.
//!
//! `RequestStatus` and `ActionType` travel as their integer codes. Any
//! status code decodes; codes dispatch does not know survive as
//! `RequestStatus::Other` and are answered with `UnknownAction`.

use serde::{Deserialize, Serialize};
use std::fmt;
use strata_core::{ExecResult, Row};

/// What the coordinator should do with a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum RequestStatus {
    /// Single statement outside an explicit transaction (code 0)
    #[default]
    None,
    /// Statement inside an open transaction (code 1)
    Prepare,
    /// Commit the transaction (code 2)
    Commit,
    /// Roll back the transaction (code 3)
    Rollback,
    /// Unrecognized wire code
    Other(u8),
}

impl From<u8> for RequestStatus {
    fn from(code: u8) -> Self {
        match code {
            0 => RequestStatus::None,
            1 => RequestStatus::Prepare,
            2 => RequestStatus::Commit,
            3 => RequestStatus::Rollback,
            other => RequestStatus::Other(other),
        }
    }
}

impl From<RequestStatus> for u8 {
    fn from(status: RequestStatus) -> Self {
        match status {
            RequestStatus::None => 0,
            RequestStatus::Prepare => 1,
            RequestStatus::Commit => 2,
            RequestStatus::Rollback => 3,
            RequestStatus::Other(code) => code,
        }
    }
}

/// Kind of statement carried by a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ActionType {
    /// Statement without result rows (code 0)
    #[default]
    Exec,
    /// Statement returning rows (code 1)
    Query,
}

/// Action code outside `0..=1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidActionType(pub u8);

impl fmt::Display for InvalidActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid action type code {}", self.0)
    }
}

impl std::error::Error for InvalidActionType {}

impl TryFrom<u8> for ActionType {
    type Error = InvalidActionType;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ActionType::Exec),
            1 => Ok(ActionType::Query),
            other => Err(InvalidActionType(other)),
        }
    }
}

impl From<ActionType> for u8 {
    fn from(action: ActionType) -> Self {
        match action {
            ActionType::Exec => 0,
            ActionType::Query => 1,
        }
    }
}

/// One unit of work submitted to the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Lifecycle action
    pub status: RequestStatus,
    /// Transaction id, must not be empty
    pub transaction_id: String,
    /// Caller id, compared against the owner on commit
    pub owner_id: String,
    /// Statement to run, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    /// How to run `sql`
    #[serde(default)]
    pub action_type: ActionType,
}

impl TransactionRequest {
    /// Request without a statement
    pub fn new(
        status: RequestStatus,
        transaction_id: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            status,
            transaction_id: transaction_id.into(),
            owner_id: owner_id.into(),
            sql: None,
            action_type: ActionType::Exec,
        }
    }

    /// Attach a statement
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Run the statement as a query
    pub fn query(mut self) -> Self {
        self.action_type = ActionType::Query;
        self
    }
}

/// Outcome of a request
///
/// Errors are carried as text; check [`is_ok`](Self::is_ok).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionResponse {
    /// Echo of the request's transaction id
    pub transaction_id: String,
    /// Empty on success
    pub error: String,
    /// Rows affected by an exec, rows returned by a query, else 0
    pub success: u64,
    /// Rows returned by a query
    #[serde(default)]
    pub query: Vec<Row>,
    /// Result of an exec
    #[serde(default)]
    pub exec: ExecResult,
}

impl TransactionResponse {
    /// Empty successful response
    pub fn ok(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            ..Self::default()
        }
    }

    /// Failed response carrying `error`'s text
    pub fn failed(transaction_id: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            error: error.to_string(),
            ..Self::default()
        }
    }

    /// True when `error` is empty
    pub fn is_ok(&self) -> bool {
        self.error.is_empty()
    }
}

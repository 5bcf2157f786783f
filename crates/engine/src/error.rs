//! Errors the ledger engine can surface.
//!
//! Every variant carries a stable kind so callers can branch on the failure
//! class without parsing messages. Business-rule failures (`InvalidAmount`,
//! `InsufficientFunds`, `PermissionDenied`, ...) are returned before any
//! write is attempted; `Consistency` and `LockTimeout` are retryable.

use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("\"{0}\" already present!")]
    AlreadyExists(String),
    #[error("Goal not active: {0}")]
    GoalInactive(String),
    #[error("Ledger inconsistency: {0}")]
    Consistency(String),
    #[error("Lock wait timed out: {0}")]
    LockTimeout(String),
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),
    #[error("Currency mismatch: {0}")]
    CurrencyMismatch(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Folds backend lock/busy failures into [`EngineError::LockTimeout`] so
    /// callers see one stable retryable kind regardless of database dialect.
    pub(crate) fn normalized(self) -> Self {
        match self {
            Self::Database(err) => {
                let text = err.to_string();
                let lowered = text.to_ascii_lowercase();
                if lowered.contains("database is locked")
                    || lowered.contains("database table is locked")
                    || lowered.contains("lock wait timeout")
                    || lowered.contains("could not obtain lock")
                {
                    Self::LockTimeout(text)
                } else {
                    Self::Database(err)
                }
            }
            other => other,
        }
    }

    /// Whether the failure is transient and safe to retry after backoff.
    ///
    /// `Consistency` is included: an expected pre-mutation state that was not
    /// found usually means a concurrent writer got there first.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LockTimeout(_) | Self::Consistency(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::PermissionDenied(a), Self::PermissionDenied(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::AlreadyExists(a), Self::AlreadyExists(b)) => a == b,
            (Self::GoalInactive(a), Self::GoalInactive(b)) => a == b,
            (Self::Consistency(a), Self::Consistency(b)) => a == b,
            (Self::LockTimeout(a), Self::LockTimeout(b)) => a == b,
            (Self::ConcurrentModification(a), Self::ConcurrentModification(b)) => a == b,
            (Self::CurrencyMismatch(a), Self::CurrencyMismatch(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

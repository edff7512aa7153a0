use tally_ledger::{EventKind, LedgerError};
use thiserror::Error;

/// Error type for a reconciliation pass.
///
/// A failed pass never produces a partial log. The caller keeps the log it
/// passed in.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// Reading the indexed history failed.
    #[error("history read failed: {0}")]
    Read(#[source] LedgerError),

    /// The event feed delivered an error item.
    #[error("event feed failed: {0}")]
    Feed(#[source] LedgerError),

    /// An event arrived without the block position needed to order it.
    #[error("{0:?} event carries no block position")]
    MissingPosition(EventKind),
}

impl ReconcileError {
    /// The ledger failure underneath, if any.
    pub fn ledger_error(&self) -> Option<&LedgerError> {
        match self {
            ReconcileError::Read(err) | ReconcileError::Feed(err) => Some(err),
            ReconcileError::MissingPosition(_) => None,
        }
    }
}

use tally_ledger::LedgerError;
use tally_primitives::{MalformedAmount, U256};
use tally_reconciler::ReconcileError;
use tally_store::{ConflictError, ErrorKind, ErrorReport};
use thiserror::Error;

/// Error type for sync controller operations.
///
/// Errors are categorized into:
/// - **Local**: rejected before anything is sent to the ledger; the store is left unchanged
/// - **Remote**: a ledger interaction failed; surfaced as the snapshot's `last_error`
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// Identity could not be resolved, or the session could not be set up.
    #[error("connection failed: {0}")]
    ConnectionFailed(#[source] LedgerError),

    /// Reading the balance failed.
    #[error("ledger read failed: {0}")]
    Read(#[source] LedgerError),

    /// Deriving the transaction log failed.
    #[error("reconciliation failed: {0}")]
    Reconciliation(#[from] ReconcileError),

    /// The requested amount is not a valid decimal.
    #[error(transparent)]
    MalformedAmount(#[from] MalformedAmount),

    /// A withdrawal exceeds the last known balance.
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: U256, available: U256 },

    /// Another operation is still in flight.
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// The ledger refused the call or it did not take effect.
    #[error("submission failed: {0}")]
    SubmissionFailed(#[source] LedgerError),

    /// The operation needs an established session.
    #[error("not connected")]
    NotConnected,

    /// The controller task is gone.
    #[error("sync controller stopped")]
    ControllerStopped,
}

impl SyncError {
    /// Returns true if the error was raised by a local check and the ledger
    /// was never contacted.
    pub fn is_local(&self) -> bool {
        match self {
            SyncError::MalformedAmount(_)
            | SyncError::InsufficientFunds { .. }
            | SyncError::Conflict(_)
            | SyncError::NotConnected => true,

            SyncError::ConnectionFailed(_)
            | SyncError::Read(_)
            | SyncError::Reconciliation(_)
            | SyncError::SubmissionFailed(_)
            | SyncError::ControllerStopped => false,
        }
    }

    /// The report shown to the user, for errors that came from the ledger.
    pub fn report(&self) -> Option<ErrorReport> {
        let kind = match self {
            SyncError::ConnectionFailed(_) => ErrorKind::ConnectionFailed,
            SyncError::Read(_) => ErrorKind::Read,
            SyncError::Reconciliation(_) => ErrorKind::Reconciliation,
            SyncError::SubmissionFailed(_) => ErrorKind::SubmissionFailed,
            _ => return None,
        };
        Some(ErrorReport::new(kind, self.to_string()))
    }
}

pub(crate) type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use tally_primitives::{Denomination, OperationKind};

    use super::*;

    #[test]
    fn test_local_errors_have_no_report() {
        let local = [
            SyncError::MalformedAmount(Denomination::ether().to_base_units("x").unwrap_err()),
            SyncError::InsufficientFunds {
                requested: U256::from(2u64),
                available: U256::from(1u64),
            },
            SyncError::Conflict(ConflictError {
                existing: OperationKind::Deposit,
            }),
            SyncError::NotConnected,
        ];
        for err in local {
            assert!(err.is_local(), "{err}");
            assert!(err.report().is_none(), "{err}");
        }
    }

    #[test]
    fn test_remote_errors_map_to_report_kind() {
        let err = SyncError::SubmissionFailed(LedgerError::rejected("nonce too low"));
        assert!(!err.is_local());

        let report = err.report().unwrap();
        assert_eq!(report.kind, ErrorKind::SubmissionFailed);
        assert!(report.message.contains("nonce too low"));
    }
}

//! Read-only views handed to the presentation layer.

use std::fmt;

use serde::Serialize;
use tally_primitives::{Identity, OperationKind, PendingOperation, TransactionRecord, U256};

/// Lifecycle phase of a sync session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Disconnected,
    Connecting,
    Ready,
    Submitting,
    Error,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncPhase::Disconnected => "disconnected",
            SyncPhase::Connecting => "connecting",
            SyncPhase::Ready => "ready",
            SyncPhase::Submitting => "submitting",
            SyncPhase::Error => "error",
        };
        f.write_str(s)
    }
}

/// Class of a remote failure surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConnectionFailed,
    Read,
    Reconciliation,
    SubmissionFailed,
}

/// Most recent failure, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Consistent view of the account at one point in time.
///
/// Balance and transactions always come from the same reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSnapshot {
    pub phase: SyncPhase,
    pub address: Option<Identity>,
    /// Absent until the first successful balance read.
    pub balance: Option<U256>,
    pub balance_display: Option<String>,
    pub symbol: String,
    pub transactions: Vec<TransactionRecord>,
    pub pending: Option<PendingOperation>,
    pub last_error: Option<ErrorReport>,
}

impl AccountSnapshot {
    pub fn pending_kind(&self) -> Option<OperationKind> {
        self.pending.as_ref().map(PendingOperation::kind)
    }

    /// Whether a session is established and usable.
    pub fn is_connected(&self) -> bool {
        matches!(self.phase, SyncPhase::Ready | SyncPhase::Submitting)
    }
}

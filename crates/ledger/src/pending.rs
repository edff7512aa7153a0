//! Two-phase handles for submitted mutating calls.

use std::{fmt, future::Future};

use futures::future::BoxFuture;
use tally_primitives::TxHash;

use crate::LedgerError;

/// Proof that a mutating call took effect on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: TxHash,
    pub block: Option<u64>,
}

/// A call the ledger accepted but has not yet confirmed.
///
/// Obtaining the handle is the first phase of a submission. Awaiting
/// [`PendingHandle::await_confirmation`] is the second. The core imposes no
/// timeout on the second phase.
pub struct PendingHandle {
    tx_hash: TxHash,
    confirmation: BoxFuture<'static, Result<Confirmation, LedgerError>>,
}

impl PendingHandle {
    pub fn new<F>(tx_hash: TxHash, confirmation: F) -> Self
    where
        F: Future<Output = Result<Confirmation, LedgerError>> + Send + 'static,
    {
        Self {
            tx_hash,
            confirmation: Box::pin(confirmation),
        }
    }

    /// A handle whose confirmation is already known.
    pub fn ready(tx_hash: TxHash, result: Result<Confirmation, LedgerError>) -> Self {
        Self::new(tx_hash, async move { result })
    }

    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    pub async fn await_confirmation(self) -> Result<Confirmation, LedgerError> {
        self.confirmation.await
    }
}

impl fmt::Debug for PendingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingHandle")
            .field("tx_hash", &self.tx_hash)
            .finish_non_exhaustive()
    }
}

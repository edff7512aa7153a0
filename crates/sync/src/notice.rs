use tally_ledger::{Confirmation, LedgerEvent};
use tally_primitives::{Identity, OperationKind, TxHash, U256};
use tally_reconciler::HistoryStrategy;
use tally_store::{ErrorReport, SyncPhase};

/// Things the presentation layer may want to react to.
#[derive(Debug, Clone)]
pub enum SyncNotice {
    /// The controller moved to a new phase.
    PhaseChanged(SyncPhase),
    /// A session was established.
    Connected {
        address: Identity,
        strategy: HistoryStrategy,
    },
    /// An event arrived on the ledger feed.
    EventObserved(LedgerEvent),
    /// A refresh sequence completed and the store was updated.
    Refreshed { balance: U256, records: usize },
    /// The ledger accepted a mutating call.
    Submitted { kind: OperationKind, tx_hash: TxHash },
    /// A mutating call took effect.
    Confirmed {
        kind: OperationKind,
        confirmation: Confirmation,
    },
    /// A remote operation failed.
    Failed(ErrorReport),
}

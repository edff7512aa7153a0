use parking_lot::RwLock;
use tally_primitives::{
    Denomination, Identity, OperationKind, PendingOperation, TransactionLog, U256,
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use crate::{AccountSnapshot, ErrorReport, SyncPhase};

/// Another mutating operation is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("a {existing} is already pending")]
pub struct ConflictError {
    pub existing: OperationKind,
}

#[derive(Debug, Default)]
struct AccountState {
    phase: SyncPhase,
    address: Option<Identity>,
    balance: Option<U256>,
    log: TransactionLog,
    pending: Option<PendingOperation>,
    last_error: Option<ErrorReport>,
}

impl AccountState {
    fn snapshot(&self, denomination: &Denomination) -> AccountSnapshot {
        AccountSnapshot {
            phase: self.phase,
            address: self.address,
            balance: self.balance,
            balance_display: self.balance.map(|b| denomination.to_display(b)),
            symbol: denomination.symbol().to_owned(),
            transactions: self.log.records().to_vec(),
            pending: self.pending.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Holds the account, its transaction log and the pending operation.
///
/// Every mutation replaces its fields under one write lock and publishes a
/// fresh [`AccountSnapshot`] before the lock is released, so watchers never
/// observe a half-applied write.
#[derive(Debug)]
pub struct AccountStore {
    denomination: Denomination,
    state: RwLock<AccountState>,
    snapshot_tx: watch::Sender<AccountSnapshot>,
}

impl AccountStore {
    pub fn new(denomination: Denomination) -> Self {
        let state = AccountState::default();
        let snapshot_tx = watch::Sender::new(state.snapshot(&denomination));
        Self {
            denomination,
            state: RwLock::new(state),
            snapshot_tx,
        }
    }

    pub fn denomination(&self) -> &Denomination {
        &self.denomination
    }

    fn update<R>(&self, f: impl FnOnce(&mut AccountState) -> R) -> R {
        let mut state = self.state.write();
        let out = f(&mut state);
        self.snapshot_tx
            .send_replace(state.snapshot(&self.denomination));
        out
    }

    /// Starts a session for `address`, dropping data of any previous one.
    pub fn set_account(&self, address: Identity) {
        self.update(|state| {
            if state.address != Some(address) {
                state.balance = None;
                state.log = TransactionLog::new();
                state.pending = None;
            }
            state.address = Some(address);
        });
    }

    pub fn apply_balance(&self, balance: U256) {
        self.update(|state| state.balance = Some(balance));
    }

    pub fn apply_log(&self, log: TransactionLog) {
        self.update(|state| state.log = log);
    }

    /// Applies the outcome of one reconciliation pass in a single write.
    pub fn apply_reconciliation(&self, balance: U256, log: TransactionLog) {
        self.update(|state| {
            state.balance = Some(balance);
            state.log = log;
        });
    }

    /// Marks `op` as in flight, unless another operation already is.
    pub fn begin_pending(&self, op: PendingOperation) -> Result<(), ConflictError> {
        let mut state = self.state.write();
        if let Some(existing) = &state.pending {
            return Err(ConflictError {
                existing: existing.kind(),
            });
        }
        state.pending = Some(op);
        self.snapshot_tx
            .send_replace(state.snapshot(&self.denomination));
        Ok(())
    }

    /// Clears the pending operation, whatever its outcome was.
    pub fn end_pending(&self) -> Option<PendingOperation> {
        self.update(|state| state.pending.take())
    }

    pub fn set_phase(&self, phase: SyncPhase) {
        self.update(|state| {
            if state.phase != phase {
                debug!(from = %state.phase, to = %phase, "sync phase transition");
            }
            state.phase = phase;
        });
    }

    pub fn record_error(&self, report: ErrorReport) {
        self.update(|state| state.last_error = Some(report));
    }

    pub fn clear_error(&self) {
        self.update(|state| state.last_error = None);
    }

    /// Returns the store to its initial disconnected state.
    pub fn reset(&self) {
        self.update(|state| *state = AccountState::default());
    }

    pub fn phase(&self) -> SyncPhase {
        self.state.read().phase
    }

    pub fn address(&self) -> Option<Identity> {
        self.state.read().address
    }

    /// Last balance read from the ledger, if any.
    pub fn balance(&self) -> Option<U256> {
        self.state.read().balance
    }

    pub fn log(&self) -> TransactionLog {
        self.state.read().log.clone()
    }

    pub fn pending(&self) -> Option<PendingOperation> {
        self.state.read().pending.clone()
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<AccountSnapshot> {
        self.snapshot_tx.subscribe()
    }
}

impl Default for AccountStore {
    fn default() -> Self {
        Self::new(Denomination::ether())
    }
}

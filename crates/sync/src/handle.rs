use std::{future::Future, sync::Arc};

use tally_ledger::{Confirmation, LedgerGateway};
use tally_primitives::{Identity, OperationKind, PendingOperation, U256};
use tally_store::{AccountSnapshot, AccountStore};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::debug;

use crate::{
    command::{create_completion, SyncCommand},
    ctx::SyncCtx,
    error::{Result, SyncError},
    task::sync_task,
    SyncNotice,
};

/// Default number of commands that may wait for the task.
const DEFAULT_COMMAND_BUFFER: usize = 16;
/// Default number of notices kept for slow listeners.
const DEFAULT_NOTICE_BUFFER: usize = 64;

/// Handle for driving a sync session and reading its state.
///
/// Cheap to clone. The task exits once every handle is dropped or
/// [`SyncHandle::shutdown`] is called.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    command_tx: mpsc::Sender<SyncCommand>,
    store: Arc<AccountStore>,
    notice_tx: broadcast::Sender<SyncNotice>,
}

impl SyncHandle {
    async fn send<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> SyncCommand,
    ) -> Result<T> {
        let (completion, rx) = create_completion();
        self.command_tx
            .send(make(completion))
            .await
            .map_err(|_| SyncError::ControllerStopped)?;
        rx.await.map_err(|_| SyncError::ControllerStopped)?
    }

    /// Establishes the session: resolves identity, loads balance and history
    /// and subscribes to the ledger feed.
    ///
    /// Returns the current address if a session already exists. A failed
    /// attempt leaves the controller in the error phase until called again.
    pub async fn connect(&self) -> Result<Identity> {
        self.send(|completion| SyncCommand::Connect { completion })
            .await
    }

    /// Deposits `amount`, given in display units.
    pub async fn request_deposit(&self, amount: &str) -> Result<Confirmation> {
        self.request(OperationKind::Deposit, amount).await
    }

    /// Withdraws `amount`, given in display units.
    ///
    /// Rejected locally if it exceeds the last known balance.
    pub async fn request_withdraw(&self, amount: &str) -> Result<Confirmation> {
        self.request(OperationKind::Withdraw, amount).await
    }

    async fn request(&self, kind: OperationKind, amount: &str) -> Result<Confirmation> {
        let amount = self.store.denomination().to_base_units(amount)?;

        // Queue slot first: nothing may await between marking the operation
        // pending and handing it to the task.
        let permit = self
            .command_tx
            .reserve()
            .await
            .map_err(|_| SyncError::ControllerStopped)?;

        let op = self.check_request(kind, amount)?;
        self.store.begin_pending(op.clone())?;
        debug!(%kind, amount = %op.amount(), "request passed local checks");

        let (completion, rx) = create_completion();
        permit.send(SyncCommand::Submit { op, completion });

        let res = rx
            .await
            .unwrap_or_else(|_| Err(SyncError::ControllerStopped));
        if matches!(res, Err(SyncError::ControllerStopped)) {
            self.store.end_pending();
        }
        res
    }

    /// Checks against the current session that run before anything reaches
    /// the ledger.
    fn check_request(&self, kind: OperationKind, amount: U256) -> Result<PendingOperation> {
        let snapshot = self.store.snapshot();
        if !snapshot.is_connected() {
            return Err(SyncError::NotConnected);
        }

        if kind == OperationKind::Withdraw {
            let available = snapshot.balance.unwrap_or_default();
            if amount > available {
                return Err(SyncError::InsufficientFunds {
                    requested: amount,
                    available,
                });
            }
        }

        Ok(PendingOperation::now(kind, amount))
    }

    /// Re-reads balance and history.
    pub async fn refresh(&self) -> Result<()> {
        if !self.store.snapshot().is_connected() {
            return Err(SyncError::NotConnected);
        }
        self.send(|completion| SyncCommand::Refresh { completion })
            .await
    }

    /// Ends the session, releases the feed subscription and stops the task.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(|completion| SyncCommand::Shutdown { completion })
            .await
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        self.store.snapshot()
    }

    /// Returns a watcher for account snapshot updates.
    pub fn snapshot_watcher(&self) -> watch::Receiver<AccountSnapshot> {
        self.store.watch()
    }

    /// Subscribes to controller notices from this point on.
    pub fn notices(&self) -> broadcast::Receiver<SyncNotice> {
        self.notice_tx.subscribe()
    }
}

/// Builder for creating a sync controller with custom configuration.
#[derive(Debug)]
pub struct SyncControllerBuilder<G> {
    gateway: Arc<G>,
    store: Arc<AccountStore>,
    command_buffer: Option<usize>,
    notice_buffer: Option<usize>,
}

impl<G> SyncControllerBuilder<G> {
    /// Creates a new builder. Display units follow the store's denomination.
    pub fn new(gateway: Arc<G>, store: Arc<AccountStore>) -> Self {
        Self {
            gateway,
            store,
            command_buffer: None,
            notice_buffer: None,
        }
    }

    /// Sets how many commands may wait while the task is busy. At least one.
    pub fn with_command_buffer(mut self, v: usize) -> Self {
        self.command_buffer = Some(v.max(1));
        self
    }

    /// Sets how many notices are kept for listeners that fall behind. At
    /// least one.
    pub fn with_notice_buffer(mut self, v: usize) -> Self {
        self.notice_buffer = Some(v.max(1));
        self
    }

    /// Builds and returns the handle and the task. The caller spawns the task.
    pub fn build(self) -> (SyncHandle, impl Future<Output = ()>)
    where
        G: LedgerGateway,
    {
        let (command_tx, command_rx) =
            mpsc::channel(self.command_buffer.unwrap_or(DEFAULT_COMMAND_BUFFER));
        let (notice_tx, _) =
            broadcast::channel(self.notice_buffer.unwrap_or(DEFAULT_NOTICE_BUFFER));

        let handle = SyncHandle {
            command_tx,
            store: self.store.clone(),
            notice_tx: notice_tx.clone(),
        };
        let ctx = SyncCtx {
            gateway: self.gateway,
            store: self.store,
            notice_tx,
        };
        let task = sync_task(ctx, command_rx);

        (handle, task)
    }
}

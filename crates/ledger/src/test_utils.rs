//! In-memory ledger for exercising the sync engine without a node.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tally_primitives::{Identity, SequenceKey, TransactionRecord, TxHash, TxKind, U256};
use tokio::{
    sync::{mpsc, watch},
    time::{self, Instant},
};

use crate::{
    Confirmation, EventKind, EventPosition, HistoryCapability, LedgerError, LedgerEvent,
    LedgerGateway, LedgerSubscription, PendingHandle, SubscriptionItem,
};

const SUBSCRIPTION_CAPACITY: usize = 64;
const GENESIS_TIME: i64 = 1_700_000_000;
const BLOCK_TIME_SECS: i64 = 12;

/// Number of calls the simulated ledger has served, per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimCalls {
    pub resolve_identity: usize,
    pub read_balance: usize,
    pub read_history_len: usize,
    pub read_history_entry: usize,
    pub subscribe: usize,
    pub submit_deposit: usize,
    pub submit_withdraw: usize,
}

/// Blocks callers while closed.
#[derive(Debug)]
struct Gate {
    open: watch::Sender<bool>,
}

impl Gate {
    fn new() -> Self {
        Self {
            open: watch::Sender::new(true),
        }
    }

    fn set(&self, open: bool) {
        self.open.send_replace(open);
    }

    async fn pass(&self) {
        let mut rx = self.open.subscribe();
        // The sender lives as long as the gate.
        let _ = rx.wait_for(|open| *open).await;
    }
}

#[derive(Debug, Default)]
struct Failures {
    identity: Option<LedgerError>,
    subscribe: Option<LedgerError>,
    submit: Option<LedgerError>,
    confirm: Option<LedgerError>,
    reads: Option<LedgerError>,
}

#[derive(Debug)]
struct SimState {
    balance: U256,
    history: Vec<TransactionRecord>,
    block: u64,
    next_tx: u64,
    subscribers: Vec<mpsc::Sender<SubscriptionItem>>,
    last_event: Option<LedgerEvent>,
    calls: SimCalls,
    failures: Failures,
}

impl SimState {
    fn block_time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(GENESIS_TIME + self.block as i64 * BLOCK_TIME_SECS, 0)
            .unwrap_or_default()
    }

    fn next_tx_hash(&mut self) -> TxHash {
        self.next_tx += 1;
        TxHash::from(U256::from(self.next_tx).to_be_bytes::<32>())
    }

    /// Applies a balance change in a new block, records it and emits the event.
    fn apply(&mut self, kind: EventKind, amount: U256, counterparty: Identity) -> u64 {
        self.block += 1;
        let occurred_at = self.block_time();

        match kind.tx_kind() {
            TxKind::Credit => self.balance += amount,
            TxKind::Debit => self.balance = self.balance.saturating_sub(amount),
        }

        let index = self.history.len() as u64;
        self.history.push(TransactionRecord::new(
            kind.tx_kind(),
            amount,
            None,
            occurred_at,
            SequenceKey::Index(index),
        ));

        self.emit(Ok(LedgerEvent {
            kind,
            amount,
            counterparty: Some(counterparty),
            position: Some(EventPosition::new(self.block, 0)),
            occurred_at: Some(occurred_at),
        }));

        self.block
    }

    fn emit(&mut self, item: SubscriptionItem) {
        if let Ok(event) = &item {
            self.last_event = Some(event.clone());
        }
        self.subscribers.retain(|tx| !tx.is_closed());
        for tx in &self.subscribers {
            let _ = tx.try_send(item.clone());
        }
    }

    fn check_reads(&self) -> Result<(), LedgerError> {
        match &self.failures.reads {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Debug)]
struct SimInner {
    identity: Identity,
    capability: HistoryCapability,
    state: Mutex<SimState>,
    read_gate: Gate,
    confirm_gate: Gate,
}

/// Deterministic in-memory [`LedgerGateway`].
///
/// Mutations take effect when their confirmation is awaited. Every balance
/// change, local or injected, is appended to the indexed history and emitted
/// to all live subscriptions.
#[derive(Debug, Clone)]
pub struct SimLedger {
    inner: Arc<SimInner>,
}

impl SimLedger {
    pub fn new(capability: HistoryCapability) -> Self {
        Self::with_identity(capability, Identity::repeat_byte(0x11))
    }

    pub fn with_identity(capability: HistoryCapability, identity: Identity) -> Self {
        Self {
            inner: Arc::new(SimInner {
                identity,
                capability,
                state: Mutex::new(SimState {
                    balance: U256::ZERO,
                    history: Vec::new(),
                    block: 0,
                    next_tx: 0,
                    subscribers: Vec::new(),
                    last_event: None,
                    calls: SimCalls::default(),
                    failures: Failures::default(),
                }),
                read_gate: Gate::new(),
                confirm_gate: Gate::new(),
            }),
        }
    }

    /// Sets the balance without a history entry, like a constructor endowment.
    pub fn endow(&self, balance: U256) {
        self.inner.state.lock().balance = balance;
    }

    pub fn identity(&self) -> Identity {
        self.inner.identity
    }

    pub fn balance(&self) -> U256 {
        self.inner.state.lock().balance
    }

    pub fn history(&self) -> Vec<TransactionRecord> {
        self.inner.state.lock().history.clone()
    }

    pub fn calls(&self) -> SimCalls {
        self.inner.state.lock().calls
    }

    /// Number of subscriptions that have not been released.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    /// Applies a balance change made by another party and emits its event.
    pub fn inject_external(&self, kind: EventKind, amount: U256, counterparty: Identity) {
        self.inner.state.lock().apply(kind, amount, counterparty);
    }

    /// Delivers the most recently emitted event once more.
    pub fn redeliver_last(&self) {
        let mut state = self.inner.state.lock();
        if let Some(event) = state.last_event.clone() {
            state.emit(Ok(event));
        }
    }

    /// Delivers an event without touching the ledger's state.
    pub fn emit_event(&self, event: LedgerEvent) {
        self.inner.state.lock().emit(Ok(event));
    }

    /// Delivers an error item on every subscription.
    pub fn emit_error(&self, err: LedgerError) {
        self.inner.state.lock().emit(Err(err));
    }

    /// Holds balance reads until [`SimLedger::release_reads`].
    pub fn hold_reads(&self) {
        self.inner.read_gate.set(false);
    }

    pub fn release_reads(&self) {
        self.inner.read_gate.set(true);
    }

    /// Holds confirmations until [`SimLedger::release_confirmations`].
    pub fn hold_confirmations(&self) {
        self.inner.confirm_gate.set(false);
    }

    pub fn release_confirmations(&self) {
        self.inner.confirm_gate.set(true);
    }

    pub fn fail_next_identity(&self, err: LedgerError) {
        self.inner.state.lock().failures.identity = Some(err);
    }

    pub fn fail_next_subscribe(&self, err: LedgerError) {
        self.inner.state.lock().failures.subscribe = Some(err);
    }

    pub fn fail_next_submit(&self, err: LedgerError) {
        self.inner.state.lock().failures.submit = Some(err);
    }

    pub fn fail_next_confirmation(&self, err: LedgerError) {
        self.inner.state.lock().failures.confirm = Some(err);
    }

    /// Makes every read fail with `err` until called again with `None`.
    pub fn set_read_failure(&self, err: Option<LedgerError>) {
        self.inner.state.lock().failures.reads = err;
    }

    fn submit(&self, kind: EventKind, amount: U256) -> Result<PendingHandle, LedgerError> {
        let tx_hash = {
            let mut state = self.inner.state.lock();
            match kind {
                EventKind::FundsAdded => state.calls.submit_deposit += 1,
                EventKind::FundsRemoved => state.calls.submit_withdraw += 1,
            }
            if let Some(err) = state.failures.submit.take() {
                return Err(err);
            }
            state.next_tx_hash()
        };

        let inner = self.inner.clone();
        Ok(PendingHandle::new(tx_hash, async move {
            inner.confirm_gate.pass().await;

            let mut state = inner.state.lock();
            if let Some(err) = state.failures.confirm.take() {
                return Err(err);
            }
            if kind == EventKind::FundsRemoved && amount > state.balance {
                return Err(LedgerError::Reverted(tx_hash));
            }
            let block = state.apply(kind, amount, inner.identity);

            Ok(Confirmation {
                tx_hash,
                block: Some(block),
            })
        }))
    }
}

#[async_trait]
impl LedgerGateway for SimLedger {
    async fn resolve_identity(&self) -> Result<Identity, LedgerError> {
        let mut state = self.inner.state.lock();
        state.calls.resolve_identity += 1;
        match state.failures.identity.take() {
            Some(err) => Err(err),
            None => Ok(self.inner.identity),
        }
    }

    async fn read_balance(&self, _account: &Identity) -> Result<U256, LedgerError> {
        self.inner.state.lock().calls.read_balance += 1;
        self.inner.read_gate.pass().await;

        let state = self.inner.state.lock();
        state.check_reads()?;
        Ok(state.balance)
    }

    fn history_capability(&self) -> HistoryCapability {
        self.inner.capability
    }

    async fn read_history_len(&self) -> Result<u64, LedgerError> {
        if self.inner.capability == HistoryCapability::EventsOnly {
            return Err(LedgerError::Unsupported("read_history_len"));
        }
        let mut state = self.inner.state.lock();
        state.calls.read_history_len += 1;
        state.check_reads()?;
        Ok(state.history.len() as u64)
    }

    async fn read_history_entry(&self, index: u64) -> Result<TransactionRecord, LedgerError> {
        if self.inner.capability == HistoryCapability::EventsOnly {
            return Err(LedgerError::Unsupported("read_history_entry"));
        }
        let mut state = self.inner.state.lock();
        state.calls.read_history_entry += 1;
        state.check_reads()?;
        state
            .history
            .get(index as usize)
            .cloned()
            .ok_or_else(|| LedgerError::rpc(format!("history index {index} out of range")))
    }

    async fn subscribe(&self, _kinds: &[EventKind]) -> Result<LedgerSubscription, LedgerError> {
        let mut state = self.inner.state.lock();
        state.calls.subscribe += 1;
        if let Some(err) = state.failures.subscribe.take() {
            return Err(err);
        }
        let (tx, subscription) = LedgerSubscription::channel(SUBSCRIPTION_CAPACITY);
        state.subscribers.push(tx);
        Ok(subscription)
    }

    async fn submit_deposit(&self, amount: U256) -> Result<PendingHandle, LedgerError> {
        self.submit(EventKind::FundsAdded, amount)
    }

    async fn submit_withdraw(&self, amount: U256) -> Result<PendingHandle, LedgerError> {
        self.submit(EventKind::FundsRemoved, amount)
    }
}

/// Polls `cond` until it holds or `timeout` elapses. Returns whether it held.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        time::sleep(Duration::from_millis(5)).await;
    }
}

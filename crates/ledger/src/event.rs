//! Events observed on the ledger's feed.

use chrono::{DateTime, Utc};
use tally_primitives::{Identity, TxKind, U256};
use tokio::sync::mpsc;

use crate::LedgerError;

/// Kind of balance-changing event the ledger emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FundsAdded,
    FundsRemoved,
}

impl EventKind {
    /// Every kind, for subscribing to the full feed.
    pub const ALL: [EventKind; 2] = [EventKind::FundsAdded, EventKind::FundsRemoved];

    pub fn tx_kind(&self) -> TxKind {
        match self {
            EventKind::FundsAdded => TxKind::Credit,
            EventKind::FundsRemoved => TxKind::Debit,
        }
    }
}

/// Where in the ledger's history an event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventPosition {
    pub block: u64,
    pub log_index: u64,
}

impl EventPosition {
    pub fn new(block: u64, log_index: u64) -> Self {
        Self { block, log_index }
    }
}

/// A balance-changing event as delivered by the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEvent {
    pub kind: EventKind,
    pub amount: U256,
    pub counterparty: Option<Identity>,
    /// Missing for events from blocks that are not yet sealed.
    pub position: Option<EventPosition>,
    /// Block time, when the ledger supplies one.
    pub occurred_at: Option<DateTime<Utc>>,
}

/// One item of a subscription feed.
pub type SubscriptionItem = Result<LedgerEvent, LedgerError>;

/// Live feed of ledger events.
///
/// Dropping or cancelling the subscription closes the channel, which tells
/// the producing side to stop.
#[derive(Debug)]
pub struct LedgerSubscription {
    events: mpsc::Receiver<SubscriptionItem>,
}

impl LedgerSubscription {
    /// Creates a subscription together with the sender a gateway feeds it with.
    pub fn channel(capacity: usize) -> (mpsc::Sender<SubscriptionItem>, Self) {
        let (tx, events) = mpsc::channel(capacity);
        (tx, Self { events })
    }

    /// Waits for the next item. `None` once the producer is gone.
    pub async fn next(&mut self) -> Option<SubscriptionItem> {
        self.events.recv().await
    }

    /// Returns an item that is already queued, if any.
    pub fn try_next(&mut self) -> Option<SubscriptionItem> {
        self.events.try_recv().ok()
    }

    /// Drains every item that is already queued.
    pub fn drain_ready(&mut self, into: &mut Vec<SubscriptionItem>) {
        while let Some(item) = self.try_next() {
            into.push(item);
        }
    }

    /// Releases the subscription. No further items are delivered.
    pub fn cancel(mut self) {
        self.events.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(block: u64) -> LedgerEvent {
        LedgerEvent {
            kind: EventKind::FundsAdded,
            amount: U256::from(1u64),
            counterparty: None,
            position: Some(EventPosition::new(block, 0)),
            occurred_at: None,
        }
    }

    #[tokio::test]
    async fn test_drain_ready_collects_queued_items() {
        let (tx, mut sub) = LedgerSubscription::channel(8);
        tx.send(Ok(event(1))).await.unwrap();
        tx.send(Ok(event(2))).await.unwrap();
        tx.send(Err(LedgerError::SubscriptionClosed)).await.unwrap();

        let mut items = Vec::new();
        sub.drain_ready(&mut items);
        assert_eq!(items.len(), 3);
        assert!(sub.try_next().is_none());
    }

    #[tokio::test]
    async fn test_cancel_notifies_producer() {
        let (tx, sub) = LedgerSubscription::channel(8);
        assert!(!tx.is_closed());
        sub.cancel();
        tx.closed().await;
        assert!(tx.send(Ok(event(1))).await.is_err());
    }

    #[tokio::test]
    async fn test_drop_notifies_producer() {
        let (tx, sub) = LedgerSubscription::channel(8);
        drop(sub);
        assert!(tx.is_closed());
    }

    #[test]
    fn test_event_kind_direction() {
        assert_eq!(EventKind::FundsAdded.tx_kind(), TxKind::Credit);
        assert_eq!(EventKind::FundsRemoved.tx_kind(), TxKind::Debit);
    }
}

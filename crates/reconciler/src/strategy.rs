use chrono::Utc;
use tally_ledger::{read_history_indexed_checked, HistoryCapability, LedgerGateway, SubscriptionItem};
use tally_primitives::TransactionLog;
use tracing::debug;

use crate::{record_from_event, ReconcileError};

/// What a reconciliation pass may read from.
#[derive(Debug)]
pub struct ReconcileSource<'a, G> {
    gateway: &'a G,
    observed: &'a [SubscriptionItem],
}

impl<'a, G> ReconcileSource<'a, G> {
    /// `observed` holds the feed items collected since the previous pass,
    /// in arrival order.
    pub fn new(gateway: &'a G, observed: &'a [SubscriptionItem]) -> Self {
        Self { gateway, observed }
    }

    pub fn gateway(&self) -> &'a G {
        self.gateway
    }

    pub fn observed(&self) -> &'a [SubscriptionItem] {
        self.observed
    }
}

/// How the local log is derived, chosen once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryStrategy {
    /// Re-read the whole indexed history and replace the log.
    IndexedPull,
    /// Append one record per observed event.
    EventSourced,
}

impl HistoryStrategy {
    pub fn for_capability(capability: HistoryCapability) -> Self {
        match capability {
            HistoryCapability::Indexed => HistoryStrategy::IndexedPull,
            HistoryCapability::EventsOnly => HistoryStrategy::EventSourced,
        }
    }

    /// Whether a completed pass fully accounts for the ledger balance.
    pub fn pulls_full_history(&self) -> bool {
        matches!(self, HistoryStrategy::IndexedPull)
    }

    /// Runs one reconciliation pass and returns the new log.
    ///
    /// `current` is never modified. On error the caller keeps it as is.
    pub async fn reconcile<G>(
        &self,
        current: &TransactionLog,
        source: ReconcileSource<'_, G>,
    ) -> Result<TransactionLog, ReconcileError>
    where
        G: LedgerGateway,
    {
        match self {
            HistoryStrategy::IndexedPull => {
                let records = read_history_indexed_checked(source.gateway())
                    .await
                    .map_err(ReconcileError::Read)?;
                let log = TransactionLog::from_indexed(records);
                debug!(records = %log.len(), "pulled indexed history");
                Ok(log)
            }
            HistoryStrategy::EventSourced => accumulate_events(current, source.observed()),
        }
    }
}

fn accumulate_events(
    current: &TransactionLog,
    observed: &[SubscriptionItem],
) -> Result<TransactionLog, ReconcileError> {
    let now = Utc::now();
    let mut log = current.clone();
    let mut skipped = 0usize;

    for item in observed {
        let event = item.as_ref().map_err(|e| ReconcileError::Feed(e.clone()))?;
        let record = record_from_event(event, now)?;
        if !log.append_unique(record) {
            skipped += 1;
        }
    }

    debug!(
        observed = %observed.len(),
        %skipped,
        records = %log.len(),
        "accumulated events"
    );
    Ok(log)
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use mockall::predicate::eq;
    use tally_ledger::{
        test_utils::SimLedger, EventKind, EventPosition, LedgerError, LedgerEvent,
        MockLedgerGateway,
    };
    use tally_primitives::{Identity, SequenceKey, TransactionRecord, TxKind, U256};

    use super::*;

    fn event(kind: EventKind, amount: u64, block: u64) -> SubscriptionItem {
        Ok(LedgerEvent {
            kind,
            amount: U256::from(amount),
            counterparty: Some(Identity::repeat_byte(0x22)),
            position: Some(EventPosition::new(block, 0)),
            occurred_at: None,
        })
    }

    fn indexed(index: u64, kind: TxKind, amount: u64) -> TransactionRecord {
        TransactionRecord::new(
            kind,
            U256::from(amount),
            None,
            DateTime::from_timestamp(1_700_000_000 + index as i64, 0).unwrap(),
            SequenceKey::Index(index),
        )
    }

    #[test]
    fn test_strategy_follows_capability() {
        assert_eq!(
            HistoryStrategy::for_capability(HistoryCapability::Indexed),
            HistoryStrategy::IndexedPull
        );
        assert_eq!(
            HistoryStrategy::for_capability(HistoryCapability::EventsOnly),
            HistoryStrategy::EventSourced
        );
    }

    mod indexed_pull_tests {
        use super::*;

        #[tokio::test]
        async fn test_replaces_log_newest_first() {
            // Scenario: ledger holds two entries, local log holds a stale one
            // Expected: log is replaced by the ledger's entries, newest first
            let sim = SimLedger::new(HistoryCapability::Indexed);
            sim.inject_external(EventKind::FundsAdded, U256::from(5u64), sim.identity());
            sim.inject_external(EventKind::FundsRemoved, U256::from(2u64), sim.identity());

            let mut stale = TransactionLog::new();
            stale.append_unique(indexed(7, TxKind::Credit, 100));

            let log = HistoryStrategy::IndexedPull
                .reconcile(&stale, ReconcileSource::new(&sim, &[]))
                .await
                .unwrap();

            let keys: Vec<_> = log.iter().map(|r| r.sequence_key()).collect();
            assert_eq!(keys, vec![SequenceKey::Index(1), SequenceKey::Index(0)]);
            assert!(log.accounts_for(sim.balance()));
        }

        #[tokio::test]
        async fn test_repeated_pull_is_idempotent() {
            let sim = SimLedger::new(HistoryCapability::Indexed);
            sim.inject_external(EventKind::FundsAdded, U256::from(9u64), sim.identity());
            sim.inject_external(EventKind::FundsAdded, U256::from(1u64), sim.identity());

            let first = HistoryStrategy::IndexedPull
                .reconcile(&TransactionLog::new(), ReconcileSource::new(&sim, &[]))
                .await
                .unwrap();
            let second = HistoryStrategy::IndexedPull
                .reconcile(&first, ReconcileSource::new(&sim, &[]))
                .await
                .unwrap();

            assert_eq!(first, second);
            assert_eq!(first.records(), second.records());
        }

        #[tokio::test]
        async fn test_observed_items_are_ignored() {
            // Scenario: an error item is queued on the feed
            // Expected: the indexed pull does not look at the feed
            let sim = SimLedger::new(HistoryCapability::Indexed);
            let observed = vec![Err(LedgerError::SubscriptionClosed)];

            let log = HistoryStrategy::IndexedPull
                .reconcile(
                    &TransactionLog::new(),
                    ReconcileSource::new(&sim, &observed),
                )
                .await
                .unwrap();
            assert!(log.is_empty());
        }

        #[tokio::test]
        async fn test_read_failure_wraps_ledger_error() {
            let mut mock = MockLedgerGateway::new();
            mock.expect_read_history_len().returning(|| Ok(2));
            mock.expect_read_history_entry()
                .with(eq(0))
                .returning(|i| Ok(indexed(i, TxKind::Credit, 1)));
            mock.expect_read_history_entry()
                .with(eq(1))
                .returning(|_| Err(LedgerError::rpc("timeout")));

            let err = HistoryStrategy::IndexedPull
                .reconcile(&TransactionLog::new(), ReconcileSource::new(&mock, &[]))
                .await
                .unwrap_err();
            assert!(matches!(err, ReconcileError::Read(LedgerError::Rpc(_))));
        }
    }

    mod event_sourced_tests {
        use super::*;

        #[tokio::test]
        async fn test_appends_in_arrival_order() {
            let mock = MockLedgerGateway::new();
            let observed = vec![
                event(EventKind::FundsAdded, 10, 4),
                event(EventKind::FundsRemoved, 3, 2),
            ];

            let log = HistoryStrategy::EventSourced
                .reconcile(
                    &TransactionLog::new(),
                    ReconcileSource::new(&mock, &observed),
                )
                .await
                .unwrap();

            let amounts: Vec<_> = log.iter().map(|r| r.amount()).collect();
            assert_eq!(amounts, vec![U256::from(10u64), U256::from(3u64)]);
            assert_eq!(log.records()[0].counterparty(), Some(&Identity::repeat_byte(0x22)));
        }

        #[tokio::test]
        async fn test_duplicate_delivery_yields_one_record() {
            // Scenario: the same event arrives twice in one batch and again in a later batch
            // Expected: exactly one record for it
            let mock = MockLedgerGateway::new();
            let first_batch = vec![
                event(EventKind::FundsAdded, 500, 7),
                event(EventKind::FundsAdded, 500, 7),
            ];
            let log = HistoryStrategy::EventSourced
                .reconcile(
                    &TransactionLog::new(),
                    ReconcileSource::new(&mock, &first_batch),
                )
                .await
                .unwrap();
            assert_eq!(log.len(), 1);

            let second_batch = vec![event(EventKind::FundsAdded, 500, 7)];
            let log = HistoryStrategy::EventSourced
                .reconcile(&log, ReconcileSource::new(&mock, &second_batch))
                .await
                .unwrap();
            assert_eq!(log.len(), 1);
        }

        #[tokio::test]
        async fn test_feed_error_fails_whole_pass() {
            // Scenario: a valid event is followed by an error item
            // Expected: the pass fails and the caller's log is untouched
            let mock = MockLedgerGateway::new();
            let mut current = TransactionLog::new();
            current.append_unique(
                record_from_event(
                    event(EventKind::FundsAdded, 1, 1).as_ref().unwrap(),
                    Utc::now(),
                )
                .unwrap(),
            );
            let before = current.clone();

            let observed = vec![
                event(EventKind::FundsAdded, 2, 2),
                Err(LedgerError::rpc("filter expired")),
            ];
            let err = HistoryStrategy::EventSourced
                .reconcile(&current, ReconcileSource::new(&mock, &observed))
                .await
                .unwrap_err();

            assert!(matches!(err, ReconcileError::Feed(LedgerError::Rpc(_))));
            assert_eq!(current, before);
        }

        #[tokio::test]
        async fn test_never_reads_the_gateway() {
            // A mock without expectations panics on any call.
            let mock = MockLedgerGateway::new();
            let observed = vec![event(EventKind::FundsAdded, 1, 1)];

            let log = HistoryStrategy::EventSourced
                .reconcile(
                    &TransactionLog::new(),
                    ReconcileSource::new(&mock, &observed),
                )
                .await
                .unwrap();
            assert_eq!(log.len(), 1);
        }
    }
}

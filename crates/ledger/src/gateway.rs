use async_trait::async_trait;
use tally_primitives::{Identity, SequenceKey, TransactionRecord, U256};
use tracing::debug;

use crate::{EventKind, LedgerError, LedgerSubscription, PendingHandle};

/// How a ledger exposes its transaction history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryCapability {
    /// A pull-readable history array with a count and per-index reads.
    Indexed,
    /// Only append-only events. History must be accumulated client-side.
    EventsOnly,
}

/// Client interface to the authoritative ledger.
///
/// Reads are single round-trips. Writes are two-phase: the submit call
/// returns once the ledger accepted the call and the returned
/// [`PendingHandle`] resolves once it took effect.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Resolves the identity this session acts as.
    async fn resolve_identity(&self) -> Result<Identity, LedgerError>;

    /// Reads the current balance held by the ledger for `account`.
    async fn read_balance(&self, account: &Identity) -> Result<U256, LedgerError>;

    /// Which history reads the ledger supports.
    fn history_capability(&self) -> HistoryCapability;

    /// Number of entries in the indexed history.
    async fn read_history_len(&self) -> Result<u64, LedgerError>;

    /// Reads one entry of the indexed history.
    async fn read_history_entry(&self, index: u64) -> Result<TransactionRecord, LedgerError>;

    /// Subscribes to the given event kinds.
    async fn subscribe(&self, kinds: &[EventKind]) -> Result<LedgerSubscription, LedgerError>;

    /// Submits a deposit of `amount` base units.
    async fn submit_deposit(&self, amount: U256) -> Result<PendingHandle, LedgerError>;

    /// Submits a withdrawal of `amount` base units.
    async fn submit_withdraw(&self, amount: U256) -> Result<PendingHandle, LedgerError>;
}

/// Reads the full indexed history, oldest entry first.
///
/// This is a checked version of the count-then-fetch loop over
/// [`LedgerGateway::read_history_len`] and [`LedgerGateway::read_history_entry`]
/// that validates every entry carries the index it was requested with.
pub async fn read_history_indexed_checked(
    gateway: &impl LedgerGateway,
) -> Result<Vec<TransactionRecord>, LedgerError> {
    let len = gateway.read_history_len().await?;
    debug!(%len, "reading indexed history");

    let mut records = Vec::new();
    for index in 0..len {
        let record = gateway.read_history_entry(index).await?;
        if record.sequence_key() != SequenceKey::Index(index) {
            return Err(LedgerError::MismatchedHistoryKey {
                requested: index,
                reported: record.sequence_key(),
            });
        }
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use mockall::predicate::eq;
    use tally_primitives::TxKind;

    use super::*;

    fn record(key: SequenceKey) -> TransactionRecord {
        TransactionRecord::new(
            TxKind::Credit,
            U256::from(1u64),
            None,
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            key,
        )
    }

    #[tokio::test]
    async fn test_empty_history_skips_entry_reads() {
        let mut mock = MockLedgerGateway::new();
        mock.expect_read_history_len().times(1).returning(|| Ok(0));
        mock.expect_read_history_entry().times(0);

        let records = read_history_indexed_checked(&mock).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_reads_every_index_in_order() {
        let mut mock = MockLedgerGateway::new();
        mock.expect_read_history_len().times(1).returning(|| Ok(3));
        for i in 0..3 {
            mock.expect_read_history_entry()
                .with(eq(i))
                .times(1)
                .returning(|i| Ok(record(SequenceKey::Index(i))));
        }

        let records = read_history_indexed_checked(&mock).await.unwrap();
        let keys: Vec<_> = records.iter().map(|r| r.sequence_key()).collect();
        assert_eq!(
            keys,
            vec![
                SequenceKey::Index(0),
                SequenceKey::Index(1),
                SequenceKey::Index(2)
            ]
        );
    }

    #[tokio::test]
    async fn test_rejects_mismatched_key() {
        let mut mock = MockLedgerGateway::new();
        mock.expect_read_history_len().times(1).returning(|| Ok(2));
        mock.expect_read_history_entry()
            .with(eq(0))
            .returning(|_| Ok(record(SequenceKey::Index(0))));
        mock.expect_read_history_entry()
            .with(eq(1))
            .returning(|_| Ok(record(SequenceKey::Index(5))));

        let err = read_history_indexed_checked(&mock).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::MismatchedHistoryKey {
                requested: 1,
                reported: SequenceKey::Index(5)
            }
        ));
    }

    #[tokio::test]
    async fn test_propagates_entry_error() {
        let mut mock = MockLedgerGateway::new();
        mock.expect_read_history_len().times(1).returning(|| Ok(4));
        mock.expect_read_history_entry()
            .times(1)
            .returning(|_| Err(LedgerError::rpc("node unavailable")));

        let err = read_history_indexed_checked(&mock).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rpc(_)));
    }
}

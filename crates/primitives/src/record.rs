//! Ledger transaction records.

use alloy_primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of an account on the ledger.
pub type Identity = Address;

/// Hash identifying a submitted ledger transaction.
pub type TxHash = B256;

/// Direction of a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    /// Funds added to the account.
    Credit,
    /// Funds removed from the account.
    Debit,
}

/// Ordering key assigned by the ledger.
///
/// Indexed history sources number records themselves. Event sources only
/// give the position of the log that produced the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SequenceKey {
    /// Position in the ledger's history array.
    Index(u64),
    /// Block number and log index of the originating event.
    Position { block: u64, log_index: u64 },
}

/// A single credit or debit as reported by the ledger. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    kind: TxKind,
    amount: U256,
    counterparty: Option<Identity>,
    occurred_at: DateTime<Utc>,
    sequence_key: SequenceKey,
}

impl TransactionRecord {
    pub fn new(
        kind: TxKind,
        amount: U256,
        counterparty: Option<Identity>,
        occurred_at: DateTime<Utc>,
        sequence_key: SequenceKey,
    ) -> Self {
        Self {
            kind,
            amount,
            counterparty,
            occurred_at,
            sequence_key,
        }
    }

    pub fn kind(&self) -> TxKind {
        self.kind
    }

    pub fn amount(&self) -> U256 {
        self.amount
    }

    pub fn counterparty(&self) -> Option<&Identity> {
        self.counterparty.as_ref()
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn sequence_key(&self) -> SequenceKey {
        self.sequence_key
    }

    pub fn is_credit(&self) -> bool {
        self.kind == TxKind::Credit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_key_ordering() {
        assert!(SequenceKey::Index(1) < SequenceKey::Index(2));

        let early = SequenceKey::Position {
            block: 10,
            log_index: 7,
        };
        let same_block_later = SequenceKey::Position {
            block: 10,
            log_index: 8,
        };
        let next_block = SequenceKey::Position {
            block: 11,
            log_index: 0,
        };
        assert!(early < same_block_later);
        assert!(same_block_later < next_block);
    }

    #[test]
    fn test_record_serialization_shape() {
        let record = TransactionRecord::new(
            TxKind::Credit,
            U256::from(255u64),
            None,
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            SequenceKey::Index(0),
        );

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "Credit");
        assert!(json["amount"].is_string());
        assert_eq!(json["sequence_key"]["Index"], 0);
    }
}

//! Local transaction log derived from the ledger.

use std::{collections::HashSet, slice};

use alloy_primitives::U256;

use crate::record::{SequenceKey, TransactionRecord, TxKind};

/// Ordered sequence of [`TransactionRecord`]s.
///
/// Logs built from an indexed history are ordered newest-first by sequence
/// key. Logs accumulated from events keep arrival order. The log itself does
/// not normalize between the two, it only guarantees key uniqueness.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionLog {
    records: Vec<TransactionRecord>,
    keys: HashSet<SequenceKey>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a log from a full indexed history, newest record first.
    ///
    /// Records sharing a key keep the first occurrence.
    pub fn from_indexed(records: impl IntoIterator<Item = TransactionRecord>) -> Self {
        let mut log = Self::new();
        for record in records {
            log.append_unique(record);
        }
        log.records
            .sort_by(|a, b| b.sequence_key().cmp(&a.sequence_key()));
        log
    }

    /// Appends the record unless one with the same key is already present.
    ///
    /// Returns whether the record was added.
    pub fn append_unique(&mut self, record: TransactionRecord) -> bool {
        if !self.keys.insert(record.sequence_key()) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn contains_key(&self, key: &SequenceKey) -> bool {
        self.keys.contains(key)
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of all amounts of the given kind, saturating at [`U256::MAX`].
    pub fn total(&self, kind: TxKind) -> U256 {
        self.records
            .iter()
            .filter(|r| r.kind() == kind)
            .fold(U256::ZERO, |acc, r| acc.saturating_add(r.amount()))
    }

    /// Credits minus debits, or `None` if debits exceed credits.
    pub fn net_total(&self) -> Option<U256> {
        self.total(TxKind::Credit)
            .checked_sub(self.total(TxKind::Debit))
    }

    /// Whether the log fully accounts for `balance`.
    pub fn accounts_for(&self, balance: U256) -> bool {
        self.net_total() == Some(balance)
    }
}

impl<'a> IntoIterator for &'a TransactionLog {
    type Item = &'a TransactionRecord;
    type IntoIter = slice::Iter<'a, TransactionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

use chrono::{DateTime, Utc};
use tally_ledger::LedgerEvent;
use tally_primitives::{SequenceKey, TransactionRecord};

use crate::ReconcileError;

/// Synthesizes the record an observed event stands for.
///
/// The event's block position becomes the sequence key. `fallback_time` is
/// used only when the ledger supplied no timestamp.
pub fn record_from_event(
    event: &LedgerEvent,
    fallback_time: DateTime<Utc>,
) -> Result<TransactionRecord, ReconcileError> {
    let position = event
        .position
        .ok_or(ReconcileError::MissingPosition(event.kind))?;

    Ok(TransactionRecord::new(
        event.kind.tx_kind(),
        event.amount,
        event.counterparty,
        event.occurred_at.unwrap_or(fallback_time),
        SequenceKey::Position {
            block: position.block,
            log_index: position.log_index,
        },
    ))
}

#[cfg(test)]
mod tests {
    use tally_ledger::{EventKind, EventPosition};
    use tally_primitives::{Identity, TxKind, U256};

    use super::*;

    fn fallback() -> DateTime<Utc> {
        DateTime::from_timestamp(1_800_000_000, 0).unwrap()
    }

    #[test]
    fn test_record_uses_event_metadata() {
        let from = Identity::repeat_byte(0xab);
        let at = DateTime::from_timestamp(1_700_000_012, 0).unwrap();
        let event = LedgerEvent {
            kind: EventKind::FundsRemoved,
            amount: U256::from(42u64),
            counterparty: Some(from),
            position: Some(EventPosition::new(9, 3)),
            occurred_at: Some(at),
        };

        let record = record_from_event(&event, fallback()).unwrap();
        assert_eq!(record.kind(), TxKind::Debit);
        assert_eq!(record.amount(), U256::from(42u64));
        assert_eq!(record.counterparty(), Some(&from));
        assert_eq!(record.occurred_at(), at);
        assert_eq!(
            record.sequence_key(),
            SequenceKey::Position {
                block: 9,
                log_index: 3
            }
        );
    }

    #[test]
    fn test_missing_timestamp_falls_back_to_local_clock() {
        let event = LedgerEvent {
            kind: EventKind::FundsAdded,
            amount: U256::from(1u64),
            counterparty: None,
            position: Some(EventPosition::new(1, 0)),
            occurred_at: None,
        };

        let record = record_from_event(&event, fallback()).unwrap();
        assert_eq!(record.occurred_at(), fallback());
    }

    #[test]
    fn test_missing_position_is_rejected() {
        let event = LedgerEvent {
            kind: EventKind::FundsAdded,
            amount: U256::from(1u64),
            counterparty: None,
            position: None,
            occurred_at: None,
        };

        let err = record_from_event(&event, fallback()).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::MissingPosition(EventKind::FundsAdded)
        ));
    }
}

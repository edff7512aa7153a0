//! Event subscriptions over polled log filters.

use std::time::Duration;

use alloy::{
    primitives::{Address, B256},
    providers::{DynProvider, Provider},
    rpc::types::{Filter, Log},
    sol_types::{Error as SolError, SolEvent},
};
use chrono::DateTime;
use tally_ledger::{EventKind, EventPosition, LedgerError, LedgerEvent, SubscriptionItem};
use tokio::{sync::mpsc, time};
use tracing::{debug, warn};

use crate::{
    abi::{EventLedger, IndexedLedger},
    ContractVariant,
};

/// Topic of the log the variant emits for `kind`.
pub(crate) fn event_signature(variant: ContractVariant, kind: EventKind) -> B256 {
    match (variant, kind) {
        (ContractVariant::Indexed, EventKind::FundsAdded) => IndexedLedger::Deposit::SIGNATURE_HASH,
        (ContractVariant::Indexed, EventKind::FundsRemoved) => {
            IndexedLedger::Withdraw::SIGNATURE_HASH
        }
        (ContractVariant::Events, EventKind::FundsAdded) => EventLedger::FundsAdded::SIGNATURE_HASH,
        (ContractVariant::Events, EventKind::FundsRemoved) => {
            EventLedger::FundsRemoved::SIGNATURE_HASH
        }
    }
}

/// Decodes a contract log into a ledger event. `None` for unrelated logs.
pub(crate) fn decode_event(
    variant: ContractVariant,
    log: &Log,
) -> Result<Option<LedgerEvent>, LedgerError> {
    let Some(topic) = log.topic0().copied() else {
        return Ok(None);
    };
    let decode_err = |e: SolError| LedgerError::decode(e.to_string());

    let (kind, amount, counterparty) = match variant {
        ContractVariant::Indexed => {
            if topic == IndexedLedger::Deposit::SIGNATURE_HASH {
                let ev = log.log_decode::<IndexedLedger::Deposit>().map_err(decode_err)?;
                (EventKind::FundsAdded, ev.inner.data.amount, None)
            } else if topic == IndexedLedger::Withdraw::SIGNATURE_HASH {
                let ev = log.log_decode::<IndexedLedger::Withdraw>().map_err(decode_err)?;
                (EventKind::FundsRemoved, ev.inner.data.amount, None)
            } else {
                return Ok(None);
            }
        }
        ContractVariant::Events => {
            if topic == EventLedger::FundsAdded::SIGNATURE_HASH {
                let ev = log.log_decode::<EventLedger::FundsAdded>().map_err(decode_err)?;
                let data = ev.inner.data;
                (EventKind::FundsAdded, data.amount, Some(data.from))
            } else if topic == EventLedger::FundsRemoved::SIGNATURE_HASH {
                let ev = log.log_decode::<EventLedger::FundsRemoved>().map_err(decode_err)?;
                let data = ev.inner.data;
                (EventKind::FundsRemoved, data.amount, Some(data.to))
            } else {
                return Ok(None);
            }
        }
    };

    let position = log
        .block_number
        .zip(log.log_index)
        .map(|(block, log_index)| EventPosition::new(block, log_index));
    let occurred_at = log
        .block_timestamp
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    Ok(Some(LedgerEvent {
        kind,
        amount,
        counterparty,
        position,
        occurred_at,
    }))
}

/// Polls the contract's logs and forwards decoded events until the
/// subscription is released.
#[derive(Debug)]
pub(crate) struct LogPoller {
    pub provider: DynProvider,
    pub contract: Address,
    pub variant: ContractVariant,
    pub kinds: Vec<EventKind>,
    pub next_block: u64,
    pub interval: Duration,
}

impl LogPoller {
    fn filter(&self) -> Filter {
        let signatures: Vec<B256> = self
            .kinds
            .iter()
            .map(|kind| event_signature(self.variant, *kind))
            .collect();
        Filter::new()
            .address(self.contract)
            .event_signature(signatures)
    }

    pub(crate) async fn run(mut self, tx: mpsc::Sender<SubscriptionItem>) {
        let filter = self.filter();
        let mut ticker = time::interval(self.interval);

        loop {
            tokio::select! {
                _ = tx.closed() => {
                    debug!(contract = %self.contract, "subscription released; stopping log poller");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let latest = match self.provider.get_block_number().await {
                Ok(latest) => latest,
                Err(e) => {
                    warn!(%e, "failed to read chain tip");
                    if tx.send(Err(LedgerError::rpc(e.to_string()))).await.is_err() {
                        return;
                    }
                    continue;
                }
            };
            if latest < self.next_block {
                continue;
            }

            let range = filter.clone().from_block(self.next_block).to_block(latest);
            let logs = match self.provider.get_logs(&range).await {
                Ok(logs) => logs,
                Err(e) => {
                    // The same range is requested again on the next tick.
                    warn!(%e, from = %self.next_block, to = %latest, "failed to read logs");
                    if tx.send(Err(LedgerError::rpc(e.to_string()))).await.is_err() {
                        return;
                    }
                    continue;
                }
            };

            debug!(from = %self.next_block, to = %latest, logs = %logs.len(), "polled logs");
            for log in &logs {
                let item = match decode_event(self.variant, log) {
                    Ok(Some(event)) => Ok(event),
                    Ok(None) => continue,
                    Err(e) => Err(e),
                };
                if tx.send(item).await.is_err() {
                    return;
                }
            }

            self.next_block = latest + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Log as PrimitiveLog, U256};

    use super::*;

    fn rpc_log<E: SolEvent>(event: &E, block: u64, log_index: u64) -> Log {
        Log {
            inner: PrimitiveLog {
                address: Address::repeat_byte(0xcc),
                data: event.encode_log_data(),
            },
            block_number: Some(block),
            log_index: Some(log_index),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_funds_added() {
        let from = Address::repeat_byte(0x42);
        let log = rpc_log(
            &EventLedger::FundsAdded {
                from,
                amount: U256::from(500u64),
            },
            12,
            3,
        );

        let event = decode_event(ContractVariant::Events, &log).unwrap().unwrap();
        assert_eq!(event.kind, EventKind::FundsAdded);
        assert_eq!(event.amount, U256::from(500u64));
        assert_eq!(event.counterparty, Some(from));
        assert_eq!(event.position, Some(EventPosition::new(12, 3)));
        assert!(event.occurred_at.is_none());
    }

    #[test]
    fn test_decode_indexed_withdraw() {
        let log = rpc_log(
            &IndexedLedger::Withdraw {
                amount: U256::from(7u64),
            },
            4,
            0,
        );

        let event = decode_event(ContractVariant::Indexed, &log).unwrap().unwrap();
        assert_eq!(event.kind, EventKind::FundsRemoved);
        assert!(event.counterparty.is_none());
    }

    #[test]
    fn test_unrelated_log_is_skipped() {
        // An indexed-contract log seen through the event-only interface.
        let log = rpc_log(
            &IndexedLedger::Deposit {
                amount: U256::from(1u64),
            },
            1,
            0,
        );
        assert!(decode_event(ContractVariant::Events, &log)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_pending_log_has_no_position() {
        let mut log = rpc_log(
            &IndexedLedger::Deposit {
                amount: U256::from(1u64),
            },
            1,
            0,
        );
        log.block_number = None;

        let event = decode_event(ContractVariant::Indexed, &log).unwrap().unwrap();
        assert!(event.position.is_none());
    }

    #[test]
    fn test_signatures_differ_per_variant() {
        assert_ne!(
            event_signature(ContractVariant::Indexed, EventKind::FundsAdded),
            event_signature(ContractVariant::Events, EventKind::FundsAdded)
        );
    }
}

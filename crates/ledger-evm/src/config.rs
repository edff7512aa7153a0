use std::{str::FromStr, time::Duration};

use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use serde::Deserialize;
use tally_ledger::{HistoryCapability, LedgerError};

/// Default interval between log filter polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Which contract interface is deployed at the configured address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractVariant {
    /// `getTransactionCount`/`getTransaction` history with `Deposit`/`Withdraw` events.
    Indexed,
    /// `FundsAdded`/`FundsRemoved` events only.
    Events,
}

impl ContractVariant {
    pub fn history_capability(&self) -> HistoryCapability {
        match self {
            ContractVariant::Indexed => HistoryCapability::Indexed,
            ContractVariant::Events => HistoryCapability::EventsOnly,
        }
    }
}

impl FromStr for ContractVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "indexed" => Ok(ContractVariant::Indexed),
            "events" => Ok(ContractVariant::Events),
            other => Err(format!(
                "unknown contract variant {other:?} (expected indexed or events)"
            )),
        }
    }
}

/// Connection settings for [`EvmLedger`](crate::EvmLedger).
#[derive(Debug, Clone)]
pub struct EvmLedgerConfig {
    pub rpc_url: String,
    pub contract_address: Address,
    pub variant: ContractVariant,
    /// First block to read events from. `None` starts at the chain tip.
    pub event_start_block: Option<u64>,
    pub poll_interval: Duration,
}

impl EvmLedgerConfig {
    pub fn new(
        rpc_url: impl Into<String>,
        contract_address: Address,
        variant: ContractVariant,
    ) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            contract_address,
            variant,
            event_start_block: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_event_start_block(mut self, block: u64) -> Self {
        self.event_start_block = Some(block);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Parses a hex private key, with or without `0x` prefix.
pub fn parse_signer(key: &str) -> Result<PrivateKeySigner, LedgerError> {
    PrivateKeySigner::from_str(key.trim())
        .map_err(|e| LedgerError::connection(format!("invalid private key: {e}")))
}

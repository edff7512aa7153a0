use std::{fmt, time::Duration};

use alloy::{
    contract::Error as ContractError,
    network::{Ethereum, EthereumWallet},
    primitives::{Address, U256},
    providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use tally_ledger::{
    Confirmation, EventKind, HistoryCapability, LedgerError, LedgerGateway, LedgerSubscription,
    PendingHandle,
};
use tally_primitives::{Identity, SequenceKey, TransactionRecord};
use tracing::{debug, info, warn};

use crate::{
    abi::{parse_kind, parse_timestamp, to_u64, EventLedger, IndexedLedger},
    logs::LogPoller,
    ContractVariant, EvmLedgerConfig,
};

/// Number of decoded events buffered per subscription.
const SUBSCRIPTION_BUFFER: usize = 256;

/// [`LedgerGateway`] over a ledger contract reached through JSON-RPC.
///
/// Mutating calls are signed locally and sent from the signer's address.
pub struct EvmLedger {
    provider: DynProvider,
    signer_address: Address,
    contract: Address,
    variant: ContractVariant,
    event_start_block: Option<u64>,
    poll_interval: Duration,
}

impl fmt::Debug for EvmLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmLedger")
            .field("signer_address", &self.signer_address)
            .field("contract", &self.contract)
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}

impl EvmLedger {
    /// Connects to the RPC endpoint and checks that the contract is deployed.
    pub async fn connect(
        config: EvmLedgerConfig,
        signer: PrivateKeySigner,
    ) -> Result<Self, LedgerError> {
        let signer_address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect(&config.rpc_url)
            .await
            .map_err(|e| LedgerError::connection(format!("{}: {e}", config.rpc_url)))?
            .erased();

        let code = provider
            .get_code_at(config.contract_address)
            .await
            .map_err(|e| LedgerError::connection(e.to_string()))?;
        if code.is_empty() {
            return Err(LedgerError::connection(format!(
                "no contract deployed at {}",
                config.contract_address
            )));
        }

        info!(
            rpc_url = %config.rpc_url,
            contract = %config.contract_address,
            variant = ?config.variant,
            %signer_address,
            "connected to ledger contract"
        );

        Ok(Self {
            provider,
            signer_address,
            contract: config.contract_address,
            variant: config.variant,
            event_start_block: config.event_start_block,
            poll_interval: config.poll_interval,
        })
    }

    fn indexed(&self) -> IndexedLedger::IndexedLedgerInstance<DynProvider> {
        IndexedLedger::new(self.contract, self.provider.clone())
    }

    fn events(&self) -> EventLedger::EventLedgerInstance<DynProvider> {
        EventLedger::new(self.contract, self.provider.clone())
    }

    fn require_indexed(
        &self,
    ) -> Result<IndexedLedger::IndexedLedgerInstance<DynProvider>, LedgerError> {
        match self.variant {
            ContractVariant::Indexed => Ok(self.indexed()),
            ContractVariant::Events => Err(LedgerError::Unsupported("indexed history")),
        }
    }
}

/// Wraps a sent transaction into a handle that resolves on its receipt.
fn pending_handle(pending: PendingTransactionBuilder<Ethereum>) -> PendingHandle {
    let tx_hash = *pending.tx_hash();
    debug!(%tx_hash, "transaction sent");

    PendingHandle::new(tx_hash, async move {
        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| LedgerError::rpc(e.to_string()))?;
        if !receipt.status() {
            warn!(%tx_hash, "transaction reverted");
            return Err(LedgerError::Reverted(tx_hash));
        }
        Ok(Confirmation {
            tx_hash,
            block: receipt.block_number,
        })
    })
}

fn rejected(e: ContractError) -> LedgerError {
    LedgerError::rejected(e.to_string())
}

fn rpc(e: ContractError) -> LedgerError {
    LedgerError::rpc(e.to_string())
}

#[async_trait]
impl LedgerGateway for EvmLedger {
    async fn resolve_identity(&self) -> Result<Identity, LedgerError> {
        Ok(self.signer_address)
    }

    async fn read_balance(&self, account: &Identity) -> Result<U256, LedgerError> {
        // Both interfaces answer for `msg.sender`.
        match self.variant {
            ContractVariant::Indexed => self
                .indexed()
                .getBalance()
                .from(*account)
                .call()
                .await
                .map_err(rpc),
            ContractVariant::Events => self
                .events()
                .getBalance()
                .from(*account)
                .call()
                .await
                .map_err(rpc),
        }
    }

    fn history_capability(&self) -> HistoryCapability {
        self.variant.history_capability()
    }

    async fn read_history_len(&self) -> Result<u64, LedgerError> {
        let count = self
            .require_indexed()?
            .getTransactionCount()
            .from(self.signer_address)
            .call()
            .await
            .map_err(rpc)?;
        to_u64(count, "transaction count")
    }

    async fn read_history_entry(&self, index: u64) -> Result<TransactionRecord, LedgerError> {
        let entry = self
            .require_indexed()?
            .getTransaction(U256::from(index))
            .from(self.signer_address)
            .call()
            .await
            .map_err(rpc)?;

        Ok(TransactionRecord::new(
            parse_kind(&entry.kind)?,
            entry.amount,
            None,
            parse_timestamp(entry.timestamp)?,
            SequenceKey::Index(index),
        ))
    }

    async fn subscribe(&self, kinds: &[EventKind]) -> Result<LedgerSubscription, LedgerError> {
        let next_block = match self.event_start_block {
            Some(block) => block,
            None => {
                let latest = self
                    .provider
                    .get_block_number()
                    .await
                    .map_err(|e| LedgerError::rpc(e.to_string()))?;
                latest + 1
            }
        };

        let (tx, subscription) = LedgerSubscription::channel(SUBSCRIPTION_BUFFER);
        let poller = LogPoller {
            provider: self.provider.clone(),
            contract: self.contract,
            variant: self.variant,
            kinds: kinds.to_vec(),
            next_block,
            interval: self.poll_interval,
        };
        debug!(%next_block, ?kinds, "starting log poller");
        tokio::spawn(poller.run(tx));

        Ok(subscription)
    }

    async fn submit_deposit(&self, amount: U256) -> Result<PendingHandle, LedgerError> {
        let pending = match self.variant {
            ContractVariant::Indexed => self.indexed().deposit().value(amount).send().await,
            ContractVariant::Events => self.events().addFunds().value(amount).send().await,
        }
        .map_err(rejected)?;
        Ok(pending_handle(pending))
    }

    async fn submit_withdraw(&self, amount: U256) -> Result<PendingHandle, LedgerError> {
        let pending = match self.variant {
            ContractVariant::Indexed => self.indexed().withdraw(amount).send().await,
            ContractVariant::Events => self.events().removeFunds(amount).send().await,
        }
        .map_err(rejected)?;
        Ok(pending_handle(pending))
    }
}

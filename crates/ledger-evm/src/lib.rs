//! Ledger gateway backed by a deployed contract on an EVM chain.

mod abi;
mod config;
mod gateway;
mod logs;

pub use config::{parse_signer, ContractVariant, EvmLedgerConfig};
pub use gateway::EvmLedger;

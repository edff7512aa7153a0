//! Core data types shared by the ledger sync crates.

mod log;
mod pending;
mod record;
pub mod units;

pub use alloy_primitives::U256;
pub use log::TransactionLog;
pub use pending::{OperationKind, PendingOperation};
pub use record::{Identity, SequenceKey, TransactionRecord, TxHash, TxKind};
pub use units::{AmountDefect, Denomination, InvalidDecimals, MalformedAmount};

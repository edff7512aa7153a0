use tally_primitives::{SequenceKey, TxHash};
use thiserror::Error;

/// Errors reported by a ledger gateway.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Could not reach the ledger or establish an identity with it.
    #[error("connection error: {0}")]
    Connection(String),

    /// A read or write call failed at the RPC layer.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The ledger answered with data we could not interpret.
    #[error("decode error: {0}")]
    Decode(String),

    /// An indexed history read returned a record for a different index.
    #[error("history entry {requested} reported key {reported:?}")]
    MismatchedHistoryKey {
        requested: u64,
        reported: SequenceKey,
    },

    /// The ledger refused to accept a mutating call.
    #[error("submission rejected: {0}")]
    Rejected(String),

    /// The mutating call was included but did not take effect.
    #[error("transaction {0} reverted")]
    Reverted(TxHash),

    /// The gateway does not expose the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The event feed ended.
    #[error("subscription closed")]
    SubscriptionClosed,
}

impl LedgerError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn rpc(msg: impl Into<String>) -> Self {
        Self::Rpc(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

//! Contract interfaces and conversions of their return values.

use alloy::{primitives::U256, sol};
use chrono::{DateTime, Utc};
use tally_ledger::LedgerError;
use tally_primitives::TxKind;

sol! {
    /// Ledger contract that keeps a readable transaction array.
    #[sol(rpc)]
    contract IndexedLedger {
        function getBalance() external view returns (uint256);
        function getTransactionCount() external view returns (uint256);
        function getTransaction(uint256 index)
            external
            view
            returns (uint256 amount, string memory kind, uint256 timestamp);
        function deposit() external payable;
        function withdraw(uint256 withdrawAmount) external;

        event Deposit(uint256 amount);
        event Withdraw(uint256 amount);
    }
}

sol! {
    /// Ledger contract that only emits events for balance changes.
    #[sol(rpc)]
    contract EventLedger {
        function getBalance() external view returns (uint256);
        function addFunds() external payable;
        function removeFunds(uint256 amount) external;

        event FundsAdded(address indexed from, uint256 amount);
        event FundsRemoved(address indexed to, uint256 amount);
    }
}

/// Maps the kind string stored by the indexed contract.
pub(crate) fn parse_kind(kind: &str) -> Result<TxKind, LedgerError> {
    if kind.eq_ignore_ascii_case("deposit") {
        Ok(TxKind::Credit)
    } else if kind.eq_ignore_ascii_case("withdraw") {
        Ok(TxKind::Debit)
    } else {
        Err(LedgerError::decode(format!("unknown transaction kind {kind:?}")))
    }
}

/// Converts a unix timestamp in seconds as returned by the contract.
pub(crate) fn parse_timestamp(secs: U256) -> Result<DateTime<Utc>, LedgerError> {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| LedgerError::decode(format!("timestamp {secs} out of range")))
}

pub(crate) fn to_u64(value: U256, what: &str) -> Result<u64, LedgerError> {
    u64::try_from(value).map_err(|_| LedgerError::decode(format!("{what} {value} exceeds u64")))
}

//! Interface between the sync engine and the authoritative ledger.

mod error;
mod event;
mod gateway;
mod pending;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::LedgerError;
pub use event::{EventKind, EventPosition, LedgerEvent, LedgerSubscription, SubscriptionItem};
#[cfg(any(test, feature = "test-utils"))]
pub use gateway::MockLedgerGateway;
pub use gateway::{read_history_indexed_checked, HistoryCapability, LedgerGateway};
pub use pending::{Confirmation, PendingHandle};

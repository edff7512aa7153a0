//! Single source of truth for the synced account.

mod snapshot;
mod store;

pub use snapshot::{AccountSnapshot, ErrorKind, ErrorReport, SyncPhase};
pub use store::{AccountStore, ConflictError};

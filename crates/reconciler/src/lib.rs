//! Derives the local transaction log from the ledger's history.

mod error;
mod event;
mod strategy;

pub use error::ReconcileError;
pub use event::record_from_event;
pub use strategy::{HistoryStrategy, ReconcileSource};

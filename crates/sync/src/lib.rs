//! Keeps the local account view in sync with the ledger.
//!
//! A [`SyncControllerBuilder`] produces a cloneable [`SyncHandle`] and a task
//! future. The task is the only component that talks to the ledger or writes
//! to the store. It runs one command or one batch of feed items at a time
//! and coalesces feed items that arrive while it is busy into a single
//! follow-up refresh.

mod command;
mod ctx;
mod error;
mod handle;
mod notice;
mod task;

pub use error::SyncError;
pub use handle::{SyncControllerBuilder, SyncHandle};
pub use notice::SyncNotice;

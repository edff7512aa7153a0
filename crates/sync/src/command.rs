//! Commands sent from handles to the controller task.

use tally_ledger::Confirmation;
use tally_primitives::{Identity, PendingOperation};
use tokio::sync::oneshot;

use crate::error::Result;

/// Completion sender for a command's result.
pub(crate) type Completion<T> = oneshot::Sender<Result<T>>;

#[derive(Debug)]
pub(crate) enum SyncCommand {
    /// Establish a session, or report the current one.
    Connect { completion: Completion<Identity> },

    /// Submit an operation the handle has already validated and marked
    /// pending in the store.
    Submit {
        op: PendingOperation,
        completion: Completion<Confirmation>,
    },

    /// Explicit user re-read of balance and history.
    Refresh { completion: Completion<()> },

    /// End the session and stop the task.
    Shutdown { completion: Completion<()> },
}

/// Creates a completion channel pair.
pub(crate) fn create_completion<T>() -> (Completion<T>, oneshot::Receiver<Result<T>>) {
    oneshot::channel()
}

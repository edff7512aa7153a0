use std::sync::Arc;

use tally_store::{AccountStore, ErrorReport, SyncPhase};
use tokio::sync::broadcast;
use tracing::warn;

use crate::{SyncError, SyncNotice};

pub(crate) struct SyncCtx<G> {
    pub gateway: Arc<G>,
    pub store: Arc<AccountStore>,
    pub notice_tx: broadcast::Sender<SyncNotice>,
}

impl<G> SyncCtx<G> {
    /// Notify listeners. Having none is fine.
    pub(crate) fn notify(&self, notice: SyncNotice) {
        let _ = self.notice_tx.send(notice);
    }

    pub(crate) fn set_phase(&self, phase: SyncPhase) {
        if self.store.phase() != phase {
            self.store.set_phase(phase);
            self.notify(SyncNotice::PhaseChanged(phase));
        }
    }

    /// Surfaces a remote failure as the snapshot's last error.
    pub(crate) fn report_error(&self, err: &SyncError, context: &str) {
        warn!(%err, %context, "sync operation failed");
        if let Some(report) = err.report() {
            self.store.record_error(report.clone());
            self.notify(SyncNotice::Failed(report));
        }
    }

    pub(crate) fn report(&self, report: ErrorReport) {
        self.store.record_error(report.clone());
        self.notify(SyncNotice::Failed(report));
    }
}

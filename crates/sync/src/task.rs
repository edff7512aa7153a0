//! Sync controller task implementation.

use std::{future, mem, ops::ControlFlow};

use tally_ledger::{
    Confirmation, EventKind, LedgerGateway, LedgerSubscription, SubscriptionItem,
};
use tally_primitives::{Identity, OperationKind, PendingOperation};
use tally_reconciler::{HistoryStrategy, ReconcileSource};
use tally_store::{ErrorKind, ErrorReport, SyncPhase};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    command::{Completion, SyncCommand},
    ctx::SyncCtx,
    error::{Result, SyncError},
    SyncNotice,
};

/// State of an established session.
struct Session {
    address: Identity,
    strategy: HistoryStrategy,
    /// `None` once the feed has ended.
    subscription: Option<LedgerSubscription>,
    /// Feed items not yet consumed by a refresh. Non-empty means a refresh is due.
    queued: Vec<SubscriptionItem>,
    /// Events of a failed pass, carried into the next one without forcing it.
    retained: Vec<SubscriptionItem>,
}

impl Session {
    /// Moves every item already waiting on the feed into the queue.
    fn collect_ready<G>(&mut self, ctx: &SyncCtx<G>) {
        let Some(subscription) = self.subscription.as_mut() else {
            return;
        };
        let start = self.queued.len();
        subscription.drain_ready(&mut self.queued);
        for item in &self.queued[start..] {
            observe(item, ctx);
        }
    }

    fn release(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }
}

fn observe<G>(item: &SubscriptionItem, ctx: &SyncCtx<G>) {
    match item {
        Ok(event) => {
            debug!(kind = ?event.kind, amount = %event.amount, "observed ledger event");
            ctx.notify(SyncNotice::EventObserved(event.clone()));
        }
        Err(err) => warn!(%err, "ledger feed delivered an error"),
    }
}

enum Input {
    Command(Option<SyncCommand>),
    Feed(Option<SubscriptionItem>),
}

async fn next_feed_item(session: Option<&mut Session>) -> Option<SubscriptionItem> {
    match session.and_then(|s| s.subscription.as_mut()) {
        Some(subscription) => subscription.next().await,
        None => future::pending().await,
    }
}

/// Main sync controller task.
///
/// Processes one command or one feed item at a time. After every unit of
/// work, feed items that queued up meanwhile are folded into exactly one
/// follow-up refresh.
pub(crate) async fn sync_task<G>(ctx: SyncCtx<G>, mut command_rx: mpsc::Receiver<SyncCommand>)
where
    G: LedgerGateway,
{
    let mut session: Option<Session> = None;
    let mut shutdown = None;
    // Taken off the queue while collecting refresh requests.
    let mut deferred: Option<SyncCommand> = None;

    loop {
        let input = match deferred.take() {
            Some(cmd) => Input::Command(Some(cmd)),
            None => tokio::select! {
                cmd = command_rx.recv() => Input::Command(cmd),
                item = next_feed_item(session.as_mut()) => Input::Feed(item),
            },
        };

        match input {
            Input::Command(None) => {
                debug!("all sync handles dropped; exiting");
                break;
            }
            Input::Command(Some(SyncCommand::Refresh { completion })) => {
                let mut completions = vec![completion];
                deferred = take_queued_refreshes(&mut command_rx, &mut completions);
                explicit_refresh(completions, &mut session, &ctx).await;
            }
            Input::Command(Some(cmd)) => {
                if let ControlFlow::Break(completion) = handle_command(cmd, &mut session, &ctx).await
                {
                    shutdown = Some(completion);
                    break;
                }
            }
            Input::Feed(Some(item)) => {
                if let Some(session) = session.as_mut() {
                    observe(&item, &ctx);
                    session.queued.push(item);
                    run_refresh(session, &ctx).await;
                }
            }
            Input::Feed(None) => {
                if let Some(session) = session.as_mut() {
                    warn!("ledger feed ended; live updates stopped");
                    session.subscription = None;
                    ctx.report(ErrorReport::new(
                        ErrorKind::Reconciliation,
                        "ledger event feed closed",
                    ));
                }
            }
        }

        // Coalesce everything that arrived while busy into one refresh.
        if let Some(session) = session.as_mut() {
            session.collect_ready(&ctx);
            if !session.queued.is_empty() {
                debug!(items = %session.queued.len(), "coalesced refresh");
                run_refresh(session, &ctx).await;
            }
        }
    }

    teardown(&mut session, &ctx);
    if let Some(completion) = shutdown {
        let _ = completion.send(Ok(()));
    }
}

/// Runs one command. Breaks with the completion of a shutdown request.
async fn handle_command<G>(
    cmd: SyncCommand,
    session: &mut Option<Session>,
    ctx: &SyncCtx<G>,
) -> ControlFlow<Completion<()>>
where
    G: LedgerGateway,
{
    match cmd {
        SyncCommand::Connect { completion } => {
            let res = if let Some(existing) = session.as_ref() {
                Ok(existing.address)
            } else {
                ctx.store.clear_error();
                match connect(ctx).await {
                    Ok(new_session) => {
                        let address = new_session.address;
                        *session = Some(new_session);
                        Ok(address)
                    }
                    Err(err) => Err(err),
                }
            };
            let _ = completion.send(res);
        }
        SyncCommand::Submit { op, completion } => {
            let res = match session.as_mut() {
                Some(session) => {
                    ctx.store.clear_error();
                    submit(op, session, ctx).await
                }
                None => {
                    ctx.store.end_pending();
                    Err(SyncError::NotConnected)
                }
            };
            let _ = completion.send(res);
        }
        SyncCommand::Refresh { completion } => {
            explicit_refresh(vec![completion], session, ctx).await;
        }
        SyncCommand::Shutdown { completion } => return ControlFlow::Break(completion),
    }

    ControlFlow::Continue(())
}

/// Moves refresh requests already waiting on the queue into `completions`.
///
/// Stops at the first other command and returns it so it runs next, in
/// order.
fn take_queued_refreshes(
    command_rx: &mut mpsc::Receiver<SyncCommand>,
    completions: &mut Vec<Completion<()>>,
) -> Option<SyncCommand> {
    while let Ok(cmd) = command_rx.try_recv() {
        match cmd {
            SyncCommand::Refresh { completion } => completions.push(completion),
            other => return Some(other),
        }
    }
    None
}

/// One pass for every waiting refresh request. All requests were made
/// before the pass starts, so each gets its result.
async fn explicit_refresh<G>(
    completions: Vec<Completion<()>>,
    session: &mut Option<Session>,
    ctx: &SyncCtx<G>,
) where
    G: LedgerGateway,
{
    if completions.len() > 1 {
        debug!(requests = %completions.len(), "coalesced refresh requests");
    }

    let res = match session.as_mut() {
        Some(session) => {
            ctx.store.clear_error();
            refresh(session, ctx)
                .await
                .inspect_err(|err| ctx.report_error(err, "refresh"))
        }
        None => Err(SyncError::NotConnected),
    };

    for completion in completions {
        let _ = completion.send(res.clone());
    }
}

/// Runs the connect sequence. On failure the phase is left at `Error`
/// until the next explicit connect.
async fn connect<G>(ctx: &SyncCtx<G>) -> Result<Session>
where
    G: LedgerGateway,
{
    ctx.set_phase(SyncPhase::Connecting);

    match establish(ctx).await {
        Ok(session) => {
            info!(address = %session.address, strategy = ?session.strategy, "sync session ready");
            ctx.set_phase(SyncPhase::Ready);
            ctx.notify(SyncNotice::Connected {
                address: session.address,
                strategy: session.strategy,
            });
            Ok(session)
        }
        Err(err) => {
            ctx.report_error(&err, "connect");
            ctx.set_phase(SyncPhase::Error);
            Err(err)
        }
    }
}

async fn establish<G>(ctx: &SyncCtx<G>) -> Result<Session>
where
    G: LedgerGateway,
{
    let address = ctx
        .gateway
        .resolve_identity()
        .await
        .map_err(SyncError::ConnectionFailed)?;
    ctx.store.set_account(address);

    let strategy = HistoryStrategy::for_capability(ctx.gateway.history_capability());
    debug!(%address, ?strategy, "resolved identity");

    // Subscribe before the initial pass so nothing emitted in between is lost.
    let subscription = ctx
        .gateway
        .subscribe(&EventKind::ALL)
        .await
        .map_err(SyncError::ConnectionFailed)?;

    let mut session = Session {
        address,
        strategy,
        subscription: Some(subscription),
        queued: Vec::new(),
        retained: Vec::new(),
    };

    if let Err(err) = refresh(&mut session, ctx).await {
        session.release();
        return Err(err);
    }

    Ok(session)
}

/// Submits `op` and waits for it to take effect. The operation is already
/// marked pending in the store.
async fn submit<G>(
    op: PendingOperation,
    session: &mut Session,
    ctx: &SyncCtx<G>,
) -> Result<Confirmation>
where
    G: LedgerGateway,
{
    let kind = op.kind();
    ctx.set_phase(SyncPhase::Submitting);
    info!(%kind, amount = %op.amount(), "submitting");

    let confirmation = match submit_and_confirm(&op, ctx).await {
        Ok(confirmation) => confirmation,
        Err(err) => {
            ctx.store.end_pending();
            ctx.report_error(&err, "submit");
            ctx.set_phase(SyncPhase::Error);
            ctx.set_phase(SyncPhase::Ready);
            return Err(err);
        }
    };

    info!(%kind, tx_hash = %confirmation.tx_hash, "submission confirmed");
    ctx.store.end_pending();
    ctx.notify(SyncNotice::Confirmed { kind, confirmation });

    // The confirmation is the only guaranteed signal that the effect is
    // visible, so always re-read even if the feed already delivered it.
    if let Err(err) = refresh(session, ctx).await {
        ctx.report_error(&err, "refresh after submission");
    }
    ctx.set_phase(SyncPhase::Ready);

    Ok(confirmation)
}

async fn submit_and_confirm<G>(op: &PendingOperation, ctx: &SyncCtx<G>) -> Result<Confirmation>
where
    G: LedgerGateway,
{
    let pending = match op.kind() {
        OperationKind::Deposit => ctx.gateway.submit_deposit(op.amount()).await,
        OperationKind::Withdraw => ctx.gateway.submit_withdraw(op.amount()).await,
    }
    .map_err(SyncError::SubmissionFailed)?;

    debug!(kind = %op.kind(), tx_hash = %pending.tx_hash(), "submission accepted");
    ctx.notify(SyncNotice::Submitted {
        kind: op.kind(),
        tx_hash: pending.tx_hash(),
    });

    pending
        .await_confirmation()
        .await
        .map_err(SyncError::SubmissionFailed)
}

/// Refresh triggered by the feed. Failures are reported, not returned.
async fn run_refresh<G>(session: &mut Session, ctx: &SyncCtx<G>)
where
    G: LedgerGateway,
{
    if let Err(err) = refresh(session, ctx).await {
        ctx.report_error(&err, "event refresh");
    }
}

/// One refresh sequence: balance read, reconciliation pass, store update.
///
/// Consumes every queued feed item. On failure the store keeps its prior
/// state and well-formed events are retained for the next pass.
async fn refresh<G>(session: &mut Session, ctx: &SyncCtx<G>) -> Result<()>
where
    G: LedgerGateway,
{
    session.collect_ready(ctx);
    let mut observed = mem::take(&mut session.retained);
    observed.append(&mut session.queued);

    match refresh_inner(session.address, session.strategy, &observed, ctx).await {
        Ok(()) => Ok(()),
        Err(err) => {
            if session.strategy == HistoryStrategy::EventSourced {
                session.retained = observed
                    .into_iter()
                    .filter(|item| matches!(item, Ok(event) if event.position.is_some()))
                    .collect();
            }
            Err(err)
        }
    }
}

async fn refresh_inner<G>(
    address: Identity,
    strategy: HistoryStrategy,
    observed: &[SubscriptionItem],
    ctx: &SyncCtx<G>,
) -> Result<()>
where
    G: LedgerGateway,
{
    let balance = ctx
        .gateway
        .read_balance(&address)
        .await
        .map_err(SyncError::Read)?;

    let current = ctx.store.log();
    let log = strategy
        .reconcile(&current, ReconcileSource::new(ctx.gateway.as_ref(), observed))
        .await?;

    if strategy.pulls_full_history() && !log.accounts_for(balance) {
        warn!(
            %balance,
            net = ?log.net_total(),
            "history does not account for balance"
        );
    }

    let records = log.len();
    ctx.store.apply_reconciliation(balance, log);
    debug!(%balance, %records, "refreshed account");
    ctx.notify(SyncNotice::Refreshed { balance, records });

    Ok(())
}

fn teardown<G>(session: &mut Option<Session>, ctx: &SyncCtx<G>) {
    if let Some(mut session) = session.take() {
        info!(address = %session.address, "ending sync session");
        session.release();
    }
    ctx.store.reset();
    ctx.notify(SyncNotice::PhaseChanged(SyncPhase::Disconnected));
}

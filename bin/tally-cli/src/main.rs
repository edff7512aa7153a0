//! Command-line client that keeps a ledger account in sync and submits
//! deposits and withdrawals.

mod args;
mod config;
mod output;

use std::sync::Arc;

use args::{Args, Command, EnvArgs};
use config::Config;
use eyre::Context;
use output::{format_notice, format_record, format_snapshot};
use tally_common::logging;
use tally_ledger_evm::{parse_signer, EvmLedger};
use tally_store::AccountStore;
use tally_sync::{SyncControllerBuilder, SyncHandle};
use tokio::{runtime, signal, task::JoinHandle};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::{info, warn};

fn main() -> eyre::Result<()> {
    let args: Args = argh::from_env();
    if let Err(e) = main_inner(args) {
        eprintln!("FATAL ERROR: {e:#}");

        return Err(e);
    }

    Ok(())
}

fn main_inner(args: Args) -> eyre::Result<()> {
    let env_args = EnvArgs::from_env();
    let config = Config::load(&args, &env_args)?;

    // Init the logging before we do anything else.
    logging::init(config.logger_config()).wrap_err("init: logging")?;

    let runtime = runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("tally-rt")
        .build()
        .wrap_err("init: build rt")?;

    runtime.block_on(run(args.cmd, config))
}

async fn run(cmd: Command, config: Config) -> eyre::Result<()> {
    let signer = parse_signer(&config.private_key)?;
    let ledger = EvmLedger::connect(config.ledger_config(), signer).await?;

    let store = Arc::new(AccountStore::new(config.denomination.clone()));
    let (handle, task) = SyncControllerBuilder::new(Arc::new(ledger), store).build();
    let task = tokio::spawn(task);

    let address = handle.connect().await?;
    info!(%address, "account synced");

    let res = run_command(cmd, &handle, &config).await;
    let teardown = shutdown(&handle, task).await;

    settle(res, teardown)
}

async fn shutdown(handle: &SyncHandle, task: JoinHandle<()>) -> eyre::Result<()> {
    handle.shutdown().await?;
    task.await.wrap_err("sync task panicked")?;
    Ok(())
}

/// The command's own error wins over a failed teardown.
fn settle(res: eyre::Result<()>, teardown: eyre::Result<()>) -> eyre::Result<()> {
    match (res, teardown) {
        (Err(e), Err(teardown_err)) => {
            warn!(%teardown_err, "shutdown failed after command error");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), teardown) => teardown,
    }
}

async fn run_command(cmd: Command, handle: &SyncHandle, config: &Config) -> eyre::Result<()> {
    let denom = &config.denomination;

    match cmd {
        Command::Status(args) => {
            let snapshot = handle.snapshot();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print!("{}", format_snapshot(&snapshot));
            }
        }

        Command::History(args) => {
            let snapshot = handle.snapshot();
            let limit = args.limit.unwrap_or(usize::MAX);
            for record in snapshot.transactions.iter().take(limit) {
                println!("{}", format_record(denom, record));
            }
        }

        Command::Deposit(args) => {
            let confirmation = handle.request_deposit(&args.amount).await?;
            println!("deposit confirmed: {}", confirmation.tx_hash);
            print!("{}", format_snapshot(&handle.snapshot()));
        }

        Command::Withdraw(args) => {
            let confirmation = handle.request_withdraw(&args.amount).await?;
            println!("withdraw confirmed: {}", confirmation.tx_hash);
            print!("{}", format_snapshot(&handle.snapshot()));
        }

        Command::Watch(_) => {
            print!("{}", format_snapshot(&handle.snapshot()));

            let mut notices = BroadcastStream::new(handle.notices());
            loop {
                tokio::select! {
                    res = signal::ctrl_c() => {
                        res.wrap_err("listening for ctrl-c")?;
                        info!("interrupted; shutting down");
                        break;
                    }
                    notice = notices.next() => match notice {
                        Some(Ok(notice)) => println!("{}", format_notice(denom, &notice)),
                        Some(Err(e)) => warn!(%e, "notice stream lagged"),
                        None => break,
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use eyre::eyre;

    use super::*;

    #[test]
    fn test_command_error_wins_over_shutdown_error() {
        let err = settle(Err(eyre!("insufficient funds")), Err(eyre!("controller stopped")))
            .unwrap_err();
        assert_eq!(err.to_string(), "insufficient funds");
    }

    #[test]
    fn test_shutdown_error_reported_after_success() {
        let err = settle(Ok(()), Err(eyre!("controller stopped"))).unwrap_err();
        assert_eq!(err.to_string(), "controller stopped");
        assert!(settle(Ok(()), Ok(())).is_ok());
    }
}

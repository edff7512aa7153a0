use std::{env, path::PathBuf};

use argh::FromArgs;
use tally_ledger_evm::ContractVariant;

/// Configs overridable by environment. Mostly for sensitive data.
#[derive(Debug, Clone, Default)]
pub(crate) struct EnvArgs {
    /// Path to the config file
    pub config: Option<PathBuf>,
    /// Hex private key of the account
    pub private_key: Option<String>,
}

impl EnvArgs {
    pub(crate) fn from_env() -> Self {
        Self {
            config: env::var_os("TALLY_CONFIG").map(PathBuf::from),
            private_key: env::var("TALLY_PRIVATE_KEY").ok(),
        }
    }
}

#[derive(Debug, Clone, FromArgs)]
#[argh(description = "Ledger account sync client")]
pub(crate) struct Args {
    #[argh(option, short = 'c', description = "path to the TOML config file")]
    pub config: Option<PathBuf>,

    #[argh(option, short = 'r', description = "JSON-RPC endpoint of the ledger chain")]
    pub rpc_url: Option<String>,

    #[argh(option, short = 'a', description = "address of the ledger contract")]
    pub contract_address: Option<String>,

    #[argh(option, description = "contract interface: indexed or events")]
    pub contract_variant: Option<ContractVariant>,

    #[argh(option, description = "first block to read ledger events from")]
    pub event_start_block: Option<u64>,

    #[argh(option, description = "poll interval for ledger events in ms")]
    pub poll_interval_ms: Option<u64>,

    #[argh(switch, description = "log in JSON format")]
    pub json_logs: bool,

    #[argh(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Clone, PartialEq, FromArgs)]
#[argh(subcommand)]
pub(crate) enum Command {
    Status(StatusArgs),
    History(HistoryArgs),
    Deposit(DepositArgs),
    Withdraw(WithdrawArgs),
    Watch(WatchArgs),
}

/// Connects and prints the account snapshot
#[derive(Debug, Clone, PartialEq, FromArgs)]
#[argh(subcommand, name = "status")]
pub(crate) struct StatusArgs {
    /// print the snapshot as JSON
    #[argh(switch)]
    pub json: bool,
}

/// Prints the account's transaction history, newest first
#[derive(Debug, Clone, PartialEq, FromArgs)]
#[argh(subcommand, name = "history")]
pub(crate) struct HistoryArgs {
    /// print at most this many records
    #[argh(option, short = 'n')]
    pub limit: Option<usize>,
}

/// Deposits funds into the ledger
#[derive(Debug, Clone, PartialEq, FromArgs)]
#[argh(subcommand, name = "deposit")]
pub(crate) struct DepositArgs {
    /// amount in display units, e.g. 0.5
    #[argh(positional)]
    pub amount: String,
}

/// Withdraws funds from the ledger
#[derive(Debug, Clone, PartialEq, FromArgs)]
#[argh(subcommand, name = "withdraw")]
pub(crate) struct WithdrawArgs {
    /// amount in display units, e.g. 0.5
    #[argh(positional)]
    pub amount: String,
}

/// Follows the ledger and prints updates until interrupted
#[derive(Debug, Clone, PartialEq, FromArgs)]
#[argh(subcommand, name = "watch")]
pub(crate) struct WatchArgs {}

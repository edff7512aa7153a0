//! Plain-text rendering of account state for the terminal.

use std::fmt::Write;

use tally_primitives::{Denomination, TransactionRecord, TxKind};
use tally_store::AccountSnapshot;
use tally_sync::SyncNotice;

pub(crate) fn format_record(denom: &Denomination, record: &TransactionRecord) -> String {
    let (kind, direction) = match record.kind() {
        TxKind::Credit => ("credit", "from"),
        TxKind::Debit => ("debit", "to"),
    };
    let mut line = format!(
        "{}  {:<6}  {} {}",
        record.occurred_at().format("%Y-%m-%d %H:%M:%S"),
        kind,
        denom.to_display(record.amount()),
        denom.symbol(),
    );
    if let Some(counterparty) = record.counterparty() {
        let _ = write!(line, "  {direction} {counterparty}");
    }
    line
}

pub(crate) fn format_snapshot(snapshot: &AccountSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "phase:        {}", snapshot.phase);
    match &snapshot.address {
        Some(address) => {
            let _ = writeln!(out, "address:      {address}");
        }
        None => {
            let _ = writeln!(out, "address:      -");
        }
    }
    let _ = writeln!(
        out,
        "balance:      {} {}",
        snapshot.balance_display.as_deref().unwrap_or("-"),
        snapshot.symbol
    );
    let _ = writeln!(out, "transactions: {}", snapshot.transactions.len());
    if let Some(kind) = snapshot.pending_kind() {
        let _ = writeln!(out, "pending:      {kind}");
    }
    if let Some(err) = &snapshot.last_error {
        let _ = writeln!(out, "last error:   {}", err.message);
    }
    out
}

pub(crate) fn format_notice(denom: &Denomination, notice: &SyncNotice) -> String {
    match notice {
        SyncNotice::PhaseChanged(phase) => format!("phase -> {phase}"),
        SyncNotice::Connected { address, strategy } => {
            format!("connected as {address} ({strategy:?})")
        }
        SyncNotice::EventObserved(event) => format!(
            "ledger event {:?} {} {}",
            event.kind,
            denom.to_display(event.amount),
            denom.symbol()
        ),
        SyncNotice::Refreshed { balance, records } => format!(
            "balance {} {} ({records} transactions)",
            denom.to_display(*balance),
            denom.symbol()
        ),
        SyncNotice::Submitted { kind, tx_hash } => format!("{kind} submitted: {tx_hash}"),
        SyncNotice::Confirmed { kind, confirmation } => match confirmation.block {
            Some(block) => format!("{kind} confirmed in block {block}"),
            None => format!("{kind} confirmed"),
        },
        SyncNotice::Failed(report) => format!("error: {}", report.message),
    }
}

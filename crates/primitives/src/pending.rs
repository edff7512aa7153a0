//! In-flight user operations.

use std::fmt;

use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of mutating call a user can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Deposit,
    Withdraw,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Deposit => f.write_str("deposit"),
            OperationKind::Withdraw => f.write_str("withdraw"),
        }
    }
}

/// A mutating call between submission and confirmation or failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    kind: OperationKind,
    amount: U256,
    requested_at: DateTime<Utc>,
}

impl PendingOperation {
    pub fn new(kind: OperationKind, amount: U256, requested_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            amount,
            requested_at,
        }
    }

    /// Creates an operation requested now.
    pub fn now(kind: OperationKind, amount: U256) -> Self {
        Self::new(kind, amount, Utc::now())
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn amount(&self) -> U256 {
        self.amount
    }

    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }
}

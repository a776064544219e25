use crate::domain::account::{Credits, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Checkout session reference issued by the external payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionRef(pub String);

impl fmt::Display for SessionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionRef {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Product reference; the provider-side product carries the credit amount.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductRef(pub String);

impl fmt::Display for ProductRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProductRef {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Provider view of a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub paid: bool,
}

/// Provider view of a purchasable product. The amount is `i64` because the
/// provider metadata is untrusted; validation happens at reconcile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductInfo {
    pub credit_amount: i64,
}

/// Idempotency ledger row: one per payment session ever applied.
///
/// Recorded before the account is credited; `credited` flips once the
/// balance mutation lands. A session present in the ledger is never
/// credited a second time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationEntry {
    pub session: SessionRef,
    pub user: UserId,
    pub amount: Credits,
    pub credited: bool,
    pub recorded_at: DateTime<Utc>,
}

impl ReconciliationEntry {
    pub fn record(session: SessionRef, user: UserId, amount: Credits) -> Self {
        Self {
            session,
            user,
            amount,
            credited: false,
            recorded_at: Utc::now(),
        }
    }
}

/// Outcome of applying a payment confirmation to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The session was applied and the account credited.
    Applied {
        credited: Credits,
        new_balance: Credits,
    },
    /// The session had already been applied; the balance is unchanged.
    AlreadyApplied { balance: Credits },
}

impl Reconciliation {
    pub fn balance(&self) -> Credits {
        match self {
            Self::Applied { new_balance, .. } => *new_balance,
            Self::AlreadyApplied { balance } => *balance,
        }
    }
}

use crate::domain::account::{Credits, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AuthorizationState {
    /// Charge taken, compute outcome not yet known.
    #[default]
    Pending,
    /// Compute succeeded, the charge is final.
    Settled,
    /// Compute failed, the charge was returned.
    Refunded,
}

/// Durable record of an in-flight charge.
///
/// Written before the compute resource is invoked, so a crash between debit
/// and settle/refund leaves a Pending row for the recovery sweep instead of
/// a silently lost charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    pub id: Uuid,
    pub user: UserId,
    pub amount: Credits,
    pub state: AuthorizationState,
    pub opened_at: DateTime<Utc>,
}

impl AuthorizationRecord {
    pub fn open(user: UserId, amount: Credits) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            amount,
            state: AuthorizationState::Pending,
            opened_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == AuthorizationState::Pending
    }
}

use super::account::{Account, Credits, UserId};
use super::authorization::AuthorizationRecord;
use super::payment::{ProductInfo, ProductRef, ReconciliationEntry, SessionRef, SessionStatus};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Durable per-user balance store.
///
/// `debit` and `credit` must be linearizable with respect to concurrent
/// calls on the same user: the implementation performs the whole
/// read-check-write as one critical section, never as two round trips.
/// No invariant is claimed across two different accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Creates the account with a zero balance. Idempotent; existing
    /// balances are left untouched.
    async fn open(&self, user: UserId) -> Result<()>;
    async fn balance(&self, user: UserId) -> Result<Credits>;
    /// Atomic compare-and-subtract. Fails with `InsufficientFunds` without
    /// mutating when the balance does not cover `amount`.
    async fn debit(&self, user: UserId, amount: Credits) -> Result<Credits>;
    /// Atomic add. Fails with `AccountNotFound` for unknown users.
    async fn credit(&self, user: UserId, amount: Credits) -> Result<Credits>;
    async fn all(&self) -> Result<Vec<Account>>;
}

/// Durable log of in-flight charges.
#[async_trait]
pub trait AuthorizationLog: Send + Sync {
    async fn append(&self, auth: AuthorizationRecord) -> Result<()>;
    async fn settle(&self, id: Uuid) -> Result<()>;
    async fn mark_refunded(&self, id: Uuid) -> Result<()>;
    /// Pending authorizations opened before `cutoff`, oldest first.
    async fn stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<AuthorizationRecord>>;
}

/// Record of which payment sessions have already been applied.
#[async_trait]
pub trait ReconciliationLedger: Send + Sync {
    /// Atomic insert-if-absent keyed by session. Returns `false` when the
    /// session was already recorded; the entry is not modified in that case.
    async fn record(&self, entry: ReconciliationEntry) -> Result<bool>;
    async fn mark_credited(&self, session: &SessionRef) -> Result<()>;
    /// Entries recorded but never credited (credit retries exhausted or a
    /// crash in between).
    async fn uncredited(&self) -> Result<Vec<ReconciliationEntry>>;
}

/// Read-only view of the external payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn session(&self, session: &SessionRef) -> Result<SessionStatus>;
    async fn product(&self, product: &ProductRef) -> Result<ProductInfo>;
}

/// The compute resource's fixed 4x transform primitive.
///
/// Input and output are encoded images. Implementations reject oversized
/// input before transforming; callers treat any failure as a compute
/// failure eligible for refund.
#[async_trait]
pub trait BaseTransform: Send + Sync {
    async fn transform(&self, image: &[u8]) -> Result<Vec<u8>>;
}

pub type DynAccountStore = Arc<dyn AccountStore>;
pub type DynAuthorizationLog = Arc<dyn AuthorizationLog>;
pub type DynReconciliationLedger = Arc<dyn ReconciliationLedger>;
pub type DynPaymentProvider = Arc<dyn PaymentProvider>;
pub type DynBaseTransform = Arc<dyn BaseTransform>;

use crate::domain::account::{Account, Credits, UserId};
use crate::domain::authorization::{AuthorizationRecord, AuthorizationState};
use crate::domain::payment::{
    ProductInfo, ProductRef, ReconciliationEntry, SessionRef, SessionStatus,
};
use crate::domain::ports::{
    AccountStore, AuthorizationLog, PaymentProvider, ReconciliationLedger,
};
use crate::error::{Result, UpscaleError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory account store.
///
/// `debit` and `credit` run the whole read-check-write under the map's
/// write lock, which makes them linearizable per user. `Clone` shares the
/// underlying state.
#[derive(Default, Clone)]
pub struct InMemoryAccountStore {
    accounts: Arc<RwLock<HashMap<UserId, Account>>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn open(&self, user: UserId) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        accounts.entry(user).or_insert_with(|| Account::new(user));
        Ok(())
    }

    async fn balance(&self, user: UserId) -> Result<Credits> {
        let accounts = self.accounts.read().await;
        accounts
            .get(&user)
            .map(|a| a.balance)
            .ok_or(UpscaleError::AccountNotFound(user))
    }

    async fn debit(&self, user: UserId, amount: Credits) -> Result<Credits> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&user)
            .ok_or(UpscaleError::AccountNotFound(user))?;
        account.debit(amount)?;
        Ok(account.balance)
    }

    async fn credit(&self, user: UserId, amount: Credits) -> Result<Credits> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&user)
            .ok_or(UpscaleError::AccountNotFound(user))?;
        account.credit(amount);
        Ok(account.balance)
    }

    async fn all(&self) -> Result<Vec<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().cloned().collect())
    }
}

/// In-memory authorization log.
#[derive(Default, Clone)]
pub struct InMemoryAuthorizationLog {
    records: Arc<RwLock<HashMap<Uuid, AuthorizationRecord>>>,
}

impl InMemoryAuthorizationLog {
    pub fn new() -> Self {
        Self::default()
    }

    async fn set_state(&self, id: Uuid, state: AuthorizationState) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or_else(|| {
            UpscaleError::StoreUnavailable(format!("unknown authorization {id}"))
        })?;
        record.state = state;
        Ok(())
    }
}

#[async_trait]
impl AuthorizationLog for InMemoryAuthorizationLog {
    async fn append(&self, auth: AuthorizationRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(auth.id, auth);
        Ok(())
    }

    async fn settle(&self, id: Uuid) -> Result<()> {
        self.set_state(id, AuthorizationState::Settled).await
    }

    async fn mark_refunded(&self, id: Uuid) -> Result<()> {
        self.set_state(id, AuthorizationState::Refunded).await
    }

    async fn stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<AuthorizationRecord>> {
        let records = self.records.read().await;
        let mut stale: Vec<_> = records
            .values()
            .filter(|r| r.is_pending() && r.opened_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|r| r.opened_at);
        Ok(stale)
    }
}

/// In-memory idempotency ledger for payment sessions.
///
/// `record` checks and inserts under the same write lock, so two concurrent
/// reconciliations of one session can never both see it absent.
#[derive(Default, Clone)]
pub struct InMemoryReconciliationLedger {
    entries: Arc<RwLock<HashMap<SessionRef, ReconciliationEntry>>>,
}

impl InMemoryReconciliationLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReconciliationLedger for InMemoryReconciliationLedger {
    async fn record(&self, entry: ReconciliationEntry) -> Result<bool> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&entry.session) {
            return Ok(false);
        }
        entries.insert(entry.session.clone(), entry);
        Ok(true)
    }

    async fn mark_credited(&self, session: &SessionRef) -> Result<()> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(session).ok_or_else(|| {
            UpscaleError::StoreUnavailable(format!("unknown reconciliation {session}"))
        })?;
        entry.credited = true;
        Ok(())
    }

    async fn uncredited(&self) -> Result<Vec<ReconciliationEntry>> {
        let entries = self.entries.read().await;
        let mut pending: Vec<_> = entries
            .values()
            .filter(|e| !e.credited)
            .cloned()
            .collect();
        pending.sort_by_key(|e| e.recorded_at);
        Ok(pending)
    }
}

/// Payment provider backed by pre-registered sessions and products.
///
/// Used by the replay CLI (rows carry the provider state) and by tests.
#[derive(Default, Clone)]
pub struct InMemoryPaymentProvider {
    sessions: Arc<RwLock<HashMap<SessionRef, SessionStatus>>>,
    products: Arc<RwLock<HashMap<ProductRef, ProductInfo>>>,
}

impl InMemoryPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_session(&self, session: SessionRef, paid: bool) {
        self.sessions.write().await.insert(session, SessionStatus { paid });
    }

    pub async fn put_product(&self, product: ProductRef, credit_amount: i64) {
        self.products
            .write()
            .await
            .insert(product, ProductInfo { credit_amount });
    }
}

#[async_trait]
impl PaymentProvider for InMemoryPaymentProvider {
    async fn session(&self, session: &SessionRef) -> Result<SessionStatus> {
        let sessions = self.sessions.read().await;
        sessions.get(session).copied().ok_or_else(|| {
            UpscaleError::ProviderUnavailable(format!("unknown session {session}"))
        })
    }

    async fn product(&self, product: &ProductRef) -> Result<ProductInfo> {
        let products = self.products.read().await;
        products.get(product).copied().ok_or_else(|| {
            UpscaleError::ProviderUnavailable(format!("unknown product {product}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let store = InMemoryAccountStore::new();
        store.open(UserId(1)).await.unwrap();
        store.credit(UserId(1), Credits::new(5)).await.unwrap();

        // Re-opening must not reset the balance.
        store.open(UserId(1)).await.unwrap();
        assert_eq!(store.balance(UserId(1)).await.unwrap(), Credits::new(5));
    }

    #[tokio::test]
    async fn test_debit_unknown_account() {
        let store = InMemoryAccountStore::new();
        let result = store.debit(UserId(9), Credits::new(1)).await;
        assert!(matches!(result, Err(UpscaleError::AccountNotFound(UserId(9)))));
    }

    #[tokio::test]
    async fn test_debit_and_credit_roundtrip() {
        let store = InMemoryAccountStore::new();
        store.open(UserId(1)).await.unwrap();
        store.credit(UserId(1), Credits::new(10)).await.unwrap();

        let after_debit = store.debit(UserId(1), Credits::new(4)).await.unwrap();
        assert_eq!(after_debit, Credits::new(6));

        let result = store.debit(UserId(1), Credits::new(7)).await;
        assert!(matches!(result, Err(UpscaleError::InsufficientFunds { .. })));
        assert_eq!(store.balance(UserId(1)).await.unwrap(), Credits::new(6));
    }

    #[tokio::test]
    async fn test_ledger_records_once() {
        let ledger = InMemoryReconciliationLedger::new();
        let entry =
            ReconciliationEntry::record(SessionRef::from("cs_1"), UserId(1), Credits::new(50));

        assert!(ledger.record(entry.clone()).await.unwrap());
        assert!(!ledger.record(entry).await.unwrap());
    }

    #[tokio::test]
    async fn test_ledger_tracks_uncredited() {
        let ledger = InMemoryReconciliationLedger::new();
        let entry =
            ReconciliationEntry::record(SessionRef::from("cs_1"), UserId(1), Credits::new(50));
        ledger.record(entry).await.unwrap();

        assert_eq!(ledger.uncredited().await.unwrap().len(), 1);
        ledger.mark_credited(&SessionRef::from("cs_1")).await.unwrap();
        assert!(ledger.uncredited().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_authorization_log_stale_filter() {
        let log = InMemoryAuthorizationLog::new();
        let auth = AuthorizationRecord::open(UserId(1), Credits::new(2));
        let id = auth.id;
        log.append(auth).await.unwrap();

        // Everything is stale against a future cutoff, nothing against a past one.
        let future = Utc::now() + chrono::Duration::hours(1);
        let past = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(log.stale_pending(future).await.unwrap().len(), 1);
        assert!(log.stale_pending(past).await.unwrap().is_empty());

        log.settle(id).await.unwrap();
        assert!(log.stale_pending(future).await.unwrap().is_empty());
    }
}

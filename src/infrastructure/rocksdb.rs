use crate::domain::account::{Account, Credits, UserId};
use crate::domain::authorization::{AuthorizationRecord, AuthorizationState};
use crate::domain::payment::{ReconciliationEntry, SessionRef};
use crate::domain::ports::{AccountStore, AuthorizationLog, ReconciliationLedger};
use crate::error::{Result, UpscaleError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family for account balances.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for authorization records.
pub const CF_AUTHORIZATIONS: &str = "authorizations";
/// Column Family for the payment idempotency ledger.
pub const CF_RECONCILIATIONS: &str = "reconciliations";

fn store_err(e: impl Display) -> UpscaleError {
    UpscaleError::StoreUnavailable(e.to_string())
}

/// A persistent store implementation using RocksDB.
///
/// Implements all three persistence ports over separate Column Families.
/// Read-modify-write operations (debit, credit, state transitions, ledger
/// record) are serialized through an internal write mutex, which is what
/// makes them single-row atomic; plain reads go straight to the DB.
///
/// `Clone` shares the underlying `Arc<DB>` and the write mutex.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_guard: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_AUTHORIZATIONS, Options::default()),
            ColumnFamilyDescriptor::new(CF_RECONCILIATIONS, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs).map_err(store_err)?;

        Ok(Self {
            db: Arc::new(db),
            write_guard: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| store_err(format!("column family {name} not found")))
    }

    fn get_account(&self, user: UserId) -> Result<Option<Account>> {
        let cf = self.cf(CF_ACCOUNTS)?;
        let bytes = self
            .db
            .get_cf(cf, user.0.to_be_bytes())
            .map_err(store_err)?;
        bytes
            .map(|b| serde_json::from_slice(&b).map_err(store_err))
            .transpose()
    }

    fn put_account(&self, account: &Account) -> Result<()> {
        let cf = self.cf(CF_ACCOUNTS)?;
        let value = serde_json::to_vec(account).map_err(store_err)?;
        self.db
            .put_cf(cf, account.user.0.to_be_bytes(), value)
            .map_err(store_err)
    }

    fn get_authorization(&self, id: Uuid) -> Result<Option<AuthorizationRecord>> {
        let cf = self.cf(CF_AUTHORIZATIONS)?;
        let bytes = self.db.get_cf(cf, id.as_bytes()).map_err(store_err)?;
        bytes
            .map(|b| serde_json::from_slice(&b).map_err(store_err))
            .transpose()
    }

    fn put_authorization(&self, auth: &AuthorizationRecord) -> Result<()> {
        let cf = self.cf(CF_AUTHORIZATIONS)?;
        let value = serde_json::to_vec(auth).map_err(store_err)?;
        self.db
            .put_cf(cf, auth.id.as_bytes(), value)
            .map_err(store_err)
    }

    fn set_authorization_state(&self, id: Uuid, state: AuthorizationState) -> Result<()> {
        let mut auth = self
            .get_authorization(id)?
            .ok_or_else(|| store_err(format!("unknown authorization {id}")))?;
        auth.state = state;
        self.put_authorization(&auth)
    }

    fn get_entry(&self, session: &SessionRef) -> Result<Option<ReconciliationEntry>> {
        let cf = self.cf(CF_RECONCILIATIONS)?;
        let bytes = self
            .db
            .get_cf(cf, session.0.as_bytes())
            .map_err(store_err)?;
        bytes
            .map(|b| serde_json::from_slice(&b).map_err(store_err))
            .transpose()
    }

    fn put_entry(&self, entry: &ReconciliationEntry) -> Result<()> {
        let cf = self.cf(CF_RECONCILIATIONS)?;
        let value = serde_json::to_vec(entry).map_err(store_err)?;
        self.db
            .put_cf(cf, entry.session.0.as_bytes(), value)
            .map_err(store_err)
    }
}

#[async_trait]
impl AccountStore for RocksDbStore {
    async fn open(&self, user: UserId) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        if self.get_account(user)?.is_none() {
            self.put_account(&Account::new(user))?;
        }
        Ok(())
    }

    async fn balance(&self, user: UserId) -> Result<Credits> {
        self.get_account(user)?
            .map(|a| a.balance)
            .ok_or(UpscaleError::AccountNotFound(user))
    }

    async fn debit(&self, user: UserId, amount: Credits) -> Result<Credits> {
        let _guard = self.write_guard.lock().await;
        let mut account = self
            .get_account(user)?
            .ok_or(UpscaleError::AccountNotFound(user))?;
        account.debit(amount)?;
        self.put_account(&account)?;
        Ok(account.balance)
    }

    async fn credit(&self, user: UserId, amount: Credits) -> Result<Credits> {
        let _guard = self.write_guard.lock().await;
        let mut account = self
            .get_account(user)?
            .ok_or(UpscaleError::AccountNotFound(user))?;
        account.credit(amount);
        self.put_account(&account)?;
        Ok(account.balance)
    }

    async fn all(&self) -> Result<Vec<Account>> {
        let cf = self.cf(CF_ACCOUNTS)?;
        let mut accounts = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item.map_err(store_err)?;
            accounts.push(serde_json::from_slice(&value).map_err(store_err)?);
        }
        Ok(accounts)
    }
}

#[async_trait]
impl AuthorizationLog for RocksDbStore {
    async fn append(&self, auth: AuthorizationRecord) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        self.put_authorization(&auth)
    }

    async fn settle(&self, id: Uuid) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        self.set_authorization_state(id, AuthorizationState::Settled)
    }

    async fn mark_refunded(&self, id: Uuid) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        self.set_authorization_state(id, AuthorizationState::Refunded)
    }

    async fn stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<AuthorizationRecord>> {
        let cf = self.cf(CF_AUTHORIZATIONS)?;
        let mut stale = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item.map_err(store_err)?;
            let auth: AuthorizationRecord = serde_json::from_slice(&value).map_err(store_err)?;
            if auth.is_pending() && auth.opened_at < cutoff {
                stale.push(auth);
            }
        }
        stale.sort_by_key(|a| a.opened_at);
        Ok(stale)
    }
}

#[async_trait]
impl ReconciliationLedger for RocksDbStore {
    async fn record(&self, entry: ReconciliationEntry) -> Result<bool> {
        let _guard = self.write_guard.lock().await;
        if self.get_entry(&entry.session)?.is_some() {
            return Ok(false);
        }
        self.put_entry(&entry)?;
        Ok(true)
    }

    async fn mark_credited(&self, session: &SessionRef) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        let mut entry = self
            .get_entry(session)?
            .ok_or_else(|| store_err(format!("unknown reconciliation {session}")))?;
        entry.credited = true;
        self.put_entry(&entry)
    }

    async fn uncredited(&self) -> Result<Vec<ReconciliationEntry>> {
        let cf = self.cf(CF_RECONCILIATIONS)?;
        let mut pending = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item.map_err(store_err)?;
            let entry: ReconciliationEntry = serde_json::from_slice(&value).map_err(store_err)?;
            if !entry.credited {
                pending.push(entry);
            }
        }
        pending.sort_by_key(|e| e.recorded_at);
        Ok(pending)
    }
}

use super::retry::credit_with_retry;
use crate::domain::ports::{DynAccountStore, DynAuthorizationLog, DynReconciliationLedger};
use crate::error::Result;
use chrono::Utc;
use tracing::warn;

/// What a sweep pass repaired.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Stale pending charges refunded.
    pub authorizations_refunded: usize,
    /// Recorded-but-uncredited payment sessions finished.
    pub reconciliations_credited: usize,
}

/// Out-of-band repair job for charges and credits a crash or store outage
/// left half-finished. Runs outside the real-time request path.
pub struct RecoverySweep {
    accounts: DynAccountStore,
    authorizations: DynAuthorizationLog,
    ledger: DynReconciliationLedger,
}

impl RecoverySweep {
    pub fn new(
        accounts: DynAccountStore,
        authorizations: DynAuthorizationLog,
        ledger: DynReconciliationLedger,
    ) -> Self {
        Self {
            accounts,
            authorizations,
            ledger,
        }
    }

    /// Refunds every authorization still Pending after `max_age`: the
    /// process died between debit and settle/refund, so the user paid for
    /// work that never concluded.
    pub async fn refund_stale_authorizations(&self, max_age: chrono::Duration) -> Result<usize> {
        let cutoff = Utc::now() - max_age;
        let mut refunded = 0;
        for auth in self.authorizations.stale_pending(cutoff).await? {
            let balance =
                credit_with_retry(self.accounts.as_ref(), auth.user, auth.amount).await?;
            self.authorizations.mark_refunded(auth.id).await?;
            warn!(
                user = %auth.user,
                amount = %auth.amount,
                id = %auth.id,
                %balance,
                "refunded stale authorization"
            );
            refunded += 1;
        }
        Ok(refunded)
    }

    /// Finishes reconciliations whose idempotency entry was recorded but
    /// whose credit never landed.
    pub async fn credit_unfinished_reconciliations(&self) -> Result<usize> {
        let mut credited = 0;
        for entry in self.ledger.uncredited().await? {
            let balance =
                credit_with_retry(self.accounts.as_ref(), entry.user, entry.amount).await?;
            self.ledger.mark_credited(&entry.session).await?;
            warn!(
                user = %entry.user,
                session = %entry.session,
                amount = %entry.amount,
                %balance,
                "completed unfinished reconciliation credit"
            );
            credited += 1;
        }
        Ok(credited)
    }

    pub async fn run(&self, max_age: chrono::Duration) -> Result<SweepReport> {
        Ok(SweepReport {
            authorizations_refunded: self.refund_stale_authorizations(max_age).await?,
            reconciliations_credited: self.credit_unfinished_reconciliations().await?,
        })
    }
}

use super::retry::credit_with_retry;
use crate::domain::account::{Credits, UserId};
use crate::domain::payment::{ProductRef, Reconciliation, ReconciliationEntry, SessionRef};
use crate::domain::ports::{DynAccountStore, DynPaymentProvider, DynReconciliationLedger};
use crate::error::{Result, UpscaleError};
use tracing::{debug, info};

/// Applies an external payment confirmation to the account ledger at most
/// once per session.
///
/// The idempotency entry is recorded before the balance is credited;
/// crediting first would leave a window in which a replayed confirmation
/// could be applied twice.
pub struct PaymentReconciler {
    accounts: DynAccountStore,
    ledger: DynReconciliationLedger,
    provider: DynPaymentProvider,
}

impl PaymentReconciler {
    pub fn new(
        accounts: DynAccountStore,
        ledger: DynReconciliationLedger,
        provider: DynPaymentProvider,
    ) -> Self {
        Self {
            accounts,
            ledger,
            provider,
        }
    }

    pub async fn reconcile(
        &self,
        session: SessionRef,
        product: ProductRef,
        user: UserId,
    ) -> Result<Reconciliation> {
        let status = self.provider.session(&session).await?;
        if !status.paid {
            return Err(UpscaleError::PaymentNotCompleted(session));
        }

        let info = self.provider.product(&product).await?;
        if info.credit_amount <= 0 {
            return Err(UpscaleError::InvalidProductConfiguration(format!(
                "product {product} resolves to credit amount {}",
                info.credit_amount
            )));
        }
        let amount = Credits::new(info.credit_amount as u64);

        // Unknown users fail here, before the ledger learns the session.
        let balance = self.accounts.balance(user).await?;

        let entry = ReconciliationEntry::record(session.clone(), user, amount);
        if !self.ledger.record(entry).await? {
            debug!(%user, %session, "session already reconciled");
            return Ok(Reconciliation::AlreadyApplied { balance });
        }

        let new_balance = credit_with_retry(self.accounts.as_ref(), user, amount).await?;
        self.ledger.mark_credited(&session).await?;

        info!(%user, %session, %amount, %new_balance, "payment reconciled");
        Ok(Reconciliation::Applied {
            credited: amount,
            new_balance,
        })
    }
}

use super::retry::credit_with_retry;
use crate::domain::account::{Credits, UserId};
use crate::domain::authorization::AuthorizationRecord;
use crate::domain::ports::{DynAccountStore, DynAuthorizationLog};
use crate::domain::pricing::PricingPolicy;
use crate::domain::request::{UpscaleReceipt, UpscaleRequest};
use crate::error::{Result, UpscaleError};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Orchestrates one paid upscale operation: price it, debit the account,
/// run the compute, and settle or refund the charge.
///
/// The debit happens before the compute invocation, so expensive compute is
/// never spent on a request that cannot pay for it; the price of that order
/// is the explicit refund path on compute failure. No store lock is held
/// while the compute runs.
pub struct UpscaleCoordinator {
    accounts: DynAccountStore,
    authorizations: DynAuthorizationLog,
    policy: PricingPolicy,
    compute_timeout: Option<Duration>,
}

impl UpscaleCoordinator {
    pub fn new(
        accounts: DynAccountStore,
        authorizations: DynAuthorizationLog,
        policy: PricingPolicy,
    ) -> Self {
        Self {
            accounts,
            authorizations,
            policy,
            compute_timeout: None,
        }
    }

    /// Bounds the compute invocation; elapse is treated exactly like a
    /// compute failure, refund included.
    pub fn with_compute_timeout(self, timeout: Duration) -> Self {
        Self {
            compute_timeout: Some(timeout),
            ..self
        }
    }

    /// Executes a priced operation for `user`.
    ///
    /// `compute` is the compute-resource seam; in production it wraps the
    /// tier composer over the model client. On success the debit is final
    /// and the receipt carries the balance the debit observed. On any
    /// compute failure the charge is returned before the error surfaces.
    pub async fn execute<F, Fut>(
        &self,
        user: UserId,
        request: UpscaleRequest,
        compute: F,
    ) -> Result<UpscaleReceipt>
    where
        F: FnOnce(UpscaleRequest) -> Fut,
        Fut: Future<Output = Result<Vec<u8>>> + Send,
    {
        let cost = self.policy.price(request.tier, request.enhance);

        // Admission control: reject before any work happens.
        let remaining = self.accounts.debit(user, cost).await?;

        // Durable in-flight record, written before compute so a crash from
        // here on leaves a Pending row for the recovery sweep.
        let auth = AuthorizationRecord::open(user, cost);
        let auth_id = auth.id;
        if let Err(e) = self.authorizations.append(auth).await {
            self.refund(user, cost, None).await?;
            return Err(e);
        }

        debug!(%user, %cost, tier = request.tier.factor(), "charge authorized");

        let outcome = match self.compute_timeout {
            Some(limit) => match tokio::time::timeout(limit, compute(request)).await {
                Ok(result) => result,
                Err(_) => Err(UpscaleError::ComputeFailed("compute timed out".into())),
            },
            None => compute(request).await,
        };

        match outcome {
            Ok(artifact) => {
                // If the settle write fails the record stays Pending and the
                // sweep refunds it; the caller sees the store error and can
                // retry the whole operation.
                self.authorizations.settle(auth_id).await?;
                debug!(%user, %cost, "charge settled");
                Ok(UpscaleReceipt {
                    artifact,
                    amount_charged: cost,
                    remaining_balance: remaining,
                })
            }
            Err(cause) => {
                warn!(%user, %cost, %cause, "compute failed, refunding");
                self.refund(user, cost, Some(auth_id)).await?;
                Err(match cause {
                    e @ UpscaleError::ComputeFailed(_) => e,
                    other => UpscaleError::ComputeFailed(other.to_string()),
                })
            }
        }
    }

    /// Returns a charge exactly once, retrying transient store failures.
    /// If retries exhaust, the authorization stays Pending for the sweep
    /// and the store error surfaces instead of a silent loss.
    async fn refund(&self, user: UserId, cost: Credits, auth_id: Option<Uuid>) -> Result<()> {
        credit_with_retry(self.accounts.as_ref(), user, cost).await?;
        if let Some(id) = auth_id {
            self.authorizations.mark_refunded(id).await?;
        }
        Ok(())
    }
}

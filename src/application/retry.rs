use crate::domain::account::{Credits, UserId};
use crate::domain::ports::AccountStore;
use crate::error::{Result, UpscaleError};
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

const ATTEMPTS: u32 = 5;
const BASE_DELAY: Duration = Duration::from_millis(50);

/// Credits `amount` to `user`, retrying transient store failures with
/// exponential backoff.
///
/// Used on the refund and reconciliation-credit paths, where dropping the
/// mutation is a financial defect; a failed debit attempt is merely a missed
/// request and is never retried.
pub(crate) async fn credit_with_retry(
    store: &dyn AccountStore,
    user: UserId,
    amount: Credits,
) -> Result<Credits> {
    let mut delay = BASE_DELAY;
    for attempt in 1..=ATTEMPTS {
        match store.credit(user, amount).await {
            Ok(balance) => return Ok(balance),
            Err(UpscaleError::StoreUnavailable(reason)) if attempt < ATTEMPTS => {
                warn!(%user, %amount, attempt, %reason, "credit failed, retrying");
                sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
    unreachable!("loop returns on the final attempt")
}

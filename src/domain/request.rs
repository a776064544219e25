use crate::domain::account::Credits;
use crate::domain::pricing::Tier;
use serde::{Deserialize, Serialize};

/// One priced upscale operation as submitted by an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpscaleRequest {
    pub tier: Tier,
    /// Optional smoothing post-filter; affects price and final pixels only.
    pub enhance: bool,
}

/// Result of a settled upscale operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpscaleReceipt {
    /// Encoded output image.
    pub artifact: Vec<u8>,
    pub amount_charged: Credits,
    /// Balance as observed by the debit, before any later concurrent
    /// operations moved it.
    pub remaining_balance: Credits,
}

use crate::domain::account::Credits;
use crate::error::{Result, UpscaleError};
use serde::{Deserialize, Serialize};

/// Requested output magnification. Closed set: adding a tier means adding a
/// variant and a row to the composition plan, not new control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    X2,
    X4,
    X8,
}

impl Tier {
    /// Parses an untrusted magnification factor.
    pub fn from_factor(factor: u8) -> Result<Self> {
        match factor {
            2 => Ok(Self::X2),
            4 => Ok(Self::X4),
            8 => Ok(Self::X8),
            other => Err(UpscaleError::InvalidTier(other)),
        }
    }

    pub fn factor(&self) -> u8 {
        match self {
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
        }
    }
}

/// Cost table for priced operations.
///
/// Kept as data so pricing can change without touching the coordinator.
/// Tier 8 runs the base transform twice, so its price must stay above
/// tier 4, which must stay above tier 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingPolicy {
    pub tier_x2: Credits,
    pub tier_x4: Credits,
    pub tier_x8: Credits,
    pub enhancement: Credits,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tier_x2: Credits::new(1),
            tier_x4: Credits::new(2),
            tier_x8: Credits::new(3),
            enhancement: Credits::new(5),
        }
    }
}

impl PricingPolicy {
    /// Pure lookup: base cost for the tier plus the optional enhancement
    /// add-on.
    pub fn price(&self, tier: Tier, enhance: bool) -> Credits {
        let base = match tier {
            Tier::X2 => self.tier_x2,
            Tier::X4 => self.tier_x4,
            Tier::X8 => self.tier_x8,
        };
        if enhance { base + self.enhancement } else { base }
    }
}

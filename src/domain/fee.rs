use super::account::AccountId;
use crate::error::{BillingError, Result};
use serde::{Deserialize, Serialize};

/// 100% expressed in basis points.
pub const MAX_RATE_BPS: u16 = 10_000;

/// 1%, the rate a fresh deployment starts with.
pub const DEFAULT_RATE_BPS: u16 = 100;

/// The two legs a gross amount is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeSplit {
    /// Delivered to the payee.
    pub net: u64,
    /// Delivered to the fee owner.
    pub fee: u64,
}

impl FeeSplit {
    pub fn gross(&self) -> u64 {
        self.net + self.fee
    }
}

/// Current fee rate and the single account allowed to change it.
///
/// The owner is also the recipient of every fee leg. Deserialization goes
/// through [`FeePolicy::new`], so a stored rate above 10000 is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredPolicy")]
pub struct FeePolicy {
    rate_bps: u16,
    owner: AccountId,
}

#[derive(Deserialize)]
struct StoredPolicy {
    rate_bps: u16,
    owner: AccountId,
}

impl TryFrom<StoredPolicy> for FeePolicy {
    type Error = BillingError;

    fn try_from(stored: StoredPolicy) -> Result<Self> {
        FeePolicy::new(stored.owner, stored.rate_bps)
    }
}

impl FeePolicy {
    pub fn new(owner: AccountId, rate_bps: u16) -> Result<Self> {
        if rate_bps > MAX_RATE_BPS {
            return Err(BillingError::InvalidRate(rate_bps.into()));
        }
        Ok(Self { rate_bps, owner })
    }

    pub fn with_default_rate(owner: AccountId) -> Self {
        Self {
            rate_bps: DEFAULT_RATE_BPS,
            owner,
        }
    }

    pub fn rate_bps(&self) -> u16 {
        self.rate_bps
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    /// Changes the rate. Only the owner may do this, and only within `[0, 10000]`.
    pub fn update_fee(&mut self, caller: &AccountId, new_rate_bps: u64) -> Result<()> {
        if *caller != self.owner {
            return Err(BillingError::Unauthorized(caller.clone()));
        }
        if new_rate_bps > u64::from(MAX_RATE_BPS) {
            return Err(BillingError::InvalidRate(new_rate_bps));
        }
        self.rate_bps = new_rate_bps as u16;
        Ok(())
    }

    /// `floor(amount * rate_bps / 10000)`. Never rounds up.
    pub fn compute_fee(&self, amount: u64) -> u64 {
        let fee = u128::from(amount) * u128::from(self.rate_bps) / u128::from(MAX_RATE_BPS);
        // rate_bps <= 10000 keeps the quotient within amount
        fee as u64
    }

    pub fn split(&self, amount: u64) -> FeeSplit {
        let fee = self.compute_fee(amount);
        FeeSplit {
            net: amount - fee,
            fee,
        }
    }
}

//! Engine configuration.
//!
//! Values come from environment variables with sensible defaults; the CLI
//! overrides them with its flags.

use crate::domain::account::AccountId;
use crate::domain::fee::{DEFAULT_RATE_BPS, FeePolicy};
use crate::error::{BillingError, Result};
use std::env;

pub const ENV_FEE_OWNER: &str = "FLUXPAY_FEE_OWNER";
pub const ENV_FEE_BPS: &str = "FLUXPAY_FEE_BPS";
pub const ENV_START_TICK: &str = "FLUXPAY_START_TICK";

const DEFAULT_FEE_OWNER: &str = "deployer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Account that may change the fee rate and receives every fee leg.
    pub fee_owner: AccountId,
    /// Rate used when no persisted policy exists.
    pub fee_rate_bps: u16,
    /// Tick the logical clock starts at.
    pub start_tick: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fee_owner: AccountId::from(DEFAULT_FEE_OWNER),
            fee_rate_bps: DEFAULT_RATE_BPS,
            start_tick: 0,
        }
    }
}

impl EngineConfig {
    /// Reads the environment, falling back to defaults for unset or unparsable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fee_owner: env::var(ENV_FEE_OWNER)
                .map(AccountId::from)
                .unwrap_or(defaults.fee_owner),
            fee_rate_bps: env::var(ENV_FEE_BPS)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.fee_rate_bps),
            start_tick: env::var(ENV_START_TICK)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.start_tick),
        }
    }

    /// Applies explicit overrides on top of the current values.
    pub fn with_overrides(
        mut self,
        fee_owner: Option<String>,
        fee_rate_bps: Option<u16>,
        start_tick: Option<u64>,
    ) -> Self {
        if let Some(owner) = fee_owner {
            self.fee_owner = AccountId::from(owner);
        }
        if let Some(rate) = fee_rate_bps {
            self.fee_rate_bps = rate;
        }
        if let Some(tick) = start_tick {
            self.start_tick = tick;
        }
        self
    }

    /// The policy a fresh deployment starts with.
    pub fn fee_policy(&self) -> Result<FeePolicy> {
        if self.fee_owner.is_empty() {
            return Err(BillingError::MalformedCommand(
                "fee owner must not be empty".to_string(),
            ));
        }
        FeePolicy::new(self.fee_owner.clone(), self.fee_rate_bps)
    }
}

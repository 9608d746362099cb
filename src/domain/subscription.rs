use super::account::AccountId;
use crate::error::{BillingError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type SubscriptionId = u64;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    /// Terminal. Nothing moves a subscription out of this state.
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recurring payment from `payer` to `payee`.
///
/// `last_paid_at` is the due-date cursor: the next cycle is due once the clock
/// reaches `last_paid_at + frequency`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub payer: AccountId,
    pub payee: AccountId,
    /// Gross amount charged per cycle.
    pub amount: u64,
    /// Ticks between payments.
    pub frequency: u64,
    pub last_paid_at: u64,
    pub status: SubscriptionStatus,
    pub created_at: u64,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        payer: AccountId,
        payee: AccountId,
        amount: u64,
        frequency: u64,
        now: u64,
    ) -> Result<Self> {
        if amount == 0 {
            return Err(BillingError::InvalidAmount);
        }
        if frequency == 0 {
            return Err(BillingError::InvalidFrequency);
        }
        Ok(Self {
            id,
            payer,
            payee,
            amount,
            frequency,
            last_paid_at: now,
            status: SubscriptionStatus::Active,
            created_at: now,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    pub fn due_at(&self) -> u64 {
        self.last_paid_at.saturating_add(self.frequency)
    }

    pub fn is_due(&self, now: u64) -> bool {
        self.is_active() && now >= self.due_at()
    }

    /// Checks that a cycle may be charged at `now`.
    pub fn ensure_chargeable(&self, now: u64) -> Result<()> {
        if !self.is_active() {
            return Err(BillingError::SubscriptionCancelled(self.id));
        }
        let due_at = self.due_at();
        if now < due_at {
            return Err(BillingError::NotYetDue {
                id: self.id,
                due_at,
                now,
            });
        }
        Ok(())
    }

    /// Moves the cursor to `now`, not to `due_at`: missed cycles are never batched.
    pub fn record_payment(&mut self, now: u64) -> Result<()> {
        self.ensure_chargeable(now)?;
        self.last_paid_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, caller: &AccountId) -> Result<()> {
        if *caller != self.payer {
            return Err(BillingError::Unauthorized(caller.clone()));
        }
        if !self.is_active() {
            return Err(BillingError::AlreadyCancelled(self.id));
        }
        self.status = SubscriptionStatus::Cancelled;
        Ok(())
    }
}

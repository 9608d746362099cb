use super::account::AccountId;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type PaymentId = u64;

/// One-off payments settle synchronously, so they are born in their terminal state.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Completed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable record of a settled one-off payment.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Payment {
    pub id: PaymentId,
    pub payer: AccountId,
    pub payee: AccountId,
    /// Gross amount requested by the payer.
    pub amount: u64,
    /// Portion of `amount` delivered to the fee owner.
    pub fee: u64,
    pub status: PaymentStatus,
    /// Tick at which the payment settled.
    pub created_at: u64,
}

impl Payment {
    pub fn net(&self) -> u64 {
        self.amount - self.fee
    }
}

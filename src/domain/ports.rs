use super::account::AccountId;
use super::fee::FeePolicy;
use super::payment::{Payment, PaymentId};
use super::subscription::{Subscription, SubscriptionId};
use crate::error::{Result, TransferError};
use async_trait::async_trait;
use tracing::warn;

/// Append-only registry of one-off payments.
///
/// Ids are allocated from a counter that only moves on a successful `insert`.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// The id the next inserted payment must carry.
    async fn next_id(&self) -> Result<PaymentId>;
    async fn insert(&self, payment: Payment) -> Result<()>;
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>>;
    async fn get_all(&self) -> Result<Vec<Payment>>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn next_id(&self) -> Result<SubscriptionId>;
    /// Stores a new subscription and advances the id counter.
    async fn insert(&self, subscription: Subscription) -> Result<()>;
    /// Overwrites an existing subscription. The counter does not move.
    async fn update(&self, subscription: Subscription) -> Result<()>;
    async fn get(&self, id: SubscriptionId) -> Result<Option<Subscription>>;
    async fn get_all(&self) -> Result<Vec<Subscription>>;
}

#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn load(&self) -> Result<Option<FeePolicy>>;
    async fn save(&self, policy: &FeePolicy) -> Result<()>;
}

/// A single movement of value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: u64,
}

/// The host ledger that actually moves value.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> std::result::Result<(), TransferError>;

    /// Settles `legs` as one unit.
    ///
    /// The default runs the legs in order and stops at the first failure, so a
    /// failing later leg leaves the earlier ones applied. Ledgers with a native
    /// multi-move primitive should override this.
    async fn transfer_all(&self, legs: &[Transfer]) -> std::result::Result<(), TransferError> {
        for (index, leg) in legs.iter().enumerate() {
            if let Err(e) = self.transfer(&leg.from, &leg.to, leg.amount).await {
                if index > 0 {
                    warn!(
                        completed = index,
                        total = legs.len(),
                        error = %e,
                        "partial settlement: earlier legs were not rolled back"
                    );
                }
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Source of the logical time used for subscription due-dates.
pub trait Clock: Send + Sync {
    fn current_tick(&self) -> u64;
}

pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type SubscriptionStoreBox = Box<dyn SubscriptionStore>;
pub type PolicyStoreBox = Box<dyn PolicyStore>;
pub type LedgerRef = std::sync::Arc<dyn Ledger>;
pub type ClockRef = std::sync::Arc<dyn Clock>;

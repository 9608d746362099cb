use crate::domain::account::AccountId;
use crate::domain::fee::{FeePolicy, FeeSplit};
use crate::domain::payment::{Payment, PaymentId, PaymentStatus};
use crate::domain::ports::{
    ClockRef, LedgerRef, PaymentStoreBox, PolicyStoreBox, SubscriptionStoreBox, Transfer,
};
use crate::domain::subscription::{Subscription, SubscriptionId};
use crate::error::{BillingError, RecordKind, Result};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Storage backends the engine owns.
pub struct Stores {
    pub payments: PaymentStoreBox,
    pub subscriptions: SubscriptionStoreBox,
    pub policy: PolicyStoreBox,
}

/// Orchestrates one-off payments and subscriptions.
///
/// Every mutating operation holds the policy lock from validation to the
/// final registry write, so operations are applied one at a time and each is
/// all-or-nothing: either both transfer legs settle and the registry is
/// updated, or nothing changes.
pub struct BillingEngine {
    policy: Mutex<FeePolicy>,
    stores: Stores,
    ledger: LedgerRef,
    clock: ClockRef,
}

impl BillingEngine {
    /// Creates an engine, preferring a persisted fee policy over `default_policy`.
    ///
    /// # Arguments
    ///
    /// * `stores` - Registries and policy persistence.
    /// * `ledger` - The ledger that moves value.
    /// * `clock` - Source of the current tick.
    /// * `default_policy` - Used (and persisted) when no policy is stored yet.
    pub async fn open(
        stores: Stores,
        ledger: LedgerRef,
        clock: ClockRef,
        default_policy: FeePolicy,
    ) -> Result<Self> {
        let policy = match stores.policy.load().await? {
            Some(policy) => {
                debug!(
                    owner = %policy.owner(),
                    rate_bps = policy.rate_bps(),
                    "loaded persisted fee policy"
                );
                policy
            }
            None => {
                stores.policy.save(&default_policy).await?;
                default_policy
            }
        };

        Ok(Self {
            policy: Mutex::new(policy),
            stores,
            ledger,
            clock,
        })
    }

    /// Moves `amount` from `payer`, split between `payee` and the fee owner.
    ///
    /// Zero-value legs are skipped; they move nothing and cannot fail. Returns
    /// the settled legs so a failed registry write can reverse them.
    async fn settle(
        &self,
        policy: &FeePolicy,
        payer: &AccountId,
        payee: &AccountId,
        amount: u64,
    ) -> Result<(FeeSplit, Vec<Transfer>)> {
        let split = policy.split(amount);
        let legs: Vec<Transfer> = [(payee, split.net), (policy.owner(), split.fee)]
            .into_iter()
            .filter(|(_, value)| *value > 0)
            .map(|(to, value)| Transfer {
                from: payer.clone(),
                to: to.clone(),
                amount: value,
            })
            .collect();

        self.ledger.transfer_all(&legs).await?;
        Ok((split, legs))
    }

    /// Undoes settled `legs` after the registry write that should have
    /// followed them failed with `cause`, then hands `cause` back.
    ///
    /// If the reversal itself fails the ledger and registry disagree; that is
    /// logged at `error!` with the legs that stayed applied.
    async fn unwind(&self, legs: &[Transfer], cause: BillingError) -> BillingError {
        let reversed: Vec<Transfer> = legs
            .iter()
            .rev()
            .map(|leg| Transfer {
                from: leg.to.clone(),
                to: leg.from.clone(),
                amount: leg.amount,
            })
            .collect();

        match self.ledger.transfer_all(&reversed).await {
            Ok(()) => warn!(
                legs = legs.len(),
                error = %cause,
                "registry write failed after settlement, transfers reversed"
            ),
            Err(e) => error!(
                ?legs,
                error = %cause,
                reversal_error = %e,
                "registry write failed after settlement and the transfers could not be reversed; ledger and registry diverge"
            ),
        }
        cause
    }

    /// Pays `amount` from `caller` to `payee`, minus the current fee.
    pub async fn process_payment(
        &self,
        caller: &AccountId,
        payee: &AccountId,
        amount: u64,
    ) -> Result<PaymentId> {
        if amount == 0 {
            return Err(BillingError::InvalidAmount);
        }

        let policy = self.policy.lock().await;
        // The lock keeps this id free until the insert below.
        let id = self.stores.payments.next_id().await?;
        let now = self.clock.current_tick();

        let (split, legs) = self
            .settle(&policy, caller, payee, amount)
            .await
            .inspect_err(|e| debug!(%caller, %payee, amount, error = %e, "payment rejected"))?;

        let payment = Payment {
            id,
            payer: caller.clone(),
            payee: payee.clone(),
            amount,
            fee: split.fee,
            status: PaymentStatus::Completed,
            created_at: now,
        };
        if let Err(e) = self.stores.payments.insert(payment).await {
            return Err(self.unwind(&legs, e).await);
        }

        info!(
            payment_id = id,
            %caller,
            %payee,
            amount,
            net = split.net,
            fee = split.fee,
            "payment completed"
        );
        Ok(id)
    }

    pub async fn get_payment_details(&self, id: PaymentId) -> Result<Payment> {
        self.stores
            .payments
            .get(id)
            .await?
            .ok_or(BillingError::NotFound {
                kind: RecordKind::Payment,
                id,
            })
    }

    /// Status-only lookup for callers that just need to know a payment exists.
    pub async fn verify_payment(&self, id: PaymentId) -> Result<PaymentStatus> {
        Ok(self.get_payment_details(id).await?.status)
    }

    pub async fn create_subscription(
        &self,
        caller: &AccountId,
        payee: &AccountId,
        amount: u64,
        frequency: u64,
    ) -> Result<SubscriptionId> {
        let _policy = self.policy.lock().await;
        let id = self.stores.subscriptions.next_id().await?;
        let now = self.clock.current_tick();

        let subscription =
            Subscription::new(id, caller.clone(), payee.clone(), amount, frequency, now)?;
        self.stores.subscriptions.insert(subscription).await?;

        info!(
            subscription_id = id,
            %caller,
            %payee,
            amount,
            frequency,
            tick = now,
            "subscription created"
        );
        Ok(id)
    }

    pub async fn get_subscription_details(&self, id: SubscriptionId) -> Result<Subscription> {
        self.stores
            .subscriptions
            .get(id)
            .await?
            .ok_or(BillingError::NotFound {
                kind: RecordKind::Subscription,
                id,
            })
    }

    /// Charges one cycle of a due subscription.
    ///
    /// Anyone may trigger this; value only ever moves from the subscription's
    /// payer. On transfer failure the cursor stays put so the same cycle can be
    /// retried. If the cursor cannot be saved after settling, the transfers are
    /// reversed so a retry cannot bill the cycle twice.
    pub async fn process_subscription_payment(&self, id: SubscriptionId) -> Result<()> {
        let policy = self.policy.lock().await;
        let subscription = self.get_subscription_details(id).await?;
        let now = self.clock.current_tick();

        // The cursor moves on a copy before any value leaves the payer.
        let mut charged = subscription.clone();
        charged
            .record_payment(now)
            .inspect_err(|e| debug!(subscription_id = id, error = %e, "charge rejected"))?;

        let (split, legs) = self
            .settle(
                &policy,
                &subscription.payer,
                &subscription.payee,
                subscription.amount,
            )
            .await
            .inspect_err(|e| debug!(subscription_id = id, error = %e, "charge failed"))?;

        if let Err(e) = self.stores.subscriptions.update(charged).await {
            return Err(self.unwind(&legs, e).await);
        }

        info!(
            subscription_id = id,
            net = split.net,
            fee = split.fee,
            tick = now,
            "subscription charged"
        );
        Ok(())
    }

    /// Cancels a subscription. Only its payer may do this.
    pub async fn cancel_subscription(
        &self,
        caller: &AccountId,
        id: SubscriptionId,
    ) -> Result<bool> {
        let _policy = self.policy.lock().await;
        let mut subscription = self.get_subscription_details(id).await?;

        subscription
            .cancel(caller)
            .inspect_err(|e| debug!(subscription_id = id, %caller, error = %e, "cancel rejected"))?;
        self.stores.subscriptions.update(subscription).await?;

        info!(subscription_id = id, %caller, "subscription cancelled");
        Ok(true)
    }

    pub async fn update_fee(&self, caller: &AccountId, new_rate_bps: u64) -> Result<()> {
        let mut policy = self.policy.lock().await;

        // Mutate a copy so a failed save leaves the live policy untouched.
        let mut updated = policy.clone();
        updated
            .update_fee(caller, new_rate_bps)
            .inspect_err(|e| debug!(%caller, new_rate_bps, error = %e, "fee update rejected"))?;
        self.stores.policy.save(&updated).await?;

        let previous = policy.rate_bps();
        *policy = updated;

        info!(%caller, previous, rate_bps = new_rate_bps, "fee updated");
        Ok(())
    }

    pub async fn fee_policy(&self) -> FeePolicy {
        self.policy.lock().await.clone()
    }

    /// What a payment of `amount` would split into at the current rate.
    pub async fn quote_fee(&self, amount: u64) -> FeeSplit {
        self.policy.lock().await.split(amount)
    }

    /// Active subscriptions whose next cycle can be charged right now.
    pub async fn due_subscriptions(&self) -> Result<Vec<SubscriptionId>> {
        let now = self.clock.current_tick();
        Ok(self
            .stores
            .subscriptions
            .get_all()
            .await?
            .into_iter()
            .filter(|subscription| subscription.is_due(now))
            .map(|subscription| subscription.id)
            .collect())
    }

    pub async fn payments(&self) -> Result<Vec<Payment>> {
        self.stores.payments.get_all().await
    }

    pub async fn subscriptions(&self) -> Result<Vec<Subscription>> {
        self.stores.subscriptions.get_all().await
    }
}

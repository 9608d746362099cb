use crate::domain::account::AccountId;
use crate::domain::fee::FeePolicy;
use crate::domain::payment::{Payment, PaymentId};
use crate::domain::ports::{Clock, Ledger, PaymentStore, PolicyStore, SubscriptionStore, Transfer};
use crate::domain::subscription::{Subscription, SubscriptionId};
use crate::error::{BillingError, RecordKind, Result, TransferError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

fn out_of_sequence(kind: RecordKind, expected: u64, got: u64) -> BillingError {
    BillingError::storage(std::io::Error::other(format!(
        "{kind} id {got} out of sequence, expected {expected}"
    )))
}

/// A thread-safe in-memory payment registry.
///
/// Payments are append-only, so the id is simply the position in the vector.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<Vec<Payment>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn next_id(&self) -> Result<PaymentId> {
        Ok(self.payments.read().await.len() as PaymentId)
    }

    async fn insert(&self, payment: Payment) -> Result<()> {
        let mut payments = self.payments.write().await;
        let expected = payments.len() as PaymentId;
        if payment.id != expected {
            return Err(out_of_sequence(RecordKind::Payment, expected, payment.id));
        }
        payments.push(payment);
        Ok(())
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(usize::try_from(id)
            .ok()
            .and_then(|index| payments.get(index))
            .cloned())
    }

    async fn get_all(&self) -> Result<Vec<Payment>> {
        Ok(self.payments.read().await.clone())
    }
}

#[derive(Default)]
struct SubscriptionTable {
    next_id: SubscriptionId,
    rows: BTreeMap<SubscriptionId, Subscription>,
}

/// A thread-safe in-memory subscription registry.
#[derive(Default, Clone)]
pub struct InMemorySubscriptionStore {
    table: Arc<RwLock<SubscriptionTable>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn next_id(&self) -> Result<SubscriptionId> {
        Ok(self.table.read().await.next_id)
    }

    async fn insert(&self, subscription: Subscription) -> Result<()> {
        let mut table = self.table.write().await;
        if subscription.id != table.next_id {
            return Err(out_of_sequence(
                RecordKind::Subscription,
                table.next_id,
                subscription.id,
            ));
        }
        table.next_id += 1;
        table.rows.insert(subscription.id, subscription);
        Ok(())
    }

    async fn update(&self, subscription: Subscription) -> Result<()> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&subscription.id) {
            Some(row) => {
                *row = subscription;
                Ok(())
            }
            None => Err(BillingError::NotFound {
                kind: RecordKind::Subscription,
                id: subscription.id,
            }),
        }
    }

    async fn get(&self, id: SubscriptionId) -> Result<Option<Subscription>> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Subscription>> {
        Ok(self.table.read().await.rows.values().cloned().collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryPolicyStore {
    policy: Arc<RwLock<Option<FeePolicy>>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn load(&self) -> Result<Option<FeePolicy>> {
        Ok(self.policy.read().await.clone())
    }

    async fn save(&self, policy: &FeePolicy) -> Result<()> {
        *self.policy.write().await = Some(policy.clone());
        Ok(())
    }
}

#[derive(Default)]
struct Book {
    balances: HashMap<AccountId, u64>,
    journal: Vec<Transfer>,
}

impl Book {
    fn balance(&self, account: &AccountId) -> u64 {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// Checks every leg against a scratch copy of the touched balances.
    fn check(&self, legs: &[Transfer]) -> std::result::Result<(), TransferError> {
        let mut scratch: HashMap<&AccountId, u64> = HashMap::new();
        for leg in legs {
            if leg.to.is_empty() {
                return Err(TransferError::InvalidRecipient(leg.to.clone()));
            }
            let available = *scratch
                .entry(&leg.from)
                .or_insert_with(|| self.balance(&leg.from));
            if available < leg.amount {
                return Err(TransferError::InsufficientBalance {
                    account: leg.from.clone(),
                    needed: leg.amount,
                    available,
                });
            }
            scratch.insert(&leg.from, available - leg.amount);
            let balance = *scratch
                .entry(&leg.to)
                .or_insert_with(|| self.balance(&leg.to));
            let credited =
                balance
                    .checked_add(leg.amount)
                    .ok_or_else(|| TransferError::BalanceOverflow {
                        account: leg.to.clone(),
                        balance,
                        credit: leg.amount,
                    })?;
            scratch.insert(&leg.to, credited);
        }
        Ok(())
    }

    /// Only called with legs that already passed `check`.
    fn apply(&mut self, leg: Transfer) {
        *self.balances.entry(leg.from.clone()).or_default() -= leg.amount;
        *self.balances.entry(leg.to.clone()).or_default() += leg.amount;
        self.journal.push(leg);
    }
}

/// A simulated ledger of plain balances.
///
/// Keeps a journal of every applied transfer so callers can observe exactly
/// which legs moved.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    book: Arc<RwLock<Book>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints `amount` into `account`. Not a transfer, so not journaled.
    ///
    /// Fails without touching the balance if the result would not fit in a `u64`.
    pub async fn fund(
        &self,
        account: &AccountId,
        amount: u64,
    ) -> std::result::Result<(), TransferError> {
        let mut book = self.book.write().await;
        let balance = book.balances.entry(account.clone()).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| TransferError::BalanceOverflow {
                account: account.clone(),
                balance: *balance,
                credit: amount,
            })?;
        Ok(())
    }

    pub async fn balance(&self, account: &AccountId) -> u64 {
        self.book.read().await.balance(account)
    }

    /// All known balances ordered by account.
    pub async fn balances(&self) -> Vec<(AccountId, u64)> {
        let book = self.book.read().await;
        let mut balances: Vec<_> = book
            .balances
            .iter()
            .map(|(account, balance)| (account.clone(), *balance))
            .collect();
        balances.sort();
        balances
    }

    pub async fn journal(&self) -> Vec<Transfer> {
        self.book.read().await.journal.clone()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> std::result::Result<(), TransferError> {
        self.transfer_all(&[Transfer {
            from: from.clone(),
            to: to.clone(),
            amount,
        }])
        .await
    }

    async fn transfer_all(&self, legs: &[Transfer]) -> std::result::Result<(), TransferError> {
        let mut book = self.book.write().await;
        book.check(legs)?;
        for leg in legs {
            book.apply(leg.clone());
        }
        Ok(())
    }
}

/// A logical clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    tick: AtomicU64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            tick: AtomicU64::new(start),
        }
    }

    /// Advances the clock and returns the new tick.
    pub fn advance(&self, ticks: u64) -> u64 {
        let previous = self
            .tick
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |tick| {
                Some(tick.saturating_add(ticks))
            })
            .unwrap_or_else(|tick| tick);
        previous.saturating_add(ticks)
    }
}

impl Clock for ManualClock {
    fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::PaymentStatus;

    fn payment(id: PaymentId) -> Payment {
        Payment {
            id,
            payer: AccountId::from("deployer"),
            payee: AccountId::from("wallet_1"),
            amount: 1000,
            fee: 10,
            status: PaymentStatus::Completed,
            created_at: 0,
        }
    }

    fn subscription(id: SubscriptionId) -> Subscription {
        Subscription::new(
            id,
            AccountId::from("deployer"),
            AccountId::from("wallet_1"),
            1000,
            10,
            0,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_payment_store() {
        let store = InMemoryPaymentStore::new();
        assert_eq!(store.next_id().await.unwrap(), 0);

        store.insert(payment(0)).await.unwrap();
        assert_eq!(store.next_id().await.unwrap(), 1);
        assert_eq!(store.get(0).await.unwrap(), Some(payment(0)));
        assert!(store.get(1).await.unwrap().is_none());
        assert!(store.get(u64::MAX).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_payment_store_rejects_out_of_sequence_id() {
        let store = InMemoryPaymentStore::new();
        let result = store.insert(payment(3)).await;
        assert!(matches!(result, Err(BillingError::StorageError(_))));
        assert_eq!(store.next_id().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_in_memory_subscription_store() {
        let store = InMemorySubscriptionStore::new();
        store.insert(subscription(0)).await.unwrap();
        store.insert(subscription(1)).await.unwrap();
        assert_eq!(store.next_id().await.unwrap(), 2);

        let mut updated = subscription(1);
        updated.last_paid_at = 42;
        store.update(updated.clone()).await.unwrap();
        assert_eq!(store.get(1).await.unwrap(), Some(updated));
        assert_eq!(store.next_id().await.unwrap(), 2);

        let all = store.get_all().await.unwrap();
        assert_eq!(all.iter().map(|s| s.id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_subscription_update_requires_existing_row() {
        let store = InMemorySubscriptionStore::new();
        let result = store.update(subscription(0)).await;
        assert!(matches!(result, Err(BillingError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_ledger_transfer_all_is_atomic() {
        let ledger = InMemoryLedger::new();
        let payer = AccountId::from("payer");
        let payee = AccountId::from("payee");
        let owner = AccountId::from("owner");
        ledger.fund(&payer, 995).await.unwrap();

        let legs = [
            Transfer {
                from: payer.clone(),
                to: payee.clone(),
                amount: 990,
            },
            Transfer {
                from: payer.clone(),
                to: owner.clone(),
                amount: 10,
            },
        ];
        let result = ledger.transfer_all(&legs).await;
        assert!(matches!(
            result,
            Err(TransferError::InsufficientBalance {
                needed: 10,
                available: 5,
                ..
            })
        ));
        assert_eq!(ledger.balance(&payer).await, 995);
        assert_eq!(ledger.balance(&payee).await, 0);
        assert!(ledger.journal().await.is_empty());

        ledger.fund(&payer, 5).await.unwrap();
        ledger.transfer_all(&legs).await.unwrap();
        assert_eq!(ledger.balance(&payer).await, 0);
        assert_eq!(ledger.balance(&payee).await, 990);
        assert_eq!(ledger.balance(&owner).await, 10);
        assert_eq!(ledger.journal().await.len(), 2);
    }

    #[tokio::test]
    async fn test_ledger_self_transfer() {
        let ledger = InMemoryLedger::new();
        let owner = AccountId::from("deployer");
        ledger.fund(&owner, 10).await.unwrap();
        ledger.transfer(&owner, &owner, 10).await.unwrap();
        assert_eq!(ledger.balance(&owner).await, 10);
    }

    #[tokio::test]
    async fn test_ledger_rejects_empty_recipient() {
        let ledger = InMemoryLedger::new();
        let payer = AccountId::from("payer");
        ledger.fund(&payer, 10).await.unwrap();
        let result = ledger.transfer(&payer, &AccountId::from(""), 1).await;
        assert!(matches!(result, Err(TransferError::InvalidRecipient(_))));
    }

    #[tokio::test]
    async fn test_ledger_rejects_credit_past_u64_max() {
        let ledger = InMemoryLedger::new();
        let payer = AccountId::from("payer");
        let shop = AccountId::from("shop");
        let owner = AccountId::from("owner");
        ledger.fund(&payer, 1000).await.unwrap();
        ledger.fund(&shop, u64::MAX).await.unwrap();

        let legs = [
            Transfer {
                from: payer.clone(),
                to: owner.clone(),
                amount: 10,
            },
            Transfer {
                from: payer.clone(),
                to: shop.clone(),
                amount: 990,
            },
        ];
        let result = ledger.transfer_all(&legs).await;
        assert!(matches!(
            result,
            Err(TransferError::BalanceOverflow { credit: 990, .. })
        ));
        assert_eq!(ledger.balance(&payer).await, 1000);
        assert_eq!(ledger.balance(&owner).await, 0);
        assert_eq!(ledger.balance(&shop).await, u64::MAX);
        assert!(ledger.journal().await.is_empty());
    }

    #[tokio::test]
    async fn test_fund_rejects_overflow() {
        let ledger = InMemoryLedger::new();
        let shop = AccountId::from("shop");
        ledger.fund(&shop, u64::MAX - 1).await.unwrap();

        let result = ledger.fund(&shop, 2).await;
        assert!(matches!(
            result,
            Err(TransferError::BalanceOverflow {
                balance,
                credit: 2,
                ..
            }) if balance == u64::MAX - 1
        ));
        assert_eq!(ledger.balance(&shop).await, u64::MAX - 1);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(3);
        assert_eq!(clock.current_tick(), 3);
        assert_eq!(clock.advance(10), 13);
        assert_eq!(clock.current_tick(), 13);
        assert_eq!(clock.advance(u64::MAX), u64::MAX);
    }
}

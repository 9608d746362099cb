use crate::domain::fee::FeePolicy;
use crate::domain::payment::{Payment, PaymentId};
use crate::domain::ports::{PaymentStore, PolicyStore, SubscriptionStore};
use crate::domain::subscription::{Subscription, SubscriptionId};
use crate::error::{BillingError, RecordKind, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// Column Family for storing payment records.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for storing subscription records.
pub const CF_SUBSCRIPTIONS: &str = "subscriptions";
/// Column Family for id counters and the fee policy.
pub const CF_META: &str = "meta";

const KEY_NEXT_PAYMENT: &[u8] = b"next_payment_id";
const KEY_NEXT_SUBSCRIPTION: &[u8] = b"next_subscription_id";
const KEY_POLICY: &[u8] = b"fee_policy";

/// A persistent store implementation using RocksDB.
///
/// Handles payments, subscriptions and the fee policy using separate Column
/// Families. A record and the counter it advances are written in one
/// `WriteBatch`, so an id is never consumed without its record.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        BillingError::storage(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Serialization error: {}", e),
        ))
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        BillingError::storage(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Deserialization error: {}", e),
        ))
    })
}

impl From<rocksdb::Error> for BillingError {
    fn from(err: rocksdb::Error) -> Self {
        BillingError::storage(err)
    }
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_PAYMENTS, CF_SUBSCRIPTIONS, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            BillingError::storage(std::io::Error::other(format!(
                "{} column family not found",
                name
            )))
        })
    }

    fn counter(&self, key: &[u8]) -> Result<u64> {
        let meta = self.cf(CF_META)?;
        match self.db.get_pinned_cf(meta, key)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    BillingError::storage(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "corrupt id counter",
                    ))
                })?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    /// Writes a new record and bumps its counter in one batch.
    fn append<T: Serialize>(
        &self,
        cf_name: &str,
        counter_key: &[u8],
        kind: RecordKind,
        id: u64,
        record: &T,
    ) -> Result<()> {
        let expected = self.counter(counter_key)?;
        if id != expected {
            return Err(BillingError::storage(std::io::Error::other(format!(
                "{kind} id {id} out of sequence, expected {expected}"
            ))));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(cf_name)?, id.to_be_bytes(), encode(record)?);
        batch.put_cf(self.cf(CF_META)?, counter_key, (id + 1).to_be_bytes());
        self.db.write(batch)?;
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, id: u64) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_pinned_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Big-endian keys make iteration order equal id order.
    fn read_all<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            records.push(decode(&value)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn next_id(&self) -> Result<PaymentId> {
        self.counter(KEY_NEXT_PAYMENT)
    }

    async fn insert(&self, payment: Payment) -> Result<()> {
        self.append(
            CF_PAYMENTS,
            KEY_NEXT_PAYMENT,
            RecordKind::Payment,
            payment.id,
            &payment,
        )
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.read(CF_PAYMENTS, id)
    }

    async fn get_all(&self) -> Result<Vec<Payment>> {
        self.read_all(CF_PAYMENTS)
    }
}

#[async_trait]
impl SubscriptionStore for RocksDBStore {
    async fn next_id(&self) -> Result<SubscriptionId> {
        self.counter(KEY_NEXT_SUBSCRIPTION)
    }

    async fn insert(&self, subscription: Subscription) -> Result<()> {
        self.append(
            CF_SUBSCRIPTIONS,
            KEY_NEXT_SUBSCRIPTION,
            RecordKind::Subscription,
            subscription.id,
            &subscription,
        )
    }

    async fn update(&self, subscription: Subscription) -> Result<()> {
        let cf = self.cf(CF_SUBSCRIPTIONS)?;
        let key = subscription.id.to_be_bytes();
        if self.db.get_pinned_cf(cf, key)?.is_none() {
            return Err(BillingError::NotFound {
                kind: RecordKind::Subscription,
                id: subscription.id,
            });
        }
        self.db.put_cf(cf, key, encode(&subscription)?)?;
        Ok(())
    }

    async fn get(&self, id: SubscriptionId) -> Result<Option<Subscription>> {
        self.read(CF_SUBSCRIPTIONS, id)
    }

    async fn get_all(&self) -> Result<Vec<Subscription>> {
        self.read_all(CF_SUBSCRIPTIONS)
    }
}

#[async_trait]
impl PolicyStore for RocksDBStore {
    async fn load(&self) -> Result<Option<FeePolicy>> {
        let meta = self.cf(CF_META)?;
        match self.db.get_pinned_cf(meta, KEY_POLICY)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, policy: &FeePolicy) -> Result<()> {
        self.db.put_cf(self.cf(CF_META)?, KEY_POLICY, encode(policy)?)?;
        Ok(())
    }
}

//! Replays script requests against a `BillingEngine` backed by a simulated
//! ledger and a manual clock.

use crate::application::engine::BillingEngine;
use crate::domain::ports::Clock;
use crate::error::Result;
use crate::infrastructure::in_memory::{InMemoryLedger, ManualClock};
use crate::interfaces::csv::command_reader::Request;
use crate::interfaces::csv::report_writer::{BalanceRow, Report};
use std::sync::Arc;
use tracing::debug;

pub struct ScriptSession {
    engine: BillingEngine,
    ledger: InMemoryLedger,
    clock: Arc<ManualClock>,
}

impl ScriptSession {
    /// `ledger` and `clock` must be the same instances the engine was opened with.
    pub fn new(engine: BillingEngine, ledger: InMemoryLedger, clock: Arc<ManualClock>) -> Self {
        Self {
            engine,
            ledger,
            clock,
        }
    }

    pub fn engine(&self) -> &BillingEngine {
        &self.engine
    }

    pub fn ledger(&self) -> &InMemoryLedger {
        &self.ledger
    }

    pub async fn apply(&self, request: Request) -> Result<()> {
        match request {
            Request::Fund { account, amount } => {
                self.ledger.fund(&account, amount).await?;
                debug!(%account, amount, "account funded");
            }
            Request::Advance { ticks } => {
                let tick = self.clock.advance(ticks);
                debug!(tick, "clock advanced");
            }
            Request::Pay {
                caller,
                payee,
                amount,
            } => {
                self.engine.process_payment(&caller, &payee, amount).await?;
            }
            Request::Subscribe {
                caller,
                payee,
                amount,
                frequency,
            } => {
                self.engine
                    .create_subscription(&caller, &payee, amount, frequency)
                    .await?;
            }
            Request::Charge { id } => self.engine.process_subscription_payment(id).await?,
            Request::Cancel { caller, id } => {
                self.engine.cancel_subscription(&caller, id).await?;
            }
            Request::SetFee { caller, rate_bps } => {
                self.engine.update_fee(&caller, rate_bps).await?;
            }
        }
        Ok(())
    }

    pub async fn report(&self) -> Result<Report> {
        let policy = self.engine.fee_policy().await;
        let balances = self
            .ledger
            .balances()
            .await
            .into_iter()
            .map(|(account, balance)| BalanceRow { account, balance })
            .collect();

        Ok(Report {
            tick: self.clock.current_tick(),
            fee_owner: policy.owner().clone(),
            fee_rate_bps: policy.rate_bps(),
            balances,
            payments: self
                .engine
                .payments()
                .await?
                .into_iter()
                .map(Into::into)
                .collect(),
            subscriptions: self
                .engine
                .subscriptions()
                .await?
                .into_iter()
                .map(Into::into)
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::engine::Stores;
    use crate::domain::account::AccountId;
    use crate::domain::fee::FeePolicy;
    use crate::error::BillingError;
    use crate::infrastructure::in_memory::{
        InMemoryPaymentStore, InMemoryPolicyStore, InMemorySubscriptionStore,
    };

    async fn session() -> ScriptSession {
        let ledger = InMemoryLedger::new();
        let clock = Arc::new(ManualClock::new(0));
        let engine = BillingEngine::open(
            Stores {
                payments: Box::new(InMemoryPaymentStore::new()),
                subscriptions: Box::new(InMemorySubscriptionStore::new()),
                policy: Box::new(InMemoryPolicyStore::new()),
            },
            Arc::new(ledger.clone()),
            clock.clone(),
            FeePolicy::with_default_rate(AccountId::from("deployer")),
        )
        .await
        .unwrap();
        ScriptSession::new(engine, ledger, clock)
    }

    #[tokio::test]
    async fn test_session_replays_subscription_cycle() {
        let session = session().await;
        let deployer = AccountId::from("deployer");
        let wallet = AccountId::from("wallet_1");

        for request in [
            Request::Fund {
                account: deployer.clone(),
                amount: 2000,
            },
            Request::Subscribe {
                caller: deployer.clone(),
                payee: wallet.clone(),
                amount: 1000,
                frequency: 10,
            },
            Request::Advance { ticks: 10 },
            Request::Charge { id: 0 },
        ] {
            session.apply(request).await.unwrap();
        }

        let report = session.report().await.unwrap();
        assert_eq!(report.tick, 10);
        assert_eq!(report.subscriptions[0].last_paid_at, 10);
        assert_eq!(report.subscriptions[0].due_at, 20);
        assert_eq!(
            report.balances,
            vec![
                BalanceRow {
                    account: deployer,
                    balance: 1010
                },
                BalanceRow {
                    account: wallet,
                    balance: 990
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_session_surfaces_engine_errors() {
        let session = session().await;
        let result = session
            .apply(Request::SetFee {
                caller: AccountId::from("wallet_1"),
                rate_bps: 20,
            })
            .await;
        assert!(matches!(result, Err(BillingError::Unauthorized(_))));
        assert_eq!(session.engine().fee_policy().await.rate_bps(), 100);
    }
}

use crate::domain::account::AccountId;
use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct BalanceRow {
    pub account: AccountId,
    pub balance: u64,
}

#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct PaymentRow {
    pub id: u64,
    pub payer: AccountId,
    pub payee: AccountId,
    pub amount: u64,
    pub net: u64,
    pub fee: u64,
    pub status: PaymentStatus,
    pub created_at: u64,
}

impl From<Payment> for PaymentRow {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            net: payment.net(),
            payer: payment.payer,
            payee: payment.payee,
            amount: payment.amount,
            fee: payment.fee,
            status: payment.status,
            created_at: payment.created_at,
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct SubscriptionRow {
    pub id: u64,
    pub payer: AccountId,
    pub payee: AccountId,
    pub amount: u64,
    pub frequency: u64,
    pub last_paid_at: u64,
    pub due_at: u64,
    pub status: SubscriptionStatus,
}

impl From<Subscription> for SubscriptionRow {
    fn from(subscription: Subscription) -> Self {
        Self {
            id: subscription.id,
            due_at: subscription.due_at(),
            payer: subscription.payer,
            payee: subscription.payee,
            amount: subscription.amount,
            frequency: subscription.frequency,
            last_paid_at: subscription.last_paid_at,
            status: subscription.status,
        }
    }
}

/// Final state of a script run.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct Report {
    pub tick: u64,
    pub fee_owner: AccountId,
    pub fee_rate_bps: u16,
    pub balances: Vec<BalanceRow>,
    pub payments: Vec<PaymentRow>,
    pub subscriptions: Vec<SubscriptionRow>,
}

const BALANCE_HEADERS: [&str; 2] = ["account", "balance"];
const PAYMENT_HEADERS: [&str; 8] = [
    "id",
    "payer",
    "payee",
    "amount",
    "net",
    "fee",
    "status",
    "created_at",
];
const SUBSCRIPTION_HEADERS: [&str; 8] = [
    "id",
    "payer",
    "payee",
    "amount",
    "frequency",
    "last_paid_at",
    "due_at",
    "status",
];

/// Writes a `Report` either as CSV sections or as one JSON document.
pub struct ReportWriter<W: Write> {
    writer: W,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    fn write_section<T: Serialize>(&mut self, headers: &[&str], rows: &[T]) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut self.writer);
        wtr.write_record(headers)?;
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Balances, payments and subscriptions, each with its own header and
    /// separated by a blank line. Headers are written even for empty sections.
    pub fn write_csv(&mut self, report: &Report) -> Result<()> {
        self.write_section(&BALANCE_HEADERS, &report.balances)?;
        writeln!(self.writer)?;
        self.write_section(&PAYMENT_HEADERS, &report.payments)?;
        writeln!(self.writer)?;
        self.write_section(&SUBSCRIPTION_HEADERS, &report.subscriptions)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn write_json(&mut self, report: &Report) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, report).map_err(std::io::Error::from)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}

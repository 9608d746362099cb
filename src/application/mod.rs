//! Application layer containing the billing orchestration.
//!
//! This module defines the `BillingEngine`, the single entry point for
//! payments, subscriptions and fee changes. It serializes every mutating
//! operation behind one `tokio` mutex so that registry updates and ledger
//! transfers are applied together or not at all.

pub mod engine;

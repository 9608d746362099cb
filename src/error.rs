use crate::domain::account::AccountId;
use std::fmt;
use thiserror::Error;

/// The registry a missing record was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Payment,
    Subscription,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Payment => f.write_str("payment"),
            RecordKind::Subscription => f.write_str("subscription"),
        }
    }
}

/// Failure reported by the ledger when moving value between accounts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("insufficient balance in {account}: needed {needed}, available {available}")]
    InsufficientBalance {
        account: AccountId,
        needed: u64,
        available: u64,
    },
    #[error("invalid recipient {0}")]
    InvalidRecipient(AccountId),
    #[error("crediting {credit} to {account} would overflow its balance of {balance}")]
    BalanceOverflow {
        account: AccountId,
        balance: u64,
        credit: u64,
    },
}

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("caller {0} is not authorized for this operation")]
    Unauthorized(AccountId),
    #[error("fee rate {0} bps exceeds 10000")]
    InvalidRate(u64),
    #[error("amount must be greater than zero")]
    InvalidAmount,
    #[error("frequency must be greater than zero")]
    InvalidFrequency,
    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: u64 },
    #[error("subscription {0} is cancelled")]
    SubscriptionCancelled(u64),
    #[error("subscription {0} is already cancelled")]
    AlreadyCancelled(u64),
    #[error("subscription {id} is not due until tick {due_at} (now {now})")]
    NotYetDue { id: u64, due_at: u64, now: u64 },
    #[error("transfer failed: {0}")]
    TransferFailed(#[from] TransferError),
    #[error("Storage error: {0}")]
    StorageError(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Malformed command: {0}")]
    MalformedCommand(String),
}

impl BillingError {
    /// Stable numeric code for domain errors, `None` for infrastructure failures.
    pub fn code(&self) -> Option<u32> {
        match self {
            BillingError::Unauthorized(_) => Some(100),
            BillingError::InvalidRate(_) => Some(101),
            BillingError::InvalidAmount => Some(102),
            BillingError::InvalidFrequency => Some(103),
            BillingError::NotFound { .. } => Some(104),
            BillingError::SubscriptionCancelled(_) => Some(105),
            BillingError::AlreadyCancelled(_) => Some(106),
            BillingError::NotYetDue { .. } => Some(107),
            BillingError::TransferFailed(_) => Some(108),
            BillingError::StorageError(_)
            | BillingError::CsvError(_)
            | BillingError::IoError(_)
            | BillingError::MalformedCommand(_) => None,
        }
    }

    pub(crate) fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        BillingError::StorageError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_have_codes() {
        assert_eq!(
            BillingError::Unauthorized(AccountId::from("mallory")).code(),
            Some(100)
        );
        assert_eq!(
            BillingError::NotYetDue {
                id: 0,
                due_at: 10,
                now: 3
            }
            .code(),
            Some(107)
        );
        assert_eq!(
            BillingError::MalformedCommand("missing id".to_string()).code(),
            None
        );
    }

    #[test]
    fn test_transfer_error_converts() {
        let err: BillingError = TransferError::InvalidRecipient(AccountId::from("")).into();
        assert!(matches!(err, BillingError::TransferFailed(_)));
        assert_eq!(err.code(), Some(108));
    }

    #[test]
    fn test_not_found_message() {
        let err = BillingError::NotFound {
            kind: RecordKind::Subscription,
            id: 7,
        };
        assert_eq!(err.to_string(), "subscription 7 not found");
    }
}

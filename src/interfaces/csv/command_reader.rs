use crate::domain::account::AccountId;
use crate::error::{BillingError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum CommandType {
    Fund,
    Advance,
    Pay,
    Subscribe,
    Charge,
    Cancel,
    SetFee,
}

/// One raw script row: `type, account, payee, id, value, frequency`.
///
/// `value` is an amount for `fund`, `pay` and `subscribe`, a tick count for
/// `advance` and a rate in basis points for `set-fee`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CommandRecord {
    pub r#type: CommandType,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub payee: Option<String>,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub value: Option<u64>,
    #[serde(default)]
    pub frequency: Option<u64>,
}

/// A validated script request.
#[derive(Debug, PartialEq, Clone)]
pub enum Request {
    Fund {
        account: AccountId,
        amount: u64,
    },
    Advance {
        ticks: u64,
    },
    Pay {
        caller: AccountId,
        payee: AccountId,
        amount: u64,
    },
    Subscribe {
        caller: AccountId,
        payee: AccountId,
        amount: u64,
        frequency: u64,
    },
    Charge {
        id: u64,
    },
    Cancel {
        caller: AccountId,
        id: u64,
    },
    SetFee {
        caller: AccountId,
        rate_bps: u64,
    },
}

fn required<T>(field: Option<T>, name: &str, command: CommandType) -> Result<T> {
    field.ok_or_else(|| BillingError::MalformedCommand(format!("{command:?} requires `{name}`")))
}

fn account(field: Option<String>, name: &str, command: CommandType) -> Result<AccountId> {
    let raw = required(field, name, command)?;
    if raw.is_empty() {
        return Err(BillingError::MalformedCommand(format!(
            "{command:?} requires a non-empty `{name}`"
        )));
    }
    Ok(AccountId::from(raw))
}

impl TryFrom<CommandRecord> for Request {
    type Error = BillingError;

    fn try_from(record: CommandRecord) -> Result<Self> {
        let kind = record.r#type;
        let request = match kind {
            CommandType::Fund => Request::Fund {
                account: account(record.account, "account", kind)?,
                amount: required(record.value, "value", kind)?,
            },
            CommandType::Advance => Request::Advance {
                ticks: required(record.value, "value", kind)?,
            },
            CommandType::Pay => Request::Pay {
                caller: account(record.account, "account", kind)?,
                payee: account(record.payee, "payee", kind)?,
                amount: required(record.value, "value", kind)?,
            },
            CommandType::Subscribe => Request::Subscribe {
                caller: account(record.account, "account", kind)?,
                payee: account(record.payee, "payee", kind)?,
                amount: required(record.value, "value", kind)?,
                frequency: required(record.frequency, "frequency", kind)?,
            },
            CommandType::Charge => Request::Charge {
                id: required(record.id, "id", kind)?,
            },
            CommandType::Cancel => Request::Cancel {
                caller: account(record.account, "account", kind)?,
                id: required(record.id, "id", kind)?,
            },
            CommandType::SetFee => Request::SetFee {
                caller: account(record.account, "account", kind)?,
                rate_bps: required(record.value, "value", kind)?,
            },
        };
        Ok(request)
    }
}

/// Reads script requests from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// so trailing columns a command does not use may be left out.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and validates requests, one result per data row.
    pub fn requests(self) -> impl Iterator<Item = Result<Request>> {
        self.reader.into_deserialize().map(|result| {
            let record: CommandRecord = result.map_err(BillingError::from)?;
            Request::try_from(record)
        })
    }
}

//! Core ledger types: transactions, payment methods and listing filters.

use std::fmt::Display;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use time::{Date, Month, OffsetDateTime, macros::format_description};

use crate::{
    Error,
    category::CategoryType,
    database_id::{CategoryId, TransactionId},
    money::Amount,
};

/// How a transaction was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Other,
}

impl PaymentMethod {
    fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Card => "CARD",
            PaymentMethod::Transfer => "TRANSFER",
            PaymentMethod::Other => "OTHER",
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for PaymentMethod {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PaymentMethod {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "CASH" => Ok(PaymentMethod::Cash),
            "CARD" => Ok(PaymentMethod::Card),
            "TRANSFER" => Ok(PaymentMethod::Transfer),
            "OTHER" => Ok(PaymentMethod::Other),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// An income or expense recorded by a user.
///
/// The type always equals the type of the referenced category and the
/// amount is always positive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub amount: Amount,
    #[serde(rename = "type")]
    pub transaction_type: CategoryType,
    pub category_id: CategoryId,
    pub payment_method: PaymentMethod,
    pub date: Date,
    pub note: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The validated fields of a transaction, before it is given an ID.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionFields {
    pub amount: Amount,
    pub transaction_type: CategoryType,
    pub category_id: CategoryId,
    pub payment_method: PaymentMethod,
    pub date: Date,
    pub note: Option<String>,
}

impl From<&Transaction> for TransactionFields {
    fn from(transaction: &Transaction) -> Self {
        Self {
            amount: transaction.amount,
            transaction_type: transaction.transaction_type,
            category_id: transaction.category_id,
            payment_method: transaction.payment_method,
            date: transaction.date,
            note: transaction.note.clone(),
        }
    }
}

/// Which of a user's transactions to list. Every condition that is set must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    /// The earliest date, inclusive.
    pub from: Option<Date>,
    /// The latest date, inclusive.
    pub to: Option<Date>,
    pub category_id: Option<CategoryId>,
    pub transaction_type: Option<CategoryType>,
}

/// Parse an ISO calendar date such as "2024-05-10".
///
/// # Errors
///
/// Returns [Error::InvalidDate] if `raw` is not a valid `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Result<Date, Error> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| Error::InvalidDate(raw.to_owned()))
}

/// Check that `date` is not in the future.
///
/// One day of slack is given past `today` (UTC), since it is already
/// tomorrow in timezones ahead of UTC.
///
/// # Errors
///
/// Returns [Error::FutureDate] if `date` is after the day after `today`.
pub fn validate_date(date: Date, today: Date) -> Result<Date, Error> {
    match today.next_day() {
        Some(tomorrow) if date > tomorrow => Err(Error::FutureDate(date)),
        _ => Ok(date),
    }
}

/// Trim a note, treating an empty note as no note.
pub fn normalize_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim)
        .filter(|note| !note.is_empty())
        .map(str::to_owned)
}

/// The first and last day of a calendar month.
///
/// # Errors
///
/// Returns [Error::InvalidMonth] if `month` is not in `1..=12` or `year` is out of range.
pub fn month_bounds(year: i32, month: u8) -> Result<(Date, Date), Error> {
    let invalid = || Error::InvalidMonth { year, month };

    let month = Month::try_from(month).map_err(|_| invalid())?;
    let first_day = Date::from_calendar_date(year, month, 1).map_err(|_| invalid())?;
    let next_month_first_day = match month {
        Month::December => Date::from_calendar_date(year + 1, Month::January, 1),
        month => Date::from_calendar_date(year, month.next(), 1),
    }
    .map_err(|_| invalid())?;
    let last_day = next_month_first_day.previous_day().ok_or_else(invalid)?;

    Ok((first_day, last_day))
}

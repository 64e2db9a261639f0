//! Exact decimal money values and their conversions to and from JSON and SQLite.
//!
//! Money never passes through a binary float: clients send decimal strings
//! (or whole numbers), SQLite stores the canonical decimal text, and all sums
//! are computed with [Decimal].

use std::str::FromStr;

use rusqlite::{
    Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Error;

/// A money value as sent by a client.
///
/// JSON numbers with a fractional part are rejected during deserialization
/// because they have already been rounded to a binary float by the parser.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DecimalInput {
    /// A decimal string, e.g. "12.50".
    Text(String),
    /// A whole number, e.g. 300.
    Integer(i64),
}

impl TryFrom<DecimalInput> for Decimal {
    type Error = Error;

    fn try_from(value: DecimalInput) -> Result<Self, Self::Error> {
        match value {
            DecimalInput::Text(text) => parse_decimal(&text),
            DecimalInput::Integer(integer) => Ok(Decimal::from(integer)),
        }
    }
}

/// Parse a decimal string such as "12.50".
///
/// # Errors
///
/// Returns [Error::InvalidAmount] if `raw` is not a plain decimal number.
pub fn parse_decimal(raw: &str) -> Result<Decimal, Error> {
    Decimal::from_str(raw.trim()).map_err(|_| Error::InvalidAmount(raw.to_owned()))
}

/// The largest amount, or monthly budget, accepted from a client.
///
/// Far below [Decimal::MAX], so that summing every transaction a user could
/// ever record cannot overflow.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

/// A strictly positive amount of money, at most [MAX_AMOUNT].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    /// Create an amount.
    ///
    /// # Errors
    ///
    /// Returns [Error::NonPositiveAmount] if `value` is zero or negative,
    /// or [Error::AmountTooLarge] if `value` is above [MAX_AMOUNT].
    pub fn new(value: Decimal) -> Result<Self, Error> {
        if value <= Decimal::ZERO {
            Err(Error::NonPositiveAmount)
        } else if value > MAX_AMOUNT {
            Err(Error::AmountTooLarge)
        } else {
            Ok(Self(value))
        }
    }

    /// The amount as a decimal.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<DecimalInput> for Amount {
    type Error = Error;

    fn try_from(value: DecimalInput) -> Result<Self, Self::Error> {
        Amount::new(value.try_into()?)
    }
}

impl ToSql for Amount {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.to_string()))
    }
}

impl FromSql for Amount {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        decimal_column_result(value).map(Self)
    }
}

/// Read a decimal stored as text from column `index` of `row`.
pub fn get_decimal(row: &Row, index: usize) -> Result<Decimal, rusqlite::Error> {
    let text: String = row.get(index)?;

    Decimal::from_str(&text).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            Box::new(error),
        )
    })
}

fn decimal_column_result(value: ValueRef<'_>) -> FromSqlResult<Decimal> {
    let text = value.as_str()?;

    Decimal::from_str(text).map_err(|error| FromSqlError::Other(Box::new(error)))
}

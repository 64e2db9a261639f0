//! Core category domain types.

use std::fmt::Display;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, database_id::CategoryId};

/// Whether money flows in or out.
///
/// Used both for categories and for the transactions recorded under them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CategoryType {
    /// Money earned, e.g. salary.
    Income,
    /// Money spent, e.g. groceries.
    Expense,
}

impl CategoryType {
    fn as_str(&self) -> &'static str {
        match self {
            CategoryType::Income => "INCOME",
            CategoryType::Expense => "EXPENSE",
        }
    }
}

impl Display for CategoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for CategoryType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CategoryType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "INCOME" => Ok(CategoryType::Income),
            "EXPENSE" => Ok(CategoryType::Expense),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// A validated, non-empty category name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Hash)]
#[serde(transparent)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name. Surrounding whitespace is removed.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyCategoryName] if `name` is empty or only whitespace.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyCategoryName)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if the non-empty invariant is violated it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user-defined bucket for income or expenses (e.g., 'Groceries', 'Salary').
///
/// The type of a category never changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: CategoryName,
    #[serde(rename = "type")]
    pub category_type: CategoryType,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

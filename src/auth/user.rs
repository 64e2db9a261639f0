//! Code for creating the user table and fetching and updating users in the database.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    Error,
    auth::{Email, PasswordHash},
    database_id::UserId,
    money::{MAX_AMOUNT, get_decimal},
};

/// A user's display name, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UserName(String);

impl UserName {
    /// Create a user name.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyUserName] if `name` is empty or only whitespace.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyUserName)
        } else {
            Ok(Self(name.to_owned()))
        }
    }

    /// Create a user name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl AsRef<str> for UserName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The code of the currency a user's amounts are displayed in, e.g. "NZD".
///
/// The currency is a label only, amounts are never converted between currencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Create a currency code from three ASCII letters, stored in upper case.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidCurrency] if `code` is not three ASCII letters.
    pub fn new(code: &str) -> Result<Self, Error> {
        let code = code.trim();

        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_uppercase()))
        } else {
            Err(Error::InvalidCurrency(code.to_owned()))
        }
    }

    /// Create a currency code without validation.
    pub fn new_unchecked(code: &str) -> Self {
        Self(code.to_owned())
    }
}

impl AsRef<str> for CurrencyCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Check that a monthly budget is between zero and [MAX_AMOUNT].
///
/// # Errors
///
/// This function will return an [Error::NegativeBudget] if `budget` is below zero,
/// or an [Error::AmountTooLarge] if it is above [MAX_AMOUNT].
pub fn validate_monthly_budget(budget: Decimal) -> Result<Decimal, Error> {
    if budget.is_sign_negative() && !budget.is_zero() {
        Err(Error::NegativeBudget)
    } else if budget > MAX_AMOUNT {
        Err(Error::AmountTooLarge)
    } else {
        Ok(budget)
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserId,
    /// The name shown to the user.
    pub name: UserName,
    /// The email address the user logs in with.
    pub email: Email,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// The currency the user's amounts are displayed in.
    pub currency: CurrencyCode,
    /// How much the user plans to spend each month.
    pub monthly_budget: Decimal,
    /// Disabled users can no longer log in. Users are never deleted.
    pub disabled: bool,
    /// When the user registered.
    pub created_at: OffsetDateTime,
}

/// The data needed to register a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// The name shown to the user.
    pub name: UserName,
    /// The email address the user logs in with.
    pub email: Email,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// The currency the user's amounts are displayed in.
    pub currency: CurrencyCode,
    /// How much the user plans to spend each month, not negative.
    pub monthly_budget: Decimal,
}

/// The profile fields a user may change. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    /// The new display name.
    pub name: Option<UserName>,
    /// The new display currency.
    pub currency: Option<CurrencyCode>,
    /// The new monthly budget, not negative.
    pub monthly_budget: Option<Decimal>,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                currency TEXT NOT NULL,
                monthly_budget TEXT NOT NULL,
                disabled INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

const USER_COLUMNS: &str =
    "id, name, email, password, currency, monthly_budget, disabled, created_at";

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns a [Error::DuplicateEmail] if the email is already registered, or a
/// [Error::SqlError] if some other SQL related error occurred.
pub fn create_user(
    new_user: NewUser,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<User, Error> {
    connection.execute(
        "INSERT INTO user (name, email, password, currency, monthly_budget, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            new_user.name.as_ref(),
            new_user.email.as_ref(),
            new_user.password_hash.as_ref(),
            new_user.currency.as_ref(),
            new_user.monthly_budget.to_string(),
            created_at,
        ),
    )?;

    let id = UserId::new(connection.last_insert_rowid());

    Ok(User {
        id,
        name: new_user.name,
        email: new_user.email,
        password_hash: new_user.password_hash,
        currency: new_user.currency,
        monthly_budget: new_user.monthly_budget,
        disabled: false,
        created_at,
    })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserId, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!("SELECT {USER_COLUMNS} FROM user WHERE id = :id"))?
        .query_row(&[(":id", &user_id)], map_user_row)
        .map_err(|error| error.into())
}

/// Get the user registered with `email`.
///
/// # Errors
///
/// This function will return a [Error::NotFound] if no user is registered
/// with `email`, or a [Error::SqlError] if there was an SQL error.
pub fn get_user_by_email(email: &Email, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!(
            "SELECT {USER_COLUMNS} FROM user WHERE email = :email"
        ))?
        .query_row(&[(":email", email.as_ref())], map_user_row)
        .map_err(|error| error.into())
}

/// Apply the fields present in `update` to the user's profile and return the updated user.
///
/// # Errors
///
/// This function will return a [Error::NotFound] if `user_id` does not refer
/// to a user, or a [Error::SqlError] if there was an SQL error.
pub fn update_profile(
    user_id: UserId,
    update: ProfileUpdate,
    connection: &Connection,
) -> Result<User, Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET
            name = COALESCE(?1, name),
            currency = COALESCE(?2, currency),
            monthly_budget = COALESCE(?3, monthly_budget)
         WHERE id = ?4",
        (
            update.name.as_ref().map(|name| name.as_ref()),
            update.currency.as_ref().map(|currency| currency.as_ref()),
            update.monthly_budget.map(|budget| budget.to_string()),
            user_id,
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    get_user_by_id(user_id, connection)
}

/// Replace the user's password hash.
///
/// # Errors
///
/// This function will return a [Error::NotFound] if `user_id` does not refer
/// to a user, or a [Error::SqlError] if there was an SQL error.
pub fn update_password(
    user_id: UserId,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET password = ?1 WHERE id = ?2",
        (password_hash.as_ref(), user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Disable or re-enable a user.
///
/// # Errors
///
/// This function will return a [Error::NotFound] if `user_id` does not refer
/// to a user, or a [Error::SqlError] if there was an SQL error.
pub fn set_user_disabled(
    user_id: UserId,
    disabled: bool,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET disabled = ?1 WHERE id = ?2",
        (disabled, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_name: String = row.get(1)?;
    let raw_email: String = row.get(2)?;
    let raw_password_hash: String = row.get(3)?;
    let raw_currency: String = row.get(4)?;

    Ok(User {
        id: row.get(0)?,
        name: UserName::new_unchecked(&raw_name),
        email: Email::new_unchecked(&raw_email),
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
        currency: CurrencyCode::new_unchecked(&raw_currency),
        monthly_budget: get_decimal(row, 5)?,
        disabled: row.get(6)?,
        created_at: row.get(7)?,
    })
}

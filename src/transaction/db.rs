//! Database operations for the ledger.
//!
//! These functions trust their input: ownership of the category and the
//! category type rule are checked by [crate::transaction::add_transaction]
//! and [crate::transaction::edit_transaction]. The composite foreign key
//! still guarantees that a transaction can only reference a category of the
//! same user.

use rusqlite::{Connection, Row, ToSql, params_from_iter};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::{TransactionId, UserId},
    money::Amount,
    transaction::{Transaction, TransactionFields, TransactionFilter},
};

/// Create the transaction table.
///
/// # Errors
/// Returns an error if the table or index could not be created.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            amount TEXT NOT NULL,
            type TEXT NOT NULL CHECK (type IN ('INCOME', 'EXPENSE')),
            category_id INTEGER NOT NULL,
            payment_method TEXT NOT NULL,
            date TEXT NOT NULL,
            note TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(category_id, user_id) REFERENCES category(id, user_id)
                ON UPDATE CASCADE ON DELETE RESTRICT
        );

        CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);
        CREATE INDEX IF NOT EXISTS idx_transaction_category ON \"transaction\"(category_id);",
    )?;

    Ok(())
}

const TRANSACTION_COLUMNS: &str =
    "id, amount, type, category_id, payment_method, date, note, created_at";

/// Insert a transaction for `user_id`.
///
/// # Errors
/// Returns a [Error::SqlError] if the transaction could not be inserted.
pub fn insert_transaction(
    user_id: UserId,
    fields: TransactionFields,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection.execute(
        "INSERT INTO \"transaction\"
            (user_id, amount, type, category_id, payment_method, date, note, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        (
            user_id,
            fields.amount,
            fields.transaction_type,
            fields.category_id,
            fields.payment_method,
            fields.date,
            fields.note.as_deref(),
            created_at,
        ),
    )?;

    let id = TransactionId::new(connection.last_insert_rowid());

    Ok(Transaction {
        id,
        amount: fields.amount,
        transaction_type: fields.transaction_type,
        category_id: fields.category_id,
        payment_method: fields.payment_method,
        date: fields.date,
        note: fields.note,
        created_at,
    })
}

/// Retrieve a transaction owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the transaction does not exist or belongs to another user.
pub fn get_transaction(
    user_id: UserId,
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = ?1 AND user_id = ?2"
        ))?
        .query_row((transaction_id, user_id), map_transaction_row)
        .map_err(|error| error.into())
}

/// Overwrite every field of a transaction owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the transaction does not exist or belongs to another user.
pub fn update_transaction(
    user_id: UserId,
    transaction_id: TransactionId,
    fields: &TransactionFields,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE \"transaction\" SET
            amount = ?1, type = ?2, category_id = ?3, payment_method = ?4, date = ?5, note = ?6
         WHERE id = ?7 AND user_id = ?8",
        (
            fields.amount,
            fields.transaction_type,
            fields.category_id,
            fields.payment_method,
            fields.date,
            fields.note.as_deref(),
            transaction_id,
            user_id,
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete a transaction owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the transaction does not exist or belongs to another user.
pub fn delete_transaction(
    user_id: UserId,
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        (transaction_id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Get the transactions of `user_id` that match `filter`.
///
/// Sorted by date, newest first, and then by ID so that transactions on the
/// same day stay in the order they were created.
///
/// # Errors
/// Returns [Error::SqlError] if the query or row mapping fails.
pub fn list_transactions(
    user_id: UserId,
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut conditions = vec!["user_id = ?"];
    let mut parameters: Vec<&dyn ToSql> = vec![&user_id];

    if let Some(from) = &filter.from {
        conditions.push("date >= ?");
        parameters.push(from);
    }
    if let Some(to) = &filter.to {
        conditions.push("date <= ?");
        parameters.push(to);
    }
    if let Some(category_id) = &filter.category_id {
        conditions.push("category_id = ?");
        parameters.push(category_id);
    }
    if let Some(transaction_type) = &filter.transaction_type {
        conditions.push("type = ?");
        parameters.push(transaction_type);
    }

    let query = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE {} ORDER BY date DESC, id ASC",
        conditions.join(" AND ")
    );

    connection
        .prepare(&query)?
        .query_map(params_from_iter(parameters), map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Map a database row to a [Transaction].
///
/// Expects the columns in the order of `TRANSACTION_COLUMNS`.
fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let amount: Amount = row.get(1)?;

    Ok(Transaction {
        id: row.get(0)?,
        amount,
        transaction_type: row.get(2)?,
        category_id: row.get(3)?,
        payment_method: row.get(4)?,
        date: row.get(5)?,
        note: row.get(6)?,
        created_at: row.get(7)?,
    })
}

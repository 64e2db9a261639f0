/*! Creates the application's database schema. */

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{
    Error,
    auth::{create_session_table, create_user_table},
    category::create_category_table,
    transaction::create_transaction_table,
};

/// Create the all of the database tables for the application.
///
/// Foreign key enforcement is switched on for `connection`, the category and
/// ledger tables rely on it for referential integrity.
///
/// # Errors
/// This function may return a [Error::SqlError] if something went wrong creating the tables.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_session_table(&transaction)?;
    create_category_table(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

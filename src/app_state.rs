//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use rusqlite::Connection;

use crate::{Error, auth::SessionConfig, db::initialize};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// How long sessions last and whether they are renewed on use.
    pub session_config: SessionConfig,

    /// The bcrypt cost used when hashing new passwords.
    pub password_cost: u32,

    /// The database connection.
    ///
    /// Every operation holds the lock for its whole unit of work, which
    /// serializes writes and keeps readers from seeing partial writes.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        session_config: SessionConfig,
        password_cost: u32,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            session_config,
            password_cost,
            db_connection: Arc::new(Mutex::new(db_connection)),
        })
    }
}

/// The state needed by the category, ledger and summary endpoints.
#[derive(Debug, Clone)]
pub struct LedgerState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LedgerState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

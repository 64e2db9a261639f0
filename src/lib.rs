//! Expense Ledger is a multi-tenant personal finance service.
//!
//! Users record income and expense transactions under their own categories
//! and ask for monthly totals measured against a budget. Every user's data is
//! private and every ledger route requires a bearer session token.
//!
//! This library provides the JSON REST API, the SQLite schema and the
//! domain logic behind it.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod app_state;
mod auth;
mod category;
mod database_id;
mod db;
mod endpoints;
mod error;
mod logging;
mod money;
mod routing;
mod summary;
mod transaction;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use auth::{
    Email, PasswordHash, SessionConfig, User, ValidatedPassword, get_user_by_email,
    revoke_user_sessions, set_user_disabled, update_password,
};
pub use database_id::UserId;
pub use db::initialize as initialize_db;
pub use error::{Error, ErrorKind};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("Could not install the Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(error) => {
                tracing::error!("Could not install the terminate signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

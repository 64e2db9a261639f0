//! Registration of new users.

use std::sync::Mutex;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    Error,
    auth::{
        AuthState, CurrencyCode, Email, NewUser, PasswordHash, Session, SessionConfig, UserName,
        ValidatedPassword, create_user, issue_session, validate_monthly_budget,
    },
    money::DecimalInput,
};

/// The body of a registration request.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// The name shown to the user.
    pub name: String,
    /// The email address the user will log in with.
    pub email: String,
    /// The raw password, checked for strength before hashing.
    pub password: String,
    /// The code of the display currency, e.g. "NZD".
    pub currency: String,
    /// How much the user plans to spend each month, zero if omitted.
    #[serde(default)]
    pub monthly_budget: Option<DecimalInput>,
}

/// Create a new user and log them in.
///
/// The password is validated and hashed before the database lock is taken,
/// the user and their first session are then written in one transaction.
///
/// # Errors
///
/// Returns a validation error if any field is malformed or the password is
/// too weak, [Error::DuplicateEmail] if the email is already registered, or
/// an internal error if the password could not be hashed or stored.
pub fn register(
    request: RegisterRequest,
    password_cost: u32,
    session_config: &SessionConfig,
    connection: &Mutex<Connection>,
) -> Result<Session, Error> {
    let name = UserName::new(&request.name)?;
    let email = Email::new(&request.email)?;
    let currency = CurrencyCode::new(&request.currency)?;
    let monthly_budget = match request.monthly_budget {
        Some(budget) => validate_monthly_budget(Decimal::try_from(budget)?)?,
        None => Decimal::ZERO,
    };
    let password = ValidatedPassword::new(&request.password, &[email.as_ref(), name.as_ref()])?;
    let password_hash = PasswordHash::new(password, password_cost)?;

    let now = OffsetDateTime::now_utc();
    let mut connection = connection.lock().map_err(|_| Error::DatabaseLockError)?;
    let transaction = connection.transaction()?;

    let user = create_user(
        NewUser {
            name,
            email,
            password_hash,
            currency,
            monthly_budget,
        },
        now,
        &transaction,
    )?;
    let session = issue_session(user.id, session_config, now, &transaction)?;

    transaction.commit()?;
    tracing::info!("Registered user {}", user.id);

    Ok(session)
}

/// Handler for registration requests via the POST method.
///
/// Responds with 201 and the new session on success.
pub async fn register_user(
    State(state): State<AuthState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Session>), Error> {
    let Json(request) = payload?;

    register(
        request,
        state.password_cost,
        &state.session_config,
        &state.db_connection,
    )
    .map(|session| (StatusCode::CREATED, Json(session)))
}

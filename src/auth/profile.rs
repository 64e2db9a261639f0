//! Viewing and editing the authenticated user's profile and password.

use std::sync::Mutex;

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    auth::{
        AuthState, CurrencyCode, Email, PasswordHash, ProfileUpdate, Session, SessionConfig, User,
        UserIdentity, UserName, ValidatedPassword, get_user_by_id, issue_session,
        revoke_user_sessions, update_password, update_profile, validate_monthly_budget,
    },
    database_id::UserId,
    money::DecimalInput,
};

/// The public view of a user. The password hash is never exposed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: UserId,
    pub name: UserName,
    pub email: Email,
    pub currency: CurrencyCode,
    pub monthly_budget: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for Profile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            currency: user.currency,
            monthly_budget: user.monthly_budget,
            created_at: user.created_at,
        }
    }
}

/// A partial profile update. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    pub name: Option<String>,
    pub currency: Option<String>,
    pub monthly_budget: Option<DecimalInput>,
}

impl TryFrom<ProfileUpdateRequest> for ProfileUpdate {
    type Error = Error;

    fn try_from(request: ProfileUpdateRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            name: request.name.as_deref().map(UserName::new).transpose()?,
            currency: request.currency.as_deref().map(CurrencyCode::new).transpose()?,
            monthly_budget: request
                .monthly_budget
                .map(|budget| Decimal::try_from(budget).and_then(validate_monthly_budget))
                .transpose()?,
        })
    }
}

/// The body of a password change request.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Get the profile of the authenticated user.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user no longer exists, or an internal error.
pub fn get_profile(user_id: UserId, connection: &Connection) -> Result<Profile, Error> {
    get_user_by_id(user_id, connection).map(Profile::from)
}

/// Replace the user's password after checking the current one.
///
/// Every existing session of the user is revoked and a fresh one is issued,
/// so other devices are logged out.
///
/// # Errors
///
/// Returns [Error::InvalidCredentials] if `current_password` is wrong,
/// [Error::TooWeak] if the new password is too weak, or an internal error.
pub fn change_password(
    user_id: UserId,
    request: &ChangePasswordRequest,
    password_cost: u32,
    session_config: &SessionConfig,
    connection: &Mutex<Connection>,
) -> Result<Session, Error> {
    let user = {
        let connection = connection.lock().map_err(|_| Error::DatabaseLockError)?;
        get_user_by_id(user_id, &connection)?
    };

    if !user.password_hash.verify(&request.current_password)? {
        return Err(Error::InvalidCredentials);
    }

    let password = ValidatedPassword::new(
        &request.new_password,
        &[user.email.as_ref(), user.name.as_ref()],
    )?;
    let password_hash = PasswordHash::new(password, password_cost)?;

    let mut connection = connection.lock().map_err(|_| Error::DatabaseLockError)?;
    let transaction = connection.transaction()?;
    update_password(user_id, &password_hash, &transaction)?;
    let revoked = revoke_user_sessions(user_id, &transaction)?;
    let session = issue_session(
        user_id,
        session_config,
        OffsetDateTime::now_utc(),
        &transaction,
    )?;
    transaction.commit()?;

    tracing::info!("Changed password for user {user_id}, revoked {revoked} sessions");

    Ok(session)
}

/// Handler for GET requests for the user's profile.
pub async fn get_profile_endpoint(
    State(state): State<AuthState>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<Json<Profile>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_profile(identity.user_id, &connection).map(Json)
}

/// Handler for PUT requests that update the user's profile.
pub async fn put_profile(
    State(state): State<AuthState>,
    Extension(identity): Extension<UserIdentity>,
    payload: Result<Json<ProfileUpdateRequest>, JsonRejection>,
) -> Result<Json<Profile>, Error> {
    let Json(request) = payload?;
    let update = ProfileUpdate::try_from(request)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    update_profile(identity.user_id, update, &connection)
        .map(Profile::from)
        .map(Json)
}

/// Handler for PUT requests that change the user's password.
///
/// Responds with the new session, the token used for the request is revoked.
pub async fn put_password(
    State(state): State<AuthState>,
    Extension(identity): Extension<UserIdentity>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<Session>, Error> {
    let Json(request) = payload?;

    change_password(
        identity.user_id,
        &request,
        state.password_cost,
        &state.session_config,
        &state.db_connection,
    )
    .map(Json)
}

//! Authentication middleware that resolves the bearer token of a request to a user.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use rusqlite::Connection;
use time::OffsetDateTime;
use tracing::Instrument;

use crate::{
    AppState, Error,
    auth::{SessionConfig, SessionToken, UserIdentity, validate_session},
};

/// The state needed for registering, logging in and checking sessions.
#[derive(Debug, Clone)]
pub struct AuthState {
    /// How long sessions last and whether they are renewed on use.
    pub session_config: SessionConfig,
    /// The bcrypt cost used when hashing new passwords.
    pub password_cost: u32,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            session_config: state.session_config,
            password_cost: state.password_cost,
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Middleware function that checks for a valid bearer token.
///
/// The [UserIdentity] and the [SessionToken] are placed into the request
/// extensions and the request is executed normally if the token is valid,
/// otherwise a 401 response is returned.
///
/// The rest of the request runs inside a span carrying the user ID, so that
/// errors logged further down can be traced back to the user.
///
/// **Note**: Route handlers can use the function argument
/// `Extension(identity): Extension<UserIdentity>` to receive the identity.
pub async fn auth_guard(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Error> {
    let token = get_bearer_token(request.headers())?;
    let identity = authenticate(&state, &token)?;

    let span = tracing::info_span!("authenticated", user_id = %identity.user_id);
    request.extensions_mut().insert(identity);
    request.extensions_mut().insert(token);

    Ok(next.run(request).instrument(span).await)
}

fn get_bearer_token(headers: &HeaderMap) -> Result<SessionToken, Error> {
    let Authorization(bearer) = headers
        .typed_get::<Authorization<Bearer>>()
        .ok_or(Error::InvalidSession)?;

    SessionToken::parse(bearer.token())
}

fn authenticate(state: &AuthState, token: &SessionToken) -> Result<UserIdentity, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    validate_session(
        token,
        &state.session_config,
        OffsetDateTime::now_utc(),
        &connection,
    )
}

//! Log-out requests.

use axum::{Extension, extract::State, http::StatusCode};

use crate::{
    Error,
    auth::{AuthState, SessionToken, revoke_session},
};

/// Invalidate the session the request was made with.
///
/// Must be routed behind [crate::auth::auth_guard], which provides the token.
pub async fn post_log_out(
    State(state): State<AuthState>,
    Extension(token): Extension<SessionToken>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    revoke_session(&token, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

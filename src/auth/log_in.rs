//! Log-in requests: checking credentials and issuing sessions.

use std::sync::Mutex;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use rusqlite::Connection;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    Error,
    auth::{
        AuthState, Email, PasswordHash, Session, SessionConfig, get_user_by_email, issue_session,
        purge_expired_sessions,
    },
};

/// Verified against when the email is unknown, so that unknown emails take
/// as long to reject as wrong passwords.
const UNKNOWN_USER_HASH: &str = "$2b$12$Gwf0uvxH3L7JLfo0CC/NCOoijK2vQ/wbgP.LeNup8vj6gg31IiFkm";

/// The body of a log-in request.
#[derive(Deserialize)]
pub struct LogInRequest {
    /// Email entered during log-in.
    pub email: String,
    /// Password entered during log-in.
    pub password: String,
}

/// Check the user's credentials and issue a new session.
///
/// The user's expired sessions are purged at the same time.
///
/// # Errors
///
/// Returns [Error::InvalidCredentials] for an unknown email, a wrong
/// password or a disabled user alike, or an internal error if the password
/// could not be verified.
pub fn log_in(
    request: &LogInRequest,
    session_config: &SessionConfig,
    connection: &Mutex<Connection>,
) -> Result<Session, Error> {
    let email = Email::new(&request.email).map_err(|_| Error::InvalidCredentials)?;

    let user = {
        let connection = connection.lock().map_err(|_| Error::DatabaseLockError)?;
        get_user_by_email(&email, &connection)
    };

    let user = match user {
        Ok(user) => user,
        Err(Error::NotFound) => {
            PasswordHash::new_unchecked(UNKNOWN_USER_HASH).verify(&request.password)?;
            return Err(Error::InvalidCredentials);
        }
        Err(error) => return Err(error),
    };

    // The database lock is not held while verifying, bcrypt is slow on purpose.
    if !user.password_hash.verify(&request.password)? || user.disabled {
        tracing::info!("Failed log-in attempt for user {}", user.id);
        return Err(Error::InvalidCredentials);
    }

    let now = OffsetDateTime::now_utc();
    let connection = connection.lock().map_err(|_| Error::DatabaseLockError)?;
    let purged = purge_expired_sessions(user.id, now, &connection)?;
    if purged > 0 {
        tracing::debug!("Purged {purged} expired sessions for user {}", user.id);
    }

    issue_session(user.id, session_config, now, &connection)
}

/// Handler for log-in requests via the POST method.
///
/// On success the new session is returned, otherwise a 401 response.
pub async fn post_log_in(
    State(state): State<AuthState>,
    payload: Result<Json<LogInRequest>, JsonRejection>,
) -> Result<Json<Session>, Error> {
    let Json(request) = payload?;

    log_in(&request, &state.session_config, &state.db_connection).map(Json)
}

#[cfg(test)]
mod log_in_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, http::StatusCode, routing::post};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{
        Error,
        auth::{
            AuthState, LogInRequest, RegisterRequest, SessionConfig, get_user_by_id, log_in,
            post_log_in, register, set_user_disabled,
        },
        db::initialize,
        endpoints,
    };

    const PASSWORD: &str = "averysafeandsecurepassword";

    fn get_registered_connection() -> Mutex<Connection> {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let connection = Mutex::new(connection);

        register(
            RegisterRequest {
                name: "Alice".to_owned(),
                email: "alice@example.com".to_owned(),
                password: PASSWORD.to_owned(),
                currency: "USD".to_owned(),
                monthly_budget: None,
            },
            4,
            &SessionConfig::default(),
            &connection,
        )
        .unwrap();

        connection
    }

    fn credentials(email: &str, password: &str) -> LogInRequest {
        LogInRequest {
            email: email.to_owned(),
            password: password.to_owned(),
        }
    }

    #[test]
    fn log_in_succeeds_with_valid_credentials() {
        let connection = get_registered_connection();

        let session = log_in(
            &credentials("alice@example.com", PASSWORD),
            &SessionConfig::default(),
            &connection,
        )
        .unwrap();

        let connection = connection.lock().unwrap();
        let user = get_user_by_id(session.user_id, &connection).unwrap();
        assert_eq!(user.email.as_ref(), "alice@example.com");
    }

    #[test]
    fn log_in_ignores_email_case() {
        let connection = get_registered_connection();

        let result = log_in(
            &credentials("Alice@Example.COM", PASSWORD),
            &SessionConfig::default(),
            &connection,
        );

        assert!(result.is_ok());
    }

    #[test]
    fn wrong_password_and_unknown_email_fail_identically() {
        let connection = get_registered_connection();
        let config = SessionConfig::default();

        let wrong_password = log_in(
            &credentials("alice@example.com", "notthepassword"),
            &config,
            &connection,
        );
        let unknown_email = log_in(&credentials("bob@example.com", PASSWORD), &config, &connection);

        assert_eq!(wrong_password, Err(Error::InvalidCredentials));
        assert_eq!(unknown_email, Err(Error::InvalidCredentials));
    }

    #[test]
    fn log_in_fails_for_disabled_user() {
        let connection = get_registered_connection();
        let config = SessionConfig::default();
        let session = log_in(&credentials("alice@example.com", PASSWORD), &config, &connection)
            .unwrap();
        set_user_disabled(session.user_id, true, &connection.lock().unwrap()).unwrap();

        let result = log_in(&credentials("alice@example.com", PASSWORD), &config, &connection);

        assert_eq!(result, Err(Error::InvalidCredentials));
    }

    fn get_test_server() -> TestServer {
        let state = AuthState {
            session_config: SessionConfig::default(),
            password_cost: 4,
            db_connection: Arc::new(get_registered_connection()),
        };
        let app = Router::new()
            .route(endpoints::LOG_IN, post(post_log_in))
            .with_state(state);

        TestServer::try_new(app).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn post_log_in_succeeds_with_valid_credentials() {
        let server = get_test_server();

        server
            .post(endpoints::LOG_IN)
            .json(&json!({
                "email": "alice@example.com",
                "password": PASSWORD,
            }))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn post_log_in_fails_with_wrong_password() {
        let server = get_test_server();

        server
            .post(endpoints::LOG_IN)
            .json(&json!({
                "email": "alice@example.com",
                "password": "wrongpassword",
            }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn post_log_in_fails_with_missing_credentials() {
        let server = get_test_server();

        server
            .post(endpoints::LOG_IN)
            .content_type("application/json")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}

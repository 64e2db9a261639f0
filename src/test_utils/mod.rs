//! Helpers for testing the API end to end through [build_router].

use axum::http::StatusCode;
use axum_test::TestServer;
use rusqlite::Connection;
use serde_json::{Value, json};

use crate::{AppState, auth::SessionConfig, build_router, endpoints};

/// A password that passes the strength check.
pub(crate) const TEST_PASSWORD: &str = "averysafeandsecurepassword";

/// A server over the full router and a fresh in-memory database.
///
/// Passwords are hashed with the lowest bcrypt cost to keep tests fast.
pub(crate) fn get_test_server() -> TestServer {
    let connection = Connection::open_in_memory().expect("Could not open in-memory database");
    let state = AppState::new(connection, SessionConfig::default(), 4)
        .expect("Could not create app state");

    TestServer::try_new(build_router(state)).expect("Could not create test server.")
}

/// Register a user with a monthly budget of 1000 and return their session token.
pub(crate) async fn register_test_user(server: &TestServer, email: &str) -> String {
    let response = server
        .post(endpoints::REGISTER)
        .json(&json!({
            "name": "Test User",
            "email": email,
            "password": TEST_PASSWORD,
            "currency": "NZD",
            "monthlyBudget": "1000",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    response.json::<Value>()["token"]
        .as_str()
        .expect("Registration response has no token")
        .to_owned()
}

/// Create a category as the user holding `token` and return its ID.
pub(crate) async fn create_test_category(
    server: &TestServer,
    token: &str,
    name: &str,
    category_type: &str,
) -> String {
    let response = server
        .post(endpoints::CATEGORIES)
        .authorization_bearer(token)
        .json(&json!({ "name": name, "type": category_type }))
        .await;
    response.assert_status(StatusCode::CREATED);

    response.json::<Value>()["id"]
        .as_str()
        .expect("Category response has no ID")
        .to_owned()
}

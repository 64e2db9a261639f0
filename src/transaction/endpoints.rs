//! HTTP handlers for the ledger.

use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use time::OffsetDateTime;

use crate::{
    Error,
    app_state::LedgerState,
    auth::UserIdentity,
    database_id::TransactionId,
    transaction::{
        Transaction, TransactionPatch, TransactionQuery, TransactionRequest, add_transaction,
        delete_transaction, edit_transaction, find_transactions, get_transaction,
    },
};

/// Handler for listing the user's transactions, optionally filtered by the query string.
pub async fn get_transactions_endpoint(
    State(state): State<LedgerState>,
    Extension(identity): Extension<UserIdentity>,
    query: Result<Query<TransactionQuery>, QueryRejection>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let Query(query) = query?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    find_transactions(identity.user_id, query, &connection).map(Json)
}

/// Handler for recording a transaction, responds with 201 and the new transaction.
pub async fn create_transaction_endpoint(
    State(state): State<LedgerState>,
    Extension(identity): Extension<UserIdentity>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let Json(request) = payload?;
    let mut connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let transaction = add_transaction(
        identity.user_id,
        request,
        OffsetDateTime::now_utc().date(),
        &mut connection,
    )?;
    tracing::info!("Recorded transaction {}", transaction.id);

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Handler for fetching one of the user's transactions.
pub async fn get_transaction_endpoint(
    State(state): State<LedgerState>,
    Extension(identity): Extension<UserIdentity>,
    Path(transaction_id): Path<String>,
) -> Result<Json<Transaction>, Error> {
    let transaction_id: TransactionId = transaction_id.parse()?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_transaction(identity.user_id, transaction_id, &connection).map(Json)
}

/// Handler for editing a transaction with the fields present in the body.
pub async fn update_transaction_endpoint(
    State(state): State<LedgerState>,
    Extension(identity): Extension<UserIdentity>,
    Path(transaction_id): Path<String>,
    payload: Result<Json<TransactionPatch>, JsonRejection>,
) -> Result<Json<Transaction>, Error> {
    let transaction_id: TransactionId = transaction_id.parse()?;
    let Json(patch) = payload?;
    let mut connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let transaction = edit_transaction(
        identity.user_id,
        transaction_id,
        patch,
        OffsetDateTime::now_utc().date(),
        &mut connection,
    )?;
    tracing::info!("Edited transaction {transaction_id}");

    Ok(Json(transaction))
}

/// Handler for deleting a transaction.
pub async fn delete_transaction_endpoint(
    State(state): State<LedgerState>,
    Extension(identity): Extension<UserIdentity>,
    Path(transaction_id): Path<String>,
) -> Result<StatusCode, Error> {
    let transaction_id: TransactionId = transaction_id.parse()?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    delete_transaction(identity.user_id, transaction_id, &connection)?;
    tracing::info!("Deleted transaction {transaction_id}");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod transaction_endpoint_tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use crate::{
        endpoints::{self, format_endpoint},
        test_utils::{create_test_category, get_test_server, register_test_user},
    };

    async fn record(
        server: &TestServer,
        token: &str,
        category_id: &str,
        category_type: &str,
        amount: &str,
        date: &str,
    ) -> Value {
        let response = server
            .post(endpoints::EXPENSES)
            .authorization_bearer(token)
            .json(&json!({
                "amount": amount,
                "categoryId": category_id,
                "type": category_type,
                "paymentMethod": "CARD",
                "date": date,
                "note": "test",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);

        response.json::<Value>()
    }

    #[tokio::test]
    async fn create_and_get_transaction() {
        let server = get_test_server();
        let token = register_test_user(&server, "foo@bar.baz").await;
        let groceries = create_test_category(&server, &token, "Groceries", "EXPENSE").await;

        let created = record(&server, &token, &groceries, "EXPENSE", "12.50", "2024-05-10").await;

        assert_eq!(created["amount"], "12.50");
        assert_eq!(created["categoryId"], groceries.as_str());
        assert_eq!(created["date"], "2024-05-10");
        let id = created["id"].as_str().unwrap();
        let fetched = server
            .get(&format_endpoint(endpoints::EXPENSE, id))
            .authorization_bearer(&token)
            .await
            .json::<Value>();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn create_rejects_invalid_input() {
        let server = get_test_server();
        let token = register_test_user(&server, "foo@bar.baz").await;
        let groceries = create_test_category(&server, &token, "Groceries", "EXPENSE").await;
        let body = |amount: Value, date: &str| {
            json!({
                "amount": amount,
                "categoryId": groceries,
                "type": "EXPENSE",
                "paymentMethod": "CARD",
                "date": date,
            })
        };

        for invalid in [
            body(json!("0"), "2024-05-10"),
            body(json!("-5"), "2024-05-10"),
            body(json!(12.5), "2024-05-10"),
            body(json!("abc"), "2024-05-10"),
            body(json!("1000000000000000.01"), "2024-05-10"),
            body(json!("5"), "10/05/2024"),
            body(json!("5"), "2999-01-01"),
        ] {
            server
                .post(endpoints::EXPENSES)
                .authorization_bearer(&token)
                .json(&invalid)
                .await
                .assert_status(StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn create_with_mismatched_type_is_conflict() {
        let server = get_test_server();
        let token = register_test_user(&server, "foo@bar.baz").await;
        let groceries = create_test_category(&server, &token, "Groceries", "EXPENSE").await;

        server
            .post(endpoints::EXPENSES)
            .authorization_bearer(&token)
            .json(&json!({
                "amount": "5",
                "categoryId": groceries,
                "type": "INCOME",
                "paymentMethod": "CASH",
                "date": "2024-05-10",
            }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn create_with_other_users_category_is_not_found() {
        let server = get_test_server();
        let owner = register_test_user(&server, "owner@bar.baz").await;
        let intruder = register_test_user(&server, "intruder@bar.baz").await;
        let groceries = create_test_category(&server, &owner, "Groceries", "EXPENSE").await;

        server
            .post(endpoints::EXPENSES)
            .authorization_bearer(&intruder)
            .json(&json!({
                "amount": "5",
                "categoryId": groceries,
                "type": "EXPENSE",
                "paymentMethod": "CASH",
                "date": "2024-05-10",
            }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_filters_by_month_and_type() {
        let server = get_test_server();
        let token = register_test_user(&server, "foo@bar.baz").await;
        let groceries = create_test_category(&server, &token, "Groceries", "EXPENSE").await;
        let salary = create_test_category(&server, &token, "Salary", "INCOME").await;
        record(&server, &token, &groceries, "EXPENSE", "10", "2024-04-30").await;
        let may_expense = record(&server, &token, &groceries, "EXPENSE", "20", "2024-05-01").await;
        let may_income = record(&server, &token, &salary, "INCOME", "3000", "2024-05-15").await;

        let may = server
            .get(endpoints::EXPENSES)
            .authorization_bearer(&token)
            .add_query_params([("year", "2024"), ("month", "5")])
            .await
            .json::<Value>();
        assert_eq!(may, json!([may_income, may_expense]));

        let may_expenses = server
            .get(endpoints::EXPENSES)
            .authorization_bearer(&token)
            .add_query_params([("year", "2024"), ("month", "5"), ("type", "EXPENSE")])
            .await
            .json::<Value>();
        assert_eq!(may_expenses, json!([may_expense]));
    }

    #[tokio::test]
    async fn list_rejects_invalid_filters() {
        let server = get_test_server();
        let token = register_test_user(&server, "foo@bar.baz").await;

        for params in [
            vec![("from", "2024-06-01"), ("to", "2024-05-01")],
            vec![("year", "2024")],
            vec![("year", "2024"), ("month", "13")],
            vec![("from", "yesterday")],
            vec![("type", "SPENDING")],
            vec![("categoryId", "abc")],
        ] {
            server
                .get(endpoints::EXPENSES)
                .authorization_bearer(&token)
                .add_query_params(params)
                .await
                .assert_status(StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let server = get_test_server();
        let token = register_test_user(&server, "foo@bar.baz").await;
        let groceries = create_test_category(&server, &token, "Groceries", "EXPENSE").await;
        let created = record(&server, &token, &groceries, "EXPENSE", "10", "2024-05-01").await;
        let path = format_endpoint(endpoints::EXPENSE, created["id"].as_str().unwrap());

        let response = server
            .put(&path)
            .authorization_bearer(&token)
            .json(&json!({ "amount": "11.00", "note": "" }))
            .await;

        response.assert_status_ok();
        let updated = response.json::<Value>();
        assert_eq!(updated["amount"], "11.00");
        assert_eq!(updated["note"], Value::Null);
        assert_eq!(updated["date"], created["date"]);
        assert_eq!(updated["createdAt"], created["createdAt"]);
    }

    #[tokio::test]
    async fn update_rejects_mismatched_category() {
        let server = get_test_server();
        let token = register_test_user(&server, "foo@bar.baz").await;
        let groceries = create_test_category(&server, &token, "Groceries", "EXPENSE").await;
        let salary = create_test_category(&server, &token, "Salary", "INCOME").await;
        let created = record(&server, &token, &groceries, "EXPENSE", "10", "2024-05-01").await;
        let path = format_endpoint(endpoints::EXPENSE, created["id"].as_str().unwrap());

        server
            .put(&path)
            .authorization_bearer(&token)
            .json(&json!({ "categoryId": salary }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn update_rejects_invalid_amount_and_date() {
        let server = get_test_server();
        let token = register_test_user(&server, "foo@bar.baz").await;
        let groceries = create_test_category(&server, &token, "Groceries", "EXPENSE").await;
        let created = record(&server, &token, &groceries, "EXPENSE", "10", "2024-05-01").await;
        let path = format_endpoint(endpoints::EXPENSE, created["id"].as_str().unwrap());

        for patch in [
            json!({ "amount": "0" }),
            json!({ "amount": "-5" }),
            json!({ "date": "10/05/2024" }),
            json!({ "date": "9999-01-01" }),
        ] {
            server
                .put(&path)
                .authorization_bearer(&token)
                .json(&patch)
                .await
                .assert_status(StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn delete_removes_transaction() {
        let server = get_test_server();
        let token = register_test_user(&server, "foo@bar.baz").await;
        let groceries = create_test_category(&server, &token, "Groceries", "EXPENSE").await;
        let created = record(&server, &token, &groceries, "EXPENSE", "10", "2024-05-01").await;
        let path = format_endpoint(endpoints::EXPENSE, created["id"].as_str().unwrap());

        server
            .delete(&path)
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .delete(&path)
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_users_transaction_is_not_found() {
        let server = get_test_server();
        let owner = register_test_user(&server, "owner@bar.baz").await;
        let intruder = register_test_user(&server, "intruder@bar.baz").await;
        let groceries = create_test_category(&server, &owner, "Groceries", "EXPENSE").await;
        let created = record(&server, &owner, &groceries, "EXPENSE", "10", "2024-05-01").await;
        let path = format_endpoint(endpoints::EXPENSE, created["id"].as_str().unwrap());

        server
            .get(&path)
            .authorization_bearer(&intruder)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .put(&path)
            .authorization_bearer(&intruder)
            .json(&json!({ "amount": "1" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .delete(&path)
            .authorization_bearer(&intruder)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        let listed = server
            .get(endpoints::EXPENSES)
            .authorization_bearer(&intruder)
            .await
            .json::<Value>();
        assert_eq!(listed, json!([]));
    }
}

//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::{
    AppState,
    auth::{
        auth_guard, get_profile_endpoint, post_log_in, post_log_out, put_password, put_profile,
        register_user,
    },
    category::{
        create_category_endpoint, delete_category_endpoint, get_categories_endpoint,
        get_category_endpoint,
    },
    endpoints,
    summary::get_monthly_summary_endpoint,
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        get_transactions_endpoint, update_transaction_endpoint,
    },
};

/// Return a router with all the app's routes.
///
/// Every route except registration and log in requires a valid bearer
/// session token.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::REGISTER, post(register_user))
        .route(endpoints::LOG_IN, post(post_log_in));

    let protected_routes = Router::new()
        .route(endpoints::LOG_OUT, post(post_log_out))
        .route(
            endpoints::PROFILE,
            get(get_profile_endpoint).put(put_profile),
        )
        .route(endpoints::PASSWORD, put(put_password))
        .route(
            endpoints::CATEGORIES,
            get(get_categories_endpoint).post(create_category_endpoint),
        )
        .route(
            endpoints::CATEGORY,
            get(get_category_endpoint).delete(delete_category_endpoint),
        )
        .route(
            endpoints::EXPENSES,
            get(get_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::MONTHLY_SUMMARY,
            get(get_monthly_summary_endpoint),
        )
        .route(
            endpoints::EXPENSE,
            get(get_transaction_endpoint)
                .put(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .with_state(state)
}

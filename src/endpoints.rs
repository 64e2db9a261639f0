//! The API endpoints URIs.

/// The route for registering a new user.
pub const REGISTER: &str = "/auth/register";
/// The route for logging in a user.
pub const LOG_IN: &str = "/auth/login";
/// The route for the client to end the current session.
pub const LOG_OUT: &str = "/auth/logout";

/// The route for reading and updating the current user's profile.
pub const PROFILE: &str = "/users/profile";
/// The route for changing the current user's password.
pub const PASSWORD: &str = "/users/password";

/// The route to list and create categories.
pub const CATEGORIES: &str = "/categories";
/// The route to access a single category.
pub const CATEGORY: &str = "/categories/{category_id}";

/// The route to list and create transactions.
pub const EXPENSES: &str = "/expenses";
/// The route to access a single transaction.
pub const EXPENSE: &str = "/expenses/{transaction_id}";
/// The route for the monthly summary of a user's transactions.
pub const MONTHLY_SUMMARY: &str = "/expenses/summary/monthly";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/categories/{category_id}', '{category_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
#[cfg(test)]
pub fn format_endpoint(endpoint_path: &str, id: impl std::fmt::Display) -> String {
    let param_start = match endpoint_path.find('{') {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|end| param_start + end + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

//! Defines the app level error type and its conversion to JSON responses.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use time::Date;

use crate::category::CategoryType;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request body or query string could not be parsed.
    ///
    /// The string is the parser's description of the problem.
    #[error("malformed request: {0}")]
    InvalidRequest(String),

    /// The string is not a valid email address.
    #[error("{0} is not a valid email address")]
    InvalidEmail(String),

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An empty string was used as a user's display name.
    #[error("name cannot be empty")]
    EmptyUserName,

    /// The currency code is not three ASCII letters, e.g. "NZD".
    #[error("\"{0}\" is not a valid currency code, expected three letters such as \"USD\"")]
    InvalidCurrency(String),

    /// A monthly budget below zero was given.
    #[error("the monthly budget cannot be negative")]
    NegativeBudget,

    /// An empty string was used to create a category name.
    #[error("category name cannot be empty")]
    EmptyCategoryName,

    /// The amount could not be parsed as an exact decimal number.
    #[error("\"{0}\" is not a valid amount, amounts must be decimal strings such as \"12.50\"")]
    InvalidAmount(String),

    /// A transaction amount of zero or less was given.
    ///
    /// Whether money was spent or earned is recorded by the transaction type,
    /// never by the sign of the amount.
    #[error("the amount must be greater than zero")]
    NonPositiveAmount,

    /// An amount or budget above [MAX_AMOUNT](crate::money::MAX_AMOUNT) was given.
    #[error("the amount must not be greater than {}", crate::money::MAX_AMOUNT)]
    AmountTooLarge,

    /// The date string is not an ISO calendar date (YYYY-MM-DD).
    #[error("\"{0}\" is not a valid date, expected YYYY-MM-DD")]
    InvalidDate(String),

    /// A date in the future was used to create a transaction.
    ///
    /// Transactions record events that have already happened, therefore future
    /// dates are not allowed.
    #[error("{0} is a date in the future, which is not allowed")]
    FutureDate(Date),

    /// A date range filter where the start is after the end.
    #[error("the start date {from} is after the end date {to}")]
    InvalidDateRange {
        /// The start of the range.
        from: Date,
        /// The end of the range.
        to: Date,
    },

    /// A year and month that do not form a calendar month.
    #[error("{year}-{month} is not a valid calendar month")]
    InvalidMonth {
        /// The requested year.
        year: i32,
        /// The requested month, expected to be in `1..=12`.
        month: u8,
    },

    /// Only one of year and month was given for a monthly filter.
    #[error("year and month must be given together")]
    IncompleteMonth,

    /// The email and password combination is not correct.
    ///
    /// Unknown emails and wrong passwords share this error so that clients
    /// cannot find out which emails are registered.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The session token is missing, malformed, expired or unknown.
    #[error("the session is invalid or has expired, log in again")]
    InvalidSession,

    /// The requested resource was not found.
    ///
    /// Resources owned by another user are also reported as not found so
    /// that the existence of other users' data is never revealed.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The email address is already registered.
    #[error("the email address is already registered")]
    DuplicateEmail,

    /// The user already has a category with the same name and type.
    #[error("a category with this name and type already exists")]
    DuplicateCategory,

    /// The category cannot be deleted while transactions reference it.
    #[error("the category is used by existing transactions")]
    CategoryInUse,

    /// The transaction type does not match the type of its category.
    #[error("cannot record a {transaction_type} transaction under a {category_type} category")]
    CategoryTypeMismatch {
        /// The type of the referenced category.
        category_type: CategoryType,
        /// The type given for the transaction.
        transaction_type: CategoryType,
    },

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// A sum of stored amounts does not fit in a decimal.
    #[error("a total overflowed")]
    TotalOverflow,
}

/// The broad classes of [Error] that API clients can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-range input, the client must fix the request.
    Validation,
    /// Missing, invalid or expired session, the client must log in again.
    Authentication,
    /// The referenced entity does not exist or is not owned by the caller.
    NotFound,
    /// A uniqueness or referential integrity rule would be violated.
    Conflict,
    /// A failure on the server, details are only logged.
    Internal,
}

impl Error {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidRequest(_)
            | Error::InvalidEmail(_)
            | Error::TooWeak(_)
            | Error::EmptyUserName
            | Error::InvalidCurrency(_)
            | Error::NegativeBudget
            | Error::EmptyCategoryName
            | Error::InvalidAmount(_)
            | Error::NonPositiveAmount
            | Error::AmountTooLarge
            | Error::InvalidDate(_)
            | Error::FutureDate(_)
            | Error::InvalidDateRange { .. }
            | Error::InvalidMonth { .. }
            | Error::IncompleteMonth => ErrorKind::Validation,
            Error::InvalidCredentials | Error::InvalidSession => ErrorKind::Authentication,
            Error::NotFound => ErrorKind::NotFound,
            Error::DuplicateEmail
            | Error::DuplicateCategory
            | Error::CategoryInUse
            | Error::CategoryTypeMismatch { .. } => ErrorKind::Conflict,
            Error::HashingError(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError
            | Error::TotalOverflow => ErrorKind::Internal,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                Some(ref desc),
            ) if desc.contains("user.email") => Error::DuplicateEmail,
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                Some(ref desc),
            ) if desc.contains("category.") => Error::DuplicateCategory,
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::CategoryInUse,
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match self.kind() {
            // Internal errors are not intended to be shown to the client.
            ErrorKind::Internal => {
                tracing::error!("An unexpected error occurred: {}", self);
                "An unexpected error occurred, check the server logs for more details.".to_owned()
            }
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod error_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::{Error, category::CategoryType, error::ErrorKind};

    #[test]
    fn kinds_map_to_distinct_status_codes() {
        let cases = [
            (Error::NonPositiveAmount, StatusCode::BAD_REQUEST),
            (Error::InvalidSession, StatusCode::UNAUTHORIZED),
            (Error::NotFound, StatusCode::NOT_FOUND),
            (Error::CategoryInUse, StatusCode::CONFLICT),
            (Error::DatabaseLockError, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, want_status) in cases {
            assert_eq!(error.into_response().status(), want_status);
        }
    }

    #[test]
    fn type_mismatch_is_conflict() {
        let error = Error::CategoryTypeMismatch {
            category_type: CategoryType::Income,
            transaction_type: CategoryType::Expense,
        };

        assert_eq!(error.kind(), ErrorKind::Conflict);
        assert_eq!(
            error.to_string(),
            "cannot record a EXPENSE transaction under a INCOME category"
        );
    }

    #[test]
    fn no_rows_is_not_found() {
        let error: Error = rusqlite::Error::QueryReturnedNoRows.into();

        assert_eq!(error, Error::NotFound);
    }

    #[tokio::test]
    async fn internal_error_hides_details() {
        let response = Error::HashingError("secret details".to_owned()).into_response();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8_lossy(&body);

        assert!(!body.contains("secret details"), "got body {body}");
    }
}

//! A validated email address used to identify users at log-in.

use std::{fmt::Display, str::FromStr};

use email_address::EmailAddress;
use serde::Serialize;

use crate::Error;

/// A syntactically valid email address, stored in lower case so that
/// "Foo@Bar.com" and "foo@bar.com" are the same account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Create and validate an email address.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidEmail] if `raw_email` is not a valid email address.
    pub fn new(raw_email: &str) -> Result<Self, Error> {
        let trimmed = raw_email.trim();

        EmailAddress::from_str(trimmed)
            .map(|email| Self(email.as_str().to_lowercase()))
            .map_err(|_| Error::InvalidEmail(raw_email.to_owned()))
    }

    /// Create a new `Email` without any validation.
    ///
    /// For emails coming from the user (e.g., via the REST API), this function should **not** be used, instead use the checked version.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if an incorrectly formatted email is provided it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(raw_email: &str) -> Self {
        Self(raw_email.to_owned())
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

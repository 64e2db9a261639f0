//! Session tokens: issuing them at log-in, validating them on every request
//! and revoking them at log-out or password change.
//!
//! A token is 32 random bytes encoded as hex. Only the SHA-256 digest of the
//! token is stored, so a leaked database cannot be replayed as sessions.

use std::fmt::Debug;

use rand::RngCore;
use rusqlite::{Connection, Row};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

use crate::{Error, database_id::UserId};

/// How long a session lasts if not configured otherwise.
pub const DEFAULT_SESSION_DURATION: Duration = Duration::hours(1);

const TOKEN_BYTES: usize = 32;

/// Controls the lifetime of sessions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// How long a newly issued session is valid for.
    pub duration: Duration,
    /// If set, a session validated with less than this much time left is
    /// extended by a full `duration`.
    pub renew_within: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_SESSION_DURATION,
            renew_within: None,
        }
    }
}

/// An opaque, unguessable bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);

        Self(to_hex(&bytes))
    }

    /// Check that `raw_token` looks like a token this server issued.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidSession] if `raw_token` is malformed.
    pub fn parse(raw_token: &str) -> Result<Self, Error> {
        let is_well_formed = raw_token.len() == TOKEN_BYTES * 2
            && raw_token
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));

        if is_well_formed {
            Ok(Self(raw_token.to_owned()))
        } else {
            Err(Error::InvalidSession)
        }
    }

    /// The token as sent to the client.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn digest(&self) -> String {
        to_hex(&Sha256::digest(self.0.as_bytes()))
    }
}

impl Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionToken").field(&"********").finish()
    }
}

impl Serialize for SessionToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// A time-bounded proof that the holder logged in as `user_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// The bearer token the client sends in the `Authorization` header.
    pub token: SessionToken,
    /// The user the session was issued to.
    pub user_id: UserId,
    /// When the session was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    /// When the session stops being valid.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// The identity a valid session resolves to.
///
/// Every category, ledger and summary operation is scoped to one of these.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserIdentity {
    /// The authenticated user.
    pub user_id: UserId,
    /// When the session backing this identity expires.
    pub expires_at: OffsetDateTime,
}

/// Create the session table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_session_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS session (
            token_hash TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            issued_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_session_user ON session(user_id);",
    )?;

    Ok(())
}

/// Issue a new session for `user_id`, valid from `now` for the configured duration.
///
/// # Errors
///
/// Returns a [Error::SqlError] if the session could not be stored.
pub fn issue_session(
    user_id: UserId,
    config: &SessionConfig,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Session, Error> {
    let token = SessionToken::generate();
    let issued_at = now.replace_nanosecond(0).unwrap_or(now);
    let expires_at = issued_at + config.duration;

    connection.execute(
        "INSERT INTO session (token_hash, user_id, issued_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        (
            token.digest(),
            user_id,
            issued_at.unix_timestamp(),
            expires_at.unix_timestamp(),
        ),
    )?;

    Ok(Session {
        token,
        user_id,
        issued_at,
        expires_at,
    })
}

/// Resolve `token` to the identity it was issued to.
///
/// The lookup does not modify anything unless `config.renew_within` is set
/// and the session is close to expiring, in which case it is extended.
///
/// # Errors
///
/// Returns [Error::InvalidSession] if the token is unknown, expired or
/// belongs to a disabled user, or a [Error::SqlError] if the
/// session could not be read.
pub fn validate_session(
    token: &SessionToken,
    config: &SessionConfig,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<UserIdentity, Error> {
    let token_hash = token.digest();

    let (user_id, expires_at, disabled) = connection
        .prepare(
            "SELECT session.user_id, session.expires_at, user.disabled FROM session
             INNER JOIN user ON user.id = session.user_id
             WHERE session.token_hash = :token_hash",
        )?
        .query_row(&[(":token_hash", &token_hash)], map_session_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::InvalidSession,
            error => error.into(),
        })?;

    if disabled || expires_at <= now {
        return Err(Error::InvalidSession);
    }

    let expires_at = match config.renew_within {
        Some(window) if expires_at - now < window => {
            let renewed = now.replace_nanosecond(0).unwrap_or(now) + config.duration;
            connection.execute(
                "UPDATE session SET expires_at = ?1 WHERE token_hash = ?2",
                (renewed.unix_timestamp(), &token_hash),
            )?;
            tracing::debug!("Renewed session for user {user_id} until {renewed}");
            renewed
        }
        _ => expires_at,
    };

    Ok(UserIdentity {
        user_id,
        expires_at,
    })
}

/// Invalidate a single session.
///
/// Revoking a session that does not exist is not an error.
///
/// # Errors
///
/// Returns a [Error::SqlError] if the session could not be deleted.
pub fn revoke_session(token: &SessionToken, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "DELETE FROM session WHERE token_hash = ?1",
        (token.digest(),),
    )?;

    Ok(())
}

/// Invalidate every session of `user_id`, e.g. after a password change.
///
/// # Errors
///
/// Returns a [Error::SqlError] if the sessions could not be deleted.
pub fn revoke_user_sessions(user_id: UserId, connection: &Connection) -> Result<usize, Error> {
    connection
        .execute("DELETE FROM session WHERE user_id = ?1", (user_id,))
        .map_err(|error| error.into())
}

/// Delete the sessions of `user_id` that expired at or before `now`.
///
/// # Errors
///
/// Returns a [Error::SqlError] if the sessions could not be deleted.
pub fn purge_expired_sessions(
    user_id: UserId,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<usize, Error> {
    connection
        .execute(
            "DELETE FROM session WHERE user_id = ?1 AND expires_at <= ?2",
            (user_id, now.unix_timestamp()),
        )
        .map_err(|error| error.into())
}

fn map_session_row(row: &Row) -> Result<(UserId, OffsetDateTime, bool), rusqlite::Error> {
    let user_id = row.get(0)?;
    let raw_expires_at: i64 = row.get(1)?;
    let expires_at = OffsetDateTime::from_unix_timestamp(raw_expires_at).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Integer,
            Box::new(error),
        )
    })?;
    let disabled = row.get(2)?;

    Ok((user_id, expires_at, disabled))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

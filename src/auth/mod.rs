//! User accounts, credentials and sessions.
//!
//! Every other part of the API sits behind [auth_guard], which resolves the
//! bearer token of a request to a [UserIdentity].

mod email;
mod log_in;
mod log_out;
mod middleware;
mod password;
mod profile;
mod register;
mod session;
mod user;

pub use email::Email;
pub use log_in::{LogInRequest, log_in, post_log_in};
pub use log_out::post_log_out;
pub use middleware::{AuthState, auth_guard};
pub use password::{PasswordHash, ValidatedPassword};
pub use profile::{
    ChangePasswordRequest, Profile, ProfileUpdateRequest, change_password, get_profile,
    get_profile_endpoint, put_password, put_profile,
};
pub use register::{RegisterRequest, register, register_user};
pub use session::{
    Session, SessionConfig, SessionToken, UserIdentity,
    create_session_table, issue_session, purge_expired_sessions, revoke_session,
    revoke_user_sessions, validate_session,
};
pub use user::{
    CurrencyCode, NewUser, ProfileUpdate, User, UserName, create_user,
    create_user_table, get_user_by_email, get_user_by_id, set_user_disabled, update_password,
    update_profile, validate_monthly_budget,
};

#[cfg(test)]
pub(crate) use user::test_utils::insert_test_user;

//! Session token format.
//!
//! A token is `[loginType_]md5(username)` followed by a random suffix. The
//! part before the suffix identifies the login and is used as a key prefix to
//! find every live session of that identity.

use md5::{Digest, Md5};
use rand::Rng;

/// Length of the random token suffix.
pub const TOKEN_SUFFIX_LENGTH: usize = 32;

/// Separator between the login type and the identity hash.
const LOGIN_TYPE_SEPARATOR: char = '_';

/// Build the identity prefix shared by all sessions of `username`.
pub fn identity_prefix(login_type: &str, username: &str) -> String {
    let hash = format!("{:x}", Md5::digest(username.as_bytes()));
    if login_type.is_empty() {
        hash
    } else {
        format!("{login_type}{LOGIN_TYPE_SEPARATOR}{hash}")
    }
}

/// Append a fresh random suffix to an identity prefix.
pub fn generate_token(prefix: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(TOKEN_SUFFIX_LENGTH)
        .map(char::from)
        .collect();
    format!("{prefix}{suffix}")
}

/// Recover the login type a token was issued for (empty when none).
///
/// Neither the hex hash nor the alphanumeric suffix contain the separator, so
/// anything before the first separator is the login type.
pub fn login_type_of(token: &str) -> &str {
    token
        .split_once(LOGIN_TYPE_SEPARATOR)
        .map_or("", |(login_type, _)| login_type)
}

/// Login types become part of the token, so they may not contain the separator.
pub fn is_valid_login_type(login_type: &str) -> bool {
    login_type
        .chars()
        .all(|c| c.is_ascii_alphanumeric() && c != LOGIN_TYPE_SEPARATOR)
}

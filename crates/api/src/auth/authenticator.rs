//! Username/password authentication with lockout accounting.

use std::sync::Arc;

use keystone_core::error::CoreError;
use keystone_core::lockout::{locked_error, LockPolicy};
use keystone_core::roles::STATE_ENABLED;
use keystone_core::types::unix_now;
use keystone_db::models::log::{NewAuditLog, LOG_STATE_FAILURE, LOG_STATE_SUCCESS, LOG_TYPE_LOGIN};
use keystone_db::models::user::UserView;

use super::lockout::LockoutEngine;
use super::password::verify_password;
use super::store::CredentialStore;
use crate::error::{AppError, AppResult};

const LOGIN_TITLE: &str = "User login";
const LOGIN_URL: &str = "/sys/login";

#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    lockout: LockoutEngine,
}

impl Authenticator {
    pub fn new(store: Arc<dyn CredentialStore>, lockout: LockoutEngine) -> Self {
        Self { store, lockout }
    }

    /// Check `username`/`password` from `ip`.
    ///
    /// An unknown username is charged to the IP counter only and produces the
    /// same message as a wrong password. Every attempt is written to the audit
    /// log.
    pub async fn authenticate(&self, ip: &str, username: &str, password: &str) -> AppResult<UserView> {
        let result = self.attempt(ip, username, password).await;
        let (state, info) = match &result {
            Ok(_) => (LOG_STATE_SUCCESS, "Login succeeded".to_string()),
            Err(AppError::Core(e)) => (LOG_STATE_FAILURE, e.to_string()),
            Err(_) => (LOG_STATE_FAILURE, "Login failed".to_string()),
        };
        let entry = NewAuditLog {
            ip: ip.to_string(),
            title: LOGIN_TITLE.to_string(),
            log_type: LOG_TYPE_LOGIN.to_string(),
            method: "POST".to_string(),
            url: LOGIN_URL.to_string(),
            info,
            state: state.to_string(),
            creator_id: Some(username.to_string()),
        };
        if let Err(e) = self.store.append_log(&entry).await {
            tracing::error!(error = %e, user = %username, "Failed to write login audit log");
        }
        result
    }

    async fn attempt(&self, ip: &str, username: &str, password: &str) -> AppResult<UserView> {
        let policy = LockPolicy::from_login_limit(self.store.safety_policy().await?.pwd_login_limit);
        let now = unix_now();

        let Some(credentials) = self.store.find_by_username(username).await? else {
            if let Some(secs) = self.lockout.check_locked(ip, now).await? {
                return Err(locked_error("IP", secs).into());
            }
            tracing::warn!(ip = %ip, "Login attempt for unknown user");
            let outcome = self.lockout.record_failure(None, ip, &policy, now).await?;
            return Err(outcome.into_error().into());
        };

        if let Some(secs) = self.lockout.check_locked(username, now).await? {
            return Err(locked_error("Account", secs).into());
        }

        if !verify_password(password, &credentials.password)? {
            tracing::warn!(user = %username, ip = %ip, "Wrong password");
            let outcome = self
                .lockout
                .record_failure(Some(username), ip, &policy, now)
                .await?;
            return Err(outcome.into_error().into());
        }

        self.lockout.clear(username, ip).await?;
        if credentials.user.state != STATE_ENABLED {
            return Err(CoreError::PermissionDenied("Account is disabled".into()).into());
        }
        tracing::info!(user = %username, ip = %ip, "Credentials accepted");
        Ok(credentials.user)
    }
}

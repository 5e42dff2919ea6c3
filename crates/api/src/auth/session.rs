//! Token-keyed sessions in the session cache.
//!
//! A session is the hash `login:<token>` with fields `user` (JSON snapshot),
//! `createTime` (Unix seconds) and `expire` (TTL seconds, `-1` for none).
//! Department data scopes are cached beside them under `dataScope:<deptId>`
//! and joined into the user when a session is resolved.

use std::sync::Arc;
use std::time::Duration;

use keystone_cache::{SessionCache, Ttl};
use keystone_core::error::CoreError;
use keystone_core::scope::DataScope;
use keystone_core::token::{generate_token, identity_prefix, is_valid_login_type, login_type_of};
use keystone_db::models::user::UserView;
use serde::{Deserialize, Serialize};

use super::store::CredentialStore;
use crate::config::SessionConfig;
use crate::error::{AppError, AppResult};

pub const SESSION_PREFIX: &str = "login:";
pub const DATA_SCOPE_PREFIX: &str = "dataScope:";

const FIELD_USER: &str = "user";
const FIELD_CREATE_TIME: &str = "createTime";
const FIELD_EXPIRE: &str = "expire";

/// `expire` value of a session that never times out.
pub const NEVER_EXPIRES: i64 = -1;

/// The logged-in user with their department scope joined in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(flatten)]
    pub user: UserView,
    #[serde(flatten)]
    pub scope: DataScope,
}

/// A resolved session.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
    /// Unix seconds at which the token was issued.
    pub created_at: i64,
    /// Configured TTL in seconds, [`NEVER_EXPIRES`] for persistent sessions.
    pub expire: i64,
}

#[derive(Clone)]
pub struct SessionManager {
    cache: Arc<dyn SessionCache>,
    store: Arc<dyn CredentialStore>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(
        cache: Arc<dyn SessionCache>,
        store: Arc<dyn CredentialStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            cache,
            store,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn session_key(token: &str) -> String {
        format!("{SESSION_PREFIX}{token}")
    }

    fn data_scope_key(dept_id: &str) -> String {
        format!("{DATA_SCOPE_PREFIX}{dept_id}")
    }

    /// Issue a token for `user`, replacing every earlier session of the same
    /// login type and username.
    ///
    /// `ttl_secs <= 0` creates a session without expiry.
    pub async fn login(&self, user: &UserView, login_type: &str, ttl_secs: i64) -> AppResult<String> {
        if !is_valid_login_type(login_type) {
            return Err(AppError::BadRequest(format!(
                "Invalid login type '{login_type}'"
            )));
        }

        let prefix = identity_prefix(login_type, &user.user_name);
        let stale = self.cache.scan_prefix(&Self::session_key(&prefix)).await?;
        for key in &stale {
            self.cache.del(key).await?;
        }

        let token = generate_token(&prefix);
        let key = Self::session_key(&token);
        let snapshot = serde_json::to_string(user)
            .map_err(|e| AppError::InternalError(format!("Session serialization error: {e}")))?;
        let expire = if ttl_secs > 0 { ttl_secs } else { NEVER_EXPIRES };
        self.cache
            .hset_multiple(
                &key,
                &[
                    (FIELD_USER.to_string(), snapshot),
                    (
                        FIELD_CREATE_TIME.to_string(),
                        keystone_core::types::unix_now().to_string(),
                    ),
                    (FIELD_EXPIRE.to_string(), expire.to_string()),
                ],
            )
            .await?;
        if expire > 0 {
            self.cache
                .expire(&key, Duration::from_secs(expire.unsigned_abs()))
                .await?;
        }

        self.data_scope(&user.dept_id).await?;

        tracing::info!(
            user = %user.user_name,
            login_type = %login_type,
            replaced = stale.len(),
            "Session created"
        );
        Ok(token)
    }

    /// Look up a live session. Expiry is enforced by the cache alone.
    pub async fn resolve(&self, token: &str) -> AppResult<Session> {
        if token.is_empty() {
            return Err(CoreError::NotAuthenticated.into());
        }
        let fields = self.cache.hgetall(&Self::session_key(token)).await?;
        let Some(snapshot) = fields.get(FIELD_USER) else {
            return Err(CoreError::NotAuthenticated.into());
        };
        let user: UserView = serde_json::from_str(snapshot)
            .map_err(|e| AppError::InternalError(format!("Corrupt session snapshot: {e}")))?;
        let int = |name: &str| fields.get(name).and_then(|v| v.parse::<i64>().ok());

        let scope = self.data_scope(&user.dept_id).await?;
        Ok(Session {
            token: token.to_string(),
            user: SessionUser { user, scope },
            created_at: int(FIELD_CREATE_TIME).unwrap_or(0),
            expire: int(FIELD_EXPIRE).unwrap_or(NEVER_EXPIRES),
        })
    }

    /// Sliding refresh after an authorized request.
    ///
    /// A session older than the rotation age is re-issued under a new token,
    /// which is returned. Independently, a session with an expiry has it reset
    /// to the configured idle TTL.
    pub async fn refresh(&self, session: &Session, now: i64) -> AppResult<Option<String>> {
        let mut rotated = None;
        if now - session.created_at >= self.config.rotate_after_secs {
            let token = self
                .login(
                    &session.user.user,
                    login_type_of(&session.token),
                    session.expire,
                )
                .await?;
            tracing::info!(user = %session.user.user.user_name, "Session token rotated");
            rotated = Some(token);
        }

        let current = rotated.as_deref().unwrap_or(&session.token);
        let key = Self::session_key(current);
        if let Ttl::Expires(_) = self.cache.ttl(&key).await? {
            self.cache.expire(&key, self.config.ttl()).await?;
        }
        Ok(rotated)
    }

    /// Destroy a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> AppResult<()> {
        if self.cache.del(&Self::session_key(token)).await? {
            tracing::info!("Session destroyed");
        }
        Ok(())
    }

    /// Switch a session between idle expiry and no expiry.
    pub async fn set_expiring(&self, token: &str, expiring: bool) -> AppResult<()> {
        let key = Self::session_key(token);
        if expiring {
            let ttl = self.config.ttl();
            self.cache
                .hset(&key, FIELD_EXPIRE, &ttl.as_secs().to_string())
                .await?;
            self.cache.expire(&key, ttl).await?;
        } else {
            self.cache
                .hset(&key, FIELD_EXPIRE, &NEVER_EXPIRES.to_string())
                .await?;
            self.cache.persist(&key).await?;
        }
        Ok(())
    }

    /// Replace the user snapshot of a live session.
    pub async fn update_user(&self, token: &str, user: &UserView) -> AppResult<()> {
        let key = Self::session_key(token);
        if !self.cache.exists(&key).await? {
            return Ok(());
        }
        let snapshot = serde_json::to_string(user)
            .map_err(|e| AppError::InternalError(format!("Session serialization error: {e}")))?;
        self.cache.hset(&key, FIELD_USER, &snapshot).await?;
        Ok(())
    }

    /// The cached scope of a department, computed from the store on a miss.
    pub async fn data_scope(&self, dept_id: &str) -> AppResult<DataScope> {
        let key = Self::data_scope_key(dept_id);
        if let Some(scope) = DataScope::from_fields(&self.cache.hgetall(&key).await?) {
            return Ok(scope);
        }

        let subtree = self.store.dept_subtree(dept_id).await?;
        let ancestors = self.store.dept_ancestors(dept_id).await?;
        let scope = DataScope::from_closures(&ancestors, &subtree);

        self.cache.hset_multiple(&key, &scope.to_fields()).await?;
        self.cache
            .expire(&key, Duration::from_secs(self.config.data_scope_ttl_secs))
            .await?;
        tracing::debug!(dept_id = %dept_id, "Data scope computed");
        Ok(scope)
    }

    /// Drop every cached department scope after the tree changed.
    pub async fn invalidate_data_scopes(&self) -> AppResult<usize> {
        let keys = self.cache.scan_prefix(DATA_SCOPE_PREFIX).await?;
        for key in &keys {
            self.cache.del(key).await?;
        }
        tracing::info!(count = keys.len(), "Data scopes invalidated");
        Ok(keys.len())
    }
}

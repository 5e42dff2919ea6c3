use std::sync::Arc;
use std::time::Duration;

use keystone_cache::SessionCache;
use keystone_core::ip_allow::IpAllowList;

use crate::auth::authenticator::Authenticator;
use crate::auth::lockout::LockoutEngine;
use crate::auth::permission::PermissionCache;
use crate::auth::session::SessionManager;
use crate::auth::store::CredentialStore;
use crate::config::{ConfigError, ServerConfig};
use crate::routes::RoutePermissions;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: keystone_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Session, counter, scope and permission storage.
    pub cache: Arc<dyn SessionCache>,
    pub store: Arc<dyn CredentialStore>,
    pub sessions: SessionManager,
    pub permissions: PermissionCache,
    pub lockout: LockoutEngine,
    pub authenticator: Authenticator,
    pub allow_list: Arc<IpAllowList>,
    /// Required permission of every protected route.
    pub route_permissions: Arc<RoutePermissions>,
}

impl AppState {
    /// Wire the session core over `cache` and `store`.
    pub fn new(
        pool: keystone_db::DbPool,
        config: ServerConfig,
        cache: Arc<dyn SessionCache>,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, ConfigError> {
        let allow_list =
            IpAllowList::new(&config.security.auth_hosts).map_err(|e| ConfigError::Invalid {
                name: "AUTH_HOSTS",
                reason: e.to_string(),
            })?;
        let lockout = LockoutEngine::new(cache.clone());
        let sessions = SessionManager::new(cache.clone(), store.clone(), config.session.clone());
        let permissions = PermissionCache::new(
            cache.clone(),
            store.clone(),
            Duration::from_secs(config.session.permission_ttl_secs),
        );
        let authenticator = Authenticator::new(store.clone(), lockout.clone());

        Ok(Self {
            pool,
            config: Arc::new(config),
            cache,
            store,
            sessions,
            permissions,
            lockout,
            authenticator,
            allow_list: Arc::new(allow_list),
            route_permissions: Arc::new(RoutePermissions::default()),
        })
    }
}

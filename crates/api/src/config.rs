use std::str::FromStr;
use std::time::Duration;

use keystone_cache::RedisConfig;

/// A configuration variable that is missing or malformed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Server configuration loaded from environment variables.
///
/// All fields except the database URL have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Grace period for in-flight requests on shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub database_url: String,
    pub security: SecurityConfig,
    pub session: SessionConfig,
    /// `None` selects the in-process cache.
    pub redis: Option<RedisConfig>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default    |
    /// |------------------------|------------|
    /// | `HOST`                 | `0.0.0.0`  |
    /// | `PORT`                 | `3000`     |
    /// | `REQUEST_TIMEOUT_SECS` | `30`       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`       |
    /// | `DATABASE_URL`         | (required) |
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            host: env_or("HOST", "0.0.0.0".to_string())?,
            port: env_or("PORT", 3000)?,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30)?,
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30)?,
            database_url,
            security: SecurityConfig::from_env()?,
            session: SessionConfig::from_env()?,
            redis: redis_from_env()?,
        })
    }
}

/// Request-filter and account settings.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Client IP allow-list patterns. Empty or `*` admits everyone.
    pub auth_hosts: Vec<String>,
    /// Origins echoed back in `Access-Control-Allow-Origin`.
    pub allowed_origins: Vec<String>,
    /// Request and response header carrying the session token.
    pub token_header: String,
    /// Role key whose holders see all departments.
    pub super_admin_role: String,
    /// Handed out verbatim by the public-key endpoint.
    pub public_key: String,
    /// Password given to new and reset accounts.
    pub init_password: String,
}

impl SecurityConfig {
    /// | Env Var            | Default                 |
    /// |--------------------|-------------------------|
    /// | `AUTH_HOSTS`       | `*`                     |
    /// | `ALLOWED_ORIGINS`  | `http://localhost:5173` |
    /// | `TOKEN_HEADER`     | `x-keystone-token`      |
    /// | `SUPER_ADMIN_ROLE` | `super_admin`           |
    /// | `PUBLIC_KEY`       | empty                   |
    /// | `INIT_PASSWORD`    | `123456`                |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            auth_hosts: split_list(&env_or("AUTH_HOSTS", "*".to_string())?),
            allowed_origins: split_list(&env_or(
                "ALLOWED_ORIGINS",
                "http://localhost:5173".to_string(),
            )?),
            token_header: env_or("TOKEN_HEADER", defaults.token_header)?.to_ascii_lowercase(),
            super_admin_role: env_or("SUPER_ADMIN_ROLE", defaults.super_admin_role)?,
            public_key: env_or("PUBLIC_KEY", defaults.public_key)?,
            init_password: env_or("INIT_PASSWORD", defaults.init_password)?,
        })
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            auth_hosts: vec!["*".to_string()],
            allowed_origins: vec!["http://localhost:5173".to_string()],
            token_header: "x-keystone-token".to_string(),
            super_admin_role: keystone_core::roles::SUPER_ADMIN_ROLE_KEY.to_string(),
            public_key: String::new(),
            init_password: "123456".to_string(),
        }
    }
}

/// Session lifetimes and derived-cache TTLs, all in seconds.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle lifetime of a finite session, reset on every authorized request.
    pub ttl_secs: u64,
    /// Age after which a session's token is replaced.
    pub rotate_after_secs: i64,
    pub data_scope_ttl_secs: u64,
    pub permission_ttl_secs: u64,
}

impl SessionConfig {
    /// | Env Var                     | Default  |
    /// |-----------------------------|----------|
    /// | `SESSION_TTL_SECS`          | `1800`   |
    /// | `TOKEN_ROTATE_SECS`         | `7200`   |
    /// | `DATA_SCOPE_TTL_SECS`       | `7200`   |
    /// | `PERMISSION_CACHE_TTL_SECS` | `604800` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            ttl_secs: env_or("SESSION_TTL_SECS", defaults.ttl_secs)?,
            rotate_after_secs: env_or("TOKEN_ROTATE_SECS", defaults.rotate_after_secs)?,
            data_scope_ttl_secs: env_or("DATA_SCOPE_TTL_SECS", defaults.data_scope_ttl_secs)?,
            permission_ttl_secs: env_or(
                "PERMISSION_CACHE_TTL_SECS",
                defaults.permission_ttl_secs,
            )?,
        })
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30 * 60,
            rotate_after_secs: 2 * 60 * 60,
            data_scope_ttl_secs: 2 * 60 * 60,
            permission_ttl_secs: 7 * 24 * 60 * 60,
        }
    }
}

/// | Env Var              | Default     |
/// |----------------------|-------------|
/// | `REDIS_URL`          | unset       |
/// | `CACHE_PREFIX`       | `keystone:` |
/// | `REDIS_POOL_SIZE`    | `16`        |
/// | `REDIS_TIMEOUT_SECS` | `5`         |
fn redis_from_env() -> Result<Option<RedisConfig>, ConfigError> {
    let Ok(url) = std::env::var("REDIS_URL") else {
        return Ok(None);
    };
    let defaults = RedisConfig::default();
    Ok(Some(RedisConfig {
        url,
        prefix: env_or("CACHE_PREFIX", defaults.prefix)?,
        pool_size: env_or("REDIS_POOL_SIZE", defaults.pool_size)?,
        connection_timeout: Duration::from_secs(env_or(
            "REDIS_TIMEOUT_SECS",
            defaults.connection_timeout.as_secs(),
        )?),
    }))
}

fn env_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Split a `;`-separated list, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_splitting_drops_blanks() {
        assert_eq!(
            split_list(" 10.0.0.*; ;127.0.0.1;"),
            vec!["10.0.0.*".to_string(), "127.0.0.1".to_string()]
        );
    }

    #[test]
    fn session_defaults() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.ttl(), Duration::from_secs(1800));
        assert_eq!(cfg.rotate_after_secs, 7200);
        assert_eq!(cfg.permission_ttl_secs, 604_800);
    }
}

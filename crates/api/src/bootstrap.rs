//! Startup wiring: cache backend selection and the first administrator.

use std::sync::Arc;
use std::time::Duration;

use keystone_cache::{CacheError, MemoryCache, RedisCache, SessionCache};
use keystone_db::models::base::BaseFields;
use keystone_db::models::user::SaveUser;
use keystone_db::repositories::UserRepo;
use keystone_db::DbPool;

use crate::auth::password::hash_password;
use crate::config::ServerConfig;
use crate::error::AppResult;

/// Id of the root department and the super-admin role seeded by migration.
pub const SEED_ID: &str = "00000000000000000000000000000001";

pub const ADMIN_USER_NAME: &str = "admin";

const MEMORY_SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Redis when `REDIS_URL` is set, otherwise the in-process cache with a
/// background expiry sweep. Must be called inside the tokio runtime.
pub fn build_cache(config: &ServerConfig) -> Result<Arc<dyn SessionCache>, CacheError> {
    match &config.redis {
        Some(redis) => {
            tracing::info!(prefix = %redis.prefix, "Using Redis session cache");
            Ok(Arc::new(RedisCache::new(redis)?))
        }
        None => {
            tracing::warn!("REDIS_URL not set; sessions live in process memory");
            let cache = Arc::new(MemoryCache::new());
            cache.spawn_sweeper(MEMORY_SWEEP_PERIOD);
            Ok(cache)
        }
    }
}

/// Create the `admin` account on an empty user table.
///
/// Returns `true` when the account was created.
pub async fn ensure_admin(pool: &DbPool, config: &ServerConfig) -> AppResult<bool> {
    if UserRepo::count(pool).await? > 0 {
        return Ok(false);
    }
    let input = SaveUser {
        user_name: ADMIN_USER_NAME.to_string(),
        real_name: "Administrator".to_string(),
        dept_id: SEED_ID.to_string(),
        role_id: SEED_ID.to_string(),
        phone: None,
        state: None,
    };
    let hash = hash_password(&config.security.init_password)?;
    UserRepo::create(pool, &BaseFields::created_by(None), &input, &hash).await?;
    tracing::warn!(user = ADMIN_USER_NAME, "Created the initial administrator; change its password");
    Ok(true)
}

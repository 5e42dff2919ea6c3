use std::time::Duration;

/// Connection settings for [`RedisCache`](crate::RedisCache).
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g. `redis://127.0.0.1:6379`).
    pub url: String,

    /// Prepended to every key so several deployments can share one Redis.
    pub prefix: String,

    /// Number of connections in the `deadpool-redis` pool.
    pub pool_size: usize,

    /// Timeout for acquiring a pooled connection.
    pub connection_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::from("redis://127.0.0.1:6379"),
            prefix: String::from("keystone:"),
            pool_size: 16,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let cfg = RedisConfig::default();
        assert_eq!(cfg.url, "redis://127.0.0.1:6379");
        assert_eq!(cfg.prefix, "keystone:");
        assert_eq!(cfg.pool_size, 16);
        assert_eq!(cfg.connection_timeout, Duration::from_secs(5));
    }
}

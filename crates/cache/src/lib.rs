//! Key-value session cache.
//!
//! The [`SessionCache`] trait covers the hash, expiry and prefix-scan
//! operations the session core needs. [`MemoryCache`] serves tests and
//! single-node deployments; [`RedisCache`] is the shared production backend.

pub mod config;
pub mod error;
pub mod memory;
pub mod redis_cache;
pub mod store;
pub mod testing;

pub use config::RedisConfig;
pub use error::CacheError;
pub use memory::MemoryCache;
pub use redis_cache::RedisCache;
pub use store::{SessionCache, Ttl};

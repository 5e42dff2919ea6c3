/// Errors raised by a [`SessionCache`](crate::SessionCache) backend.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backend could not be reached or a pooled connection was unavailable.
    #[error("cache connection error: {0}")]
    Connection(String),

    /// The backend rejected or failed a command.
    #[error("cache backend error: {0}")]
    Backend(String),
}

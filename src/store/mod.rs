//! Key-value storage of token pointers.

mod memory;
#[cfg(feature = "redis")]
mod redis;

use std::time::Duration;

pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use self::redis::RedisCache;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("key {0} not found")]
    NotFound(String),
    /// Failure of a [`Cache`] implementation outside this crate.
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
    #[cfg(feature = "redis")]
    #[error(transparent)]
    Redis(#[from] ::redis::RedisError),
}

/// Key-value store consumed by [`crate::Authed`].
///
/// Implementations handle their own locking; callers never assume that two
/// calls are applied atomically.
pub trait Cache: Send + Sync {
    /// Get the value stored at `key`, [`StoreError::NotFound`] when absent or
    /// expired.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Store `value` without expiration.
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn del(&self, key: &str) -> Result<()>;

    /// Store `value` for `ttl`. A zero `ttl` removes the key.
    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
}

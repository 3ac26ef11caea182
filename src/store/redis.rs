use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use redis::{Commands, Connection, RedisResult};

use super::{Cache, Result, StoreError};

/// [`Cache`] backed by a Redis server.
///
/// One idle connection is kept and reused. Concurrent callers that find it
/// taken open their own, and a connection that failed with an I/O error is
/// dropped instead of being kept.
pub struct RedisCache {
    client: redis::Client,
    idle: Mutex<Option<Connection>>,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Create a new [`RedisCache`] from a `redis://` URL.
    ///
    /// No connection is opened until the first command.
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            client: redis::Client::open(url)?,
            idle: Mutex::new(None),
        })
    }

    fn with_connection<T>(
        &self,
        command: impl FnOnce(&mut Connection) -> RedisResult<T>,
    ) -> Result<T> {
        let idle = self.idle.lock().ok().and_then(|mut idle| idle.take());
        let mut connection = match idle {
            Some(connection) => connection,
            None => self.client.get_connection()?,
        };

        let result = command(&mut connection);
        let broken = result
            .as_ref()
            .is_err_and(|err| err.is_io_error() || err.is_connection_dropped());
        if !broken {
            if let Ok(mut idle) = self.idle.lock() {
                *idle = Some(connection);
            }
        }

        Ok(result?)
    }
}

impl Cache for RedisCache {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let value: Option<Vec<u8>> = self.with_connection(|conn| conn.get(key))?;
        value.ok_or_else(|| StoreError::NotFound(key.to_owned()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.with_connection(|conn| conn.set(key, value))
    }

    fn del(&self, key: &str) -> Result<()> {
        self.with_connection(|conn| conn.del(key))
    }

    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        if millis == 0 {
            return self.del(key);
        }

        self.with_connection(|conn| conn.pset_ex(key, value, millis))
    }
}

// Redis LockStore Implementation

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use stella_core::error::{AppError, Result};
use stella_core::port::LockStore;
use tracing::info;

// Compare-and-delete in one round trip; a GET followed by DEL would race
// with the key expiring and being taken by another owner in between.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

fn map_redis_error(context: &str, err: redis::RedisError) -> AppError {
    AppError::LockStore(format!("{}: {}", context, err))
}

/// Lock store backed by a single Redis instance
///
/// Holds a `ConnectionManager`, which reconnects on its own after the
/// server goes away; clones share the underlying multiplexed connection.
#[derive(Clone)]
pub struct RedisLockStore {
    conn: ConnectionManager,
    release_script: redis::Script,
}

impl RedisLockStore {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379`) and verify with PING
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| map_redis_error("Failed to create Redis client", e))?;

        let mut conn = ConnectionManager::new(client)
            .await
            .map_err(|e| map_redis_error("Failed to connect to Redis", e))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("Redis ping failed", e))?;

        info!("Redis lock store connected to {}", url);

        Ok(Self {
            conn,
            release_script: redis::Script::new(RELEASE_SCRIPT),
        })
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool> {
        let mut conn = self.conn.clone();

        // SET replies OK when written and nil when NX refused the write
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("SET NX PX failed", e))?;

        Ok(reply.is_some())
    }

    async fn delete_if_equals(&self, key: &str, value: &str) -> Result<bool> {
        let mut conn = self.conn.clone();

        let deleted: i64 = self
            .release_script
            .key(key)
            .arg(value)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("Release script failed", e))?;

        Ok(deleted == 1)
    }
}

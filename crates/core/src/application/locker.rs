// Distributed Locker
//
// Mutual exclusion across processes for a named critical section, backed by
// a shared LockStore. Locks carry a TTL so a crashed holder never blocks
// other processes for longer than that TTL.

use crate::error::{AppError, Result};
use crate::port::LockStore;
use rand::RngCore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Number of random bytes in an ownership token
const TOKEN_BYTES: usize = 16;

/// Logging configuration for a Locker
#[derive(Debug, Clone, Copy, Default)]
pub struct LockerConfig {
    /// Log every acquire/release outcome at INFO instead of DEBUG
    pub debug_locks: bool,
}

/// Distributed lock client
///
/// Each instance owns a random token, generated once at construction. Only
/// the instance whose token is stored under a key can release that key.
pub struct Locker {
    store: Arc<dyn LockStore>,
    token: String,
    config: LockerConfig,
}

impl Locker {
    pub fn new(store: Arc<dyn LockStore>, config: LockerConfig) -> Self {
        Self {
            store,
            token: generate_token(),
            config,
        }
    }

    /// Ownership token of this instance
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Try once to take `key` for `ttl_ms` milliseconds.
    ///
    /// Returns `Ok(true)` if this instance now holds the lock, `Ok(false)` if
    /// another owner holds it. Store errors are returned to the caller:
    /// exclusivity is unknown in that case.
    ///
    /// # Errors
    /// - `AppError::Validation` if `key` is empty or `ttl_ms` is zero
    /// - `AppError::LockStore` if the store cannot be reached
    pub async fn acquire(&self, key: &str, ttl_ms: u64) -> Result<bool> {
        if key.trim().is_empty() {
            return Err(AppError::Validation("lock key must not be empty".to_string()));
        }
        if ttl_ms == 0 {
            return Err(AppError::Validation(
                "lock ttl must be a positive number of milliseconds".to_string(),
            ));
        }

        let acquired = self
            .store
            .set_if_absent(key, &self.token, ttl_ms)
            .await
            .map_err(|e| {
                warn!(lock_key = %key, error = %e, "Lock acquire failed");
                e
            })?;

        if self.config.debug_locks {
            info!(lock_key = %key, ttl_ms, acquired, "Lock acquire");
        } else {
            debug!(lock_key = %key, ttl_ms, acquired, "Lock acquire");
        }

        Ok(acquired)
    }

    /// Release `key` if, and only if, this instance holds it.
    ///
    /// Returns true iff the key was deleted by this call. Never fails: store
    /// errors are logged and reported as `false`, the TTL reclaims the key.
    pub async fn release(&self, key: &str) -> bool {
        match self.store.delete_if_equals(key, &self.token).await {
            Ok(released) => {
                if self.config.debug_locks {
                    info!(lock_key = %key, released, "Lock release");
                } else {
                    debug!(lock_key = %key, released, "Lock release");
                }
                released
            }
            Err(e) => {
                warn!(lock_key = %key, error = %e, "Lock release failed, leaving key to expire");
                false
            }
        }
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// Lock Store Port (Interface)
// Shared key/value store offering the two atomic primitives the Locker needs.

use crate::error::Result;
use async_trait::async_trait;

/// Key/value backend for distributed locks
///
/// Both operations must be atomic on the store side. A get-then-set or
/// get-then-delete sequence issued by the client races under contention.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Set `key` to `value` with a TTL, only if `key` is absent
    /// (`SET key value PX ttl_ms NX`).
    ///
    /// Returns true iff the value was written.
    async fn set_if_absent(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool>;

    /// Delete `key` only if its current value equals `value`, in one round trip.
    ///
    /// Returns true iff the key was deleted.
    async fn delete_if_equals(&self, key: &str, value: &str) -> Result<bool>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// In-process lock store with wall-clock TTL expiry
    ///
    /// A single mutex makes both primitives atomic, standing in for Redis.
    #[derive(Default)]
    pub struct InMemoryLockStore {
        entries: Mutex<HashMap<String, (String, Instant)>>,
        unavailable: AtomicBool,
        set_calls: AtomicUsize,
    }

    impl InMemoryLockStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent call fail as if the store were unreachable
        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        /// Current (unexpired) value of `key`
        pub fn get(&self, key: &str) -> Option<String> {
            let entries = self.entries.lock().unwrap();
            entries
                .get(key)
                .filter(|(_, expires_at)| Instant::now() < *expires_at)
                .map(|(value, _)| value.clone())
        }

        pub fn set_calls(&self) -> usize {
            self.set_calls.load(Ordering::SeqCst)
        }

        fn check_available(&self) -> Result<()> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(AppError::LockStore("connection refused".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl LockStore for InMemoryLockStore {
        async fn set_if_absent(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool> {
            self.set_calls.fetch_add(1, Ordering::SeqCst);
            self.check_available()?;

            let now = Instant::now();
            let mut entries = self.entries.lock().unwrap();
            if let Some((_, expires_at)) = entries.get(key) {
                if now < *expires_at {
                    return Ok(false);
                }
            }
            entries.insert(
                key.to_string(),
                (value.to_string(), now + Duration::from_millis(ttl_ms)),
            );
            Ok(true)
        }

        async fn delete_if_equals(&self, key: &str, value: &str) -> Result<bool> {
            self.check_available()?;

            let now = Instant::now();
            let mut entries = self.entries.lock().unwrap();
            match entries.get(key) {
                Some((current, expires_at)) if now < *expires_at && current == value => {
                    entries.remove(key);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }
}

// Stella Infrastructure - Redis Adapter
// Implements: LockStore

mod lock_store;

pub use lock_store::RedisLockStore;

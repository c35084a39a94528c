// Application Layer - Use Cases and Business Logic

pub mod jobs;
pub mod locker;
pub mod recovery;
pub mod retry;
pub mod worker;

// Re-exports
pub use jobs::JobService;
pub use locker::{Locker, LockerConfig};
pub use recovery::RecoveryService;
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, Worker};

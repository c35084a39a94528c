// Stella Infrastructure - SQLite Adapter
// Implements: JobQueue

mod connection;
mod job_queue;
mod migration;

pub use connection::create_pool;
pub use job_queue::SqliteJobQueue;
pub use migration::run_migrations;

// Note: sqlx::Error conversion is handled by a helper function
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)

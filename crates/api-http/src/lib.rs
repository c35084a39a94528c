//! HTTP API Layer
//!
//! Routes the web tier talks to: `POST /enqueue`, `GET /job-status`,
//! `GET /health`. Handlers are thin; all rules live in `stella-core`.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::{router, AppState};
pub use server::{HttpServer, HttpServerConfig};

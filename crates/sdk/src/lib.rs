//! Stella SDK - Rust Client Library
//!
//! Submits jobs to the Stella job API and polls them to completion.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stella_sdk::{ChatSession, HttpTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(HttpTransport::new("http://127.0.0.1:8787")?);
//!     let session = ChatSession::new(transport);
//!
//!     session.send_message("Why is Mars red?", None).await?;
//!
//!     for message in session.state().messages {
//!         println!("{:?}: {}", message.role, message.content);
//!     }
//!     Ok(())
//! }
//! ```

mod backoff;
mod chat;
mod error;
mod mission;
mod poller;
pub mod transport;

pub use backoff::{Backoff, PollConfig};
pub use chat::{ChatMessage, ChatSession, ChatState, MessageRole};
pub use error::{Result, SdkError};
pub use mission::MissionClient;
pub use poller::{cancel_channel, CancelHandle, CancelToken, JobPoller, PollOutcome};
pub use transport::{HttpTransport, JobTransport};

pub use stella_core::application::jobs::EnqueueRequest;
pub use stella_core::domain::{AskAnswer, JobKind, JobState, JobStatus, MissionPlan};

//! Chat Example
//!
//! Asks one question through a running daemon and prints the conversation.
//!
//! # Usage
//!
//! 1. Start the daemon:
//!    ```bash
//!    cargo run --package stella-daemon
//!    ```
//!
//! 2. Run this example:
//!    ```bash
//!    cargo run --example chat -- "How hot is the Sun?"
//!    ```

use std::sync::Arc;
use stella_sdk::{ChatSession, HttpTransport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "How hot is the Sun?".to_string());
    let url = std::env::var("STELLA_API_URL").unwrap_or_else(|_| "http://127.0.0.1:8787".to_string());

    let session = ChatSession::new(Arc::new(HttpTransport::new(url)?));
    let mut updates = session.subscribe();

    let task = session.send_message(prompt, None);
    while updates.changed().await.is_ok() {
        let state = updates.borrow_and_update().clone();
        if let Some(job_state) = state.job_state {
            println!("   ... {}", job_state);
        }
        if !state.loading {
            break;
        }
    }
    task.await?;

    for message in session.state().messages {
        println!("{:?}: {}", message.role, message.content);
    }
    Ok(())
}

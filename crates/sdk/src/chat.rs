//! Chat session: the UI-facing poll client
//!
//! Holds the message list and loading flag a chat view renders. Each
//! `send_message` runs one enqueue+poll sequence in the background; at most
//! one sequence is live per session, and a stopped sequence never touches
//! the state again.

use crate::backoff::PollConfig;
use crate::poller::{cancel_channel, CancelHandle, CancelToken, JobPoller, PollOutcome};
use crate::transport::JobTransport;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use stella_core::application::jobs::EnqueueRequest;
use stella_core::domain::{AskAnswer, JobState};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Everything a chat view renders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatState {
    pub messages: Vec<ChatMessage>,
    pub loading: bool,
    /// Last non-terminal state observed for the live job
    pub job_state: Option<JobState>,
}

pub struct ChatSession {
    transport: Arc<dyn JobTransport>,
    config: PollConfig,
    state: Arc<watch::Sender<ChatState>>,
    current: Mutex<Option<CancelHandle>>,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn JobTransport>) -> Self {
        Self::with_config(transport, PollConfig::default())
    }

    pub fn with_config(transport: Arc<dyn JobTransport>, config: PollConfig) -> Self {
        let (tx, _rx) = watch::channel(ChatState::default());
        Self {
            transport,
            config,
            state: Arc::new(tx),
            current: Mutex::new(None),
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> ChatState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every applied update
    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.state.subscribe()
    }

    /// Ask `prompt`, replacing any sequence still in flight.
    ///
    /// Appends the user message and sets `loading` before returning. The
    /// returned handle resolves once the background sequence ends.
    pub fn send_message(
        &self,
        prompt: impl Into<String>,
        context: Option<String>,
    ) -> JoinHandle<()> {
        let prompt = prompt.into();
        let (handle, token) = cancel_channel();

        if let Some(previous) = self.swap_current(Some(handle)) {
            previous.cancel();
        }

        self.state.send_modify(|s| {
            s.messages.push(ChatMessage::new(MessageRole::User, prompt.clone()));
            s.loading = true;
            s.job_state = None;
        });

        let mut request = EnqueueRequest::ask(prompt);
        request.context = context;

        let sequence = Sequence {
            transport: Arc::clone(&self.transport),
            poller: JobPoller::new(Arc::clone(&self.transport), self.config.clone()),
            state: Arc::clone(&self.state),
            token,
        };
        tokio::spawn(sequence.run(request))
    }

    /// Cancel the live sequence; none of its later results are applied
    pub fn stop(&self) {
        if let Some(handle) = self.swap_current(None) {
            handle.cancel();
        }
        self.state.send_modify(|s| {
            s.loading = false;
            s.job_state = None;
        });
    }

    fn swap_current(&self, next: Option<CancelHandle>) -> Option<CancelHandle> {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *current, next)
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(handle) = self.swap_current(None) {
            handle.cancel();
        }
    }
}

/// One enqueue+poll run, owned by its background task
struct Sequence {
    transport: Arc<dyn JobTransport>,
    poller: JobPoller,
    state: Arc<watch::Sender<ChatState>>,
    token: CancelToken,
}

impl Sequence {
    async fn run(self, request: EnqueueRequest) {
        let enqueued = tokio::select! {
            biased;
            _ = self.token.cancelled() => return,
            r = self.transport.enqueue(&request) => r,
        };

        let job_id = match enqueued {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Enqueue failed");
                self.finish(ChatMessage::new(MessageRole::Error, e.to_string()));
                return;
            }
        };
        debug!(job_id = %job_id, "Polling job");

        let outcome = self
            .poller
            .poll(&job_id, &self.token, |job_state| {
                self.apply(|s| s.job_state = Some(job_state));
            })
            .await;

        match outcome {
            PollOutcome::Completed(result) => {
                self.finish(ChatMessage::new(MessageRole::Assistant, answer_text(result)))
            }
            PollOutcome::Failed(error) => {
                self.finish(ChatMessage::new(MessageRole::Error, error))
            }
            PollOutcome::Cancelled => {}
        }
    }

    fn finish(&self, message: ChatMessage) {
        self.apply(|s| {
            s.messages.push(message);
            s.loading = false;
            s.job_state = None;
        });
    }

    /// Apply `f` unless this sequence was cancelled. The check runs under
    /// the state lock, so no update can land after `stop` returned.
    fn apply(&self, f: impl FnOnce(&mut ChatState)) {
        self.state.send_if_modified(|s| {
            if self.token.is_cancelled() {
                return false;
            }
            f(s);
            true
        });
    }
}

/// Text shown for a completed ask job
fn answer_text(result: serde_json::Value) -> String {
    if let serde_json::Value::String(text) = result {
        return text;
    }
    match serde_json::from_value::<AskAnswer>(result.clone()) {
        Ok(answer) => answer.answer,
        Err(_) => result.to_string(),
    }
}

//! Mission plan client

use crate::backoff::PollConfig;
use crate::error::{Result, SdkError};
use crate::poller::{cancel_channel, JobPoller, PollOutcome};
use crate::transport::JobTransport;
use chrono::NaiveDate;
use std::sync::Arc;
use stella_core::application::jobs::EnqueueRequest;
use stella_core::domain::MissionPlan;
use tracing::info;

/// Generates the daily mission plan for a role
pub struct MissionClient {
    transport: Arc<dyn JobTransport>,
    poller: JobPoller,
}

impl MissionClient {
    pub fn new(transport: Arc<dyn JobTransport>) -> Self {
        Self::with_config(transport, PollConfig::default())
    }

    pub fn with_config(transport: Arc<dyn JobTransport>, config: PollConfig) -> Self {
        Self {
            poller: JobPoller::new(Arc::clone(&transport), config),
            transport,
        }
    }

    /// Enqueue the mission for `role` on `date` and wait for its plan.
    ///
    /// # Errors
    /// - `SdkError::Duplicate` if the same mission was triggered recently
    /// - `SdkError::JobFailed` if the job failed or the status query broke
    /// - `SdkError::Serialization` if the result is not a mission plan
    pub async fn generate(&self, role: &str, date: NaiveDate) -> Result<MissionPlan> {
        let job_id = self
            .transport
            .enqueue(&EnqueueRequest::mission(role).with_date(date))
            .await?;
        info!(job_id = %job_id, role = %role, %date, "Mission job enqueued");

        // Never cancelled: the caller drops the future to abandon the wait
        let (_handle, token) = cancel_channel();
        match self.poller.poll(&job_id, &token, |_| {}).await {
            PollOutcome::Completed(result) => Ok(serde_json::from_value(result)?),
            PollOutcome::Failed(error) => Err(SdkError::JobFailed(error)),
            PollOutcome::Cancelled => Err(SdkError::Cancelled),
        }
    }
}

//! Periodic pull queries for values the provider does not push.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::provider::WorkoutProvider;
use crate::runtime::SessionEvent;

/// When to poll, in running seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSchedule {
    /// Ticks up to and including this many seconds never poll
    pub warmup_secs: u64,
    /// Poll on ticks where `elapsed % interval_secs == 0`; zero disables polling
    pub interval_secs: u64,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            warmup_secs: 5,
            interval_secs: 5,
        }
    }
}

impl PollSchedule {
    pub fn is_due(&self, elapsed_seconds: u64) -> bool {
        self.interval_secs > 0
            && elapsed_seconds > self.warmup_secs
            && elapsed_seconds % self.interval_secs == 0
    }
}

/// Fire the step-count and speed queries. Each result re-enters the queue
/// as its own event whenever it completes; the caller does not wait.
pub fn spawn_queries(
    provider: Arc<dyn WorkoutProvider>,
    since: DateTime<Utc>,
    session: u64,
    queue: mpsc::Sender<SessionEvent>,
) {
    debug!(session, %since, "polling steps and speed");

    let steps_provider = Arc::clone(&provider);
    let steps_queue = queue.clone();
    tokio::spawn(async move {
        let result = steps_provider.query_step_count(since).await;
        let _ = steps_queue
            .send(SessionEvent::StepsUpdated { session, result })
            .await;
    });

    tokio::spawn(async move {
        let result = provider.query_average_speed(since).await;
        let _ = queue.send(SessionEvent::SpeedUpdated { session, result }).await;
    });
}

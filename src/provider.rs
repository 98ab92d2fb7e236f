//! Contract of the external workout-tracking provider.
//!
//! The provider owns the physical sensor session. Control requests go out
//! through the trait; everything it observes comes back as `ProviderEvent`s
//! on the stream returned by [`WorkoutProvider::event_stream`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::activity::ActivityType;
use crate::lifecycle::ProviderState;
use crate::statistics::StatisticsField;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// The tracking session could not be created
    #[error("tracking unavailable: {0}")]
    Unavailable(String),

    #[error("no active tracking session")]
    NoSession,

    /// A query matched no samples
    #[error("no samples for query")]
    NoData,

    #[error("provider failure: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    StateChanged(ProviderState),
    /// Mid-session fault; does not end the session by itself
    SessionFailed(ProviderError),
    StatisticsUpdated(StatisticsField),
}

/// Finished workout record produced by the provider at session end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSummary {
    pub activity_type: ActivityType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration_seconds: u64,
    pub total_distance: f64,
    pub total_energy: f64,
    pub average_heart_rate: f64,
}

pub type EventStream = BoxStream<'static, ProviderEvent>;

#[async_trait]
pub trait WorkoutProvider: Send + Sync + 'static {
    /// Begin a physical tracking session
    async fn start_session(&self, activity: ActivityType) -> Result<(), ProviderError>;

    async fn request_pause(&self) -> Result<(), ProviderError>;

    async fn request_resume(&self) -> Result<(), ProviderError>;

    async fn request_end(&self) -> Result<(), ProviderError>;

    /// Events for the session of the given kind. The stream ends when the
    /// provider has nothing more to report; dropping it unsubscribes.
    fn event_stream(&self, activity: ActivityType) -> EventStream;

    /// Cumulative step count since `since`
    async fn query_step_count(&self, since: DateTime<Utc>) -> Result<u64, ProviderError>;

    /// Average speed in meters/second since `since`
    async fn query_average_speed(&self, since: DateTime<Utc>) -> Result<f64, ProviderError>;

    async fn finalize_session(&self) -> Result<WorkoutSummary, ProviderError>;
}

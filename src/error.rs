use chrono::{DateTime, Utc};

use crate::activity::ActivityType;
use crate::provider::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Query {
    StepCount,
    AverageSpeed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Request {
    Pause,
    Resume,
    End,
}

/// Everything that can go wrong around a live session. None of these are
/// fatal: each is reported and the session carries on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    /// No session was created
    #[error("could not start {activity} session: {source}")]
    StartFailed {
        activity: ActivityType,
        source: ProviderError,
    },

    /// Mid-session fault reported by the provider
    #[error("tracking session failed: {0}")]
    SessionFailed(ProviderError),

    /// The snapshot field keeps its previous value
    #[error("{query} query failed: {source}")]
    QueryFailed {
        query: Query,
        source: ProviderError,
    },

    #[error("{request} request failed: {source}")]
    RequestFailed {
        request: Request,
        source: ProviderError,
    },

    /// The summary is still shown, without a workout record
    #[error("workout could not be finalized: {0}")]
    FinalizeFailed(ProviderError),

    #[error("a {0} session is already in progress")]
    SessionInProgress(ActivityType),

    #[error("no workout session selected")]
    NoActiveSession,
}

/// Errors returned by the orchestrator handle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("orchestrator has stopped")]
    Stopped,
}

/// A failure surfaced to the user without interrupting anything.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub error: SessionError,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn now(error: SessionError) -> Self {
        Self {
            error,
            at: Utc::now(),
        }
    }
}

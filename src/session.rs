use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityType;
use crate::lifecycle::{transition, ProviderState, SessionStatus, Transition};

/// Identity and lifecycle of the live workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    activity_type: ActivityType,
    pub status: SessionStatus,
    /// Set on the first `Running` transition and never moved afterwards
    pub start_date: Option<DateTime<Utc>>,
    /// Running seconds; paused time is not counted
    pub elapsed_seconds: u64,
}

impl Session {
    pub fn new(activity_type: ActivityType) -> Self {
        Self {
            activity_type,
            status: SessionStatus::NotStarted,
            start_date: None,
            elapsed_seconds: 0,
        }
    }

    pub fn activity_type(&self) -> ActivityType {
        self.activity_type
    }

    /// Apply a provider-acknowledged state and report what happened.
    pub fn apply_provider_state(&mut self, state: ProviderState, now: DateTime<Utc>) -> Transition {
        let result = transition(self.status, state);

        if result == Transition::Started && self.start_date.is_none() {
            self.start_date = Some(now);
        }
        if let Some(status) = result.target() {
            self.status = status;
        }

        result
    }

    /// Count one clock tick. Returns false when the session is not running.
    pub fn tick(&mut self) -> bool {
        if self.status != SessionStatus::Running {
            return false;
        }
        self.elapsed_seconds += 1;
        true
    }
}

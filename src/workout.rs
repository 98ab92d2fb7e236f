//! State of one live workout and the rules for changing it.
//!
//! `Workout::apply` is the single mutation point: every provider event,
//! tick and query result goes through it and yields the side effects the
//! orchestrator must perform. It does no I/O itself.

use chrono::{DateTime, Utc};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::activity::ActivityType;
use crate::error::{Query, SessionError};
use crate::lifecycle::{ProviderState, SessionStatus, Transition};
use crate::poller::PollSchedule;
use crate::provider::{ProviderError, ProviderEvent, WorkoutSummary};
use crate::session::Session;
use crate::split::{average_pace, cadence, SplitState, SplitUnit};
use crate::statistics::{StatisticsField, StatisticsSnapshot};
use crate::util::sanitize;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WorkoutConfig {
    pub split_unit: SplitUnit,
    pub poll: PollSchedule,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    StateChanged(ProviderState),
    SessionFailed(ProviderError),
    StatisticsUpdated(StatisticsField),
    Tick,
    StepsUpdated(Result<u64, ProviderError>),
    SpeedUpdated(Result<f64, ProviderError>),
    Finalized(Result<WorkoutSummary, ProviderError>),
}

impl From<ProviderEvent> for Action {
    fn from(event: ProviderEvent) -> Self {
        match event {
            ProviderEvent::StateChanged(state) => Action::StateChanged(state),
            ProviderEvent::SessionFailed(error) => Action::SessionFailed(error),
            ProviderEvent::StatisticsUpdated(field) => Action::StatisticsUpdated(field),
        }
    }
}

/// Work the orchestrator performs after an action has been applied
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartClock,
    StopClock,
    /// Release the provider stream subscription
    StopObserving,
    /// Query steps and speed accumulated since the start date
    Poll { since: DateTime<Utc> },
    /// Ask the provider for the finished workout record
    Finalize,
    Notify(SessionError),
}

#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Reduction {
    /// Nothing changed; no snapshot is published
    Ignored,
    Applied(Vec<Effect>),
}

/// End-of-session summary shown once the session has ended.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    /// Waiting on the provider's finished workout record
    pub finalizing: bool,
    /// `None` while finalizing, or if finalizing failed
    pub workout: Option<WorkoutSummary>,
}

/// Figures shown on the live metrics screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub elapsed_seconds: u64,
    /// Seconds per kilometer over the whole session
    pub average_pace: f64,
    /// Seconds per kilometer in the current split
    pub split_pace: f64,
    /// Steps per minute
    pub cadence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Workout {
    session: Session,
    statistics: StatisticsSnapshot,
    split: SplitState,
    summary: Option<Summary>,
    config: WorkoutConfig,
}

/// Published form: the stored state plus the metrics derived from it
impl Serialize for Workout {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Workout", 5)?;
        state.serialize_field("session", &self.session)?;
        state.serialize_field("statistics", &self.statistics)?;
        state.serialize_field("split", &self.split)?;
        state.serialize_field("summary", &self.summary)?;
        state.serialize_field("metrics", &self.metrics())?;
        state.end()
    }
}

impl Workout {
    pub fn new(activity_type: ActivityType, config: WorkoutConfig) -> Self {
        Self {
            session: Session::new(activity_type),
            statistics: StatisticsSnapshot::default(),
            split: SplitState::default(),
            summary: None,
            config,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    pub fn statistics(&self) -> &StatisticsSnapshot {
        &self.statistics
    }

    pub fn split(&self) -> &SplitState {
        &self.split
    }

    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    pub fn metrics(&self) -> Metrics {
        let elapsed = self.session.elapsed_seconds;
        Metrics {
            elapsed_seconds: elapsed,
            average_pace: average_pace(elapsed, self.statistics.distance),
            split_pace: sanitize(self.statistics.split_pace),
            cadence: cadence(self.statistics.steps, elapsed),
        }
    }

    pub fn apply(&mut self, action: Action, now: DateTime<Utc>) -> Reduction {
        match action {
            Action::StateChanged(state) => self.on_state_changed(state, now),
            Action::SessionFailed(error) => {
                warn!(%error, "tracking session reported a failure");
                Reduction::Applied(vec![Effect::Notify(SessionError::SessionFailed(error))])
            }
            Action::StatisticsUpdated(field) => self.on_statistics(field),
            Action::Tick => self.on_tick(),
            Action::StepsUpdated(result) => match result {
                Ok(steps) => {
                    self.statistics.apply_steps(steps);
                    Reduction::Applied(vec![])
                }
                Err(source) => Self::query_failed(Query::StepCount, source),
            },
            Action::SpeedUpdated(result) => match result {
                Ok(speed) => {
                    self.statistics.apply_average_speed(speed);
                    Reduction::Applied(vec![])
                }
                Err(source) => Self::query_failed(Query::AverageSpeed, source),
            },
            Action::Finalized(result) => self.on_finalized(result),
        }
    }

    fn on_state_changed(&mut self, state: ProviderState, now: DateTime<Utc>) -> Reduction {
        let from = self.session.status;
        let transition = self.session.apply_provider_state(state, now);

        let effects = match transition {
            Transition::Started => {
                info!(activity = %self.session.activity_type(), "workout started");
                vec![Effect::StartClock]
            }
            Transition::Resumed => {
                info!(elapsed = self.session.elapsed_seconds, "workout resumed");
                vec![Effect::StartClock]
            }
            Transition::Paused => {
                info!(elapsed = self.session.elapsed_seconds, "workout paused");
                vec![Effect::StopClock]
            }
            Transition::Ended => {
                info!(elapsed = self.session.elapsed_seconds, "workout ended");
                self.summary = Some(Summary {
                    finalizing: true,
                    workout: None,
                });
                vec![Effect::StopClock, Effect::StopObserving, Effect::Finalize]
            }
            Transition::Ignored => {
                debug!(?from, ?state, "provider state ignored");
                return Reduction::Ignored;
            }
        };

        Reduction::Applied(effects)
    }

    fn on_statistics(&mut self, field: StatisticsField) -> Reduction {
        if self.session.status == SessionStatus::Ended {
            debug!(?field, "statistics after end ignored");
            return Reduction::Ignored;
        }

        self.statistics.apply(field);

        if let StatisticsField::Distance(distance) = field {
            self.split.observe_distance(distance, self.config.split_unit);
            self.statistics.split_pace = self.split.split_pace();
        }

        Reduction::Applied(vec![])
    }

    fn on_tick(&mut self) -> Reduction {
        if !self.session.tick() {
            return Reduction::Ignored;
        }

        self.split.advance_second();
        self.split
            .observe_distance(self.statistics.distance, self.config.split_unit);
        self.statistics.split_pace = self.split.split_pace();

        let mut effects = vec![];
        if self.config.poll.is_due(self.session.elapsed_seconds) {
            if let Some(since) = self.session.start_date {
                effects.push(Effect::Poll { since });
            }
        }

        Reduction::Applied(effects)
    }

    fn on_finalized(&mut self, result: Result<WorkoutSummary, ProviderError>) -> Reduction {
        let summary = self.summary.get_or_insert_with(Summary::default);
        summary.finalizing = false;

        match result {
            Ok(workout) => {
                info!(duration = workout.duration_seconds, "workout finalized");
                summary.workout = Some(workout);
                Reduction::Applied(vec![])
            }
            Err(error) => {
                warn!(%error, "workout could not be finalized");
                summary.workout = None;
                Reduction::Applied(vec![Effect::Notify(SessionError::FinalizeFailed(error))])
            }
        }
    }

    fn query_failed(query: Query, source: ProviderError) -> Reduction {
        warn!(%query, error = %source, "poll query failed");
        Reduction::Applied(vec![Effect::Notify(SessionError::QueryFailed {
            query,
            source,
        })])
    }
}

//! In-process provider that fakes a sensor session.
//!
//! Every sample interval stands for one second of activity: distance,
//! heart rate and energy advance with some noise while the session is
//! running. Control requests are acknowledged by emitting state changes on
//! the event stream, just like a real tracking service would.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use rand::Rng;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::activity::ActivityType;
use crate::lifecycle::ProviderState;
use crate::provider::{EventStream, ProviderError, ProviderEvent, WorkoutProvider, WorkoutSummary};
use crate::statistics::StatisticsField;
use crate::util::mean;

const EVENT_CAPACITY: usize = 128;

/// Typical figures for an activity
#[derive(Debug, Clone, Copy)]
struct Profile {
    /// meters/second
    speed: f64,
    heart_rate: f64,
    kcal_per_second: f64,
    /// steps/minute
    cadence: f64,
}

impl Profile {
    fn for_activity(activity: ActivityType) -> Self {
        match activity {
            ActivityType::Running => Profile {
                speed: 3.3,
                heart_rate: 152.0,
                kcal_per_second: 0.19,
                cadence: 168.0,
            },
            ActivityType::Cycling => Profile {
                speed: 7.5,
                heart_rate: 138.0,
                kcal_per_second: 0.15,
                cadence: 0.0,
            },
            ActivityType::Walking => Profile {
                speed: 1.4,
                heart_rate: 102.0,
                kcal_per_second: 0.07,
                cadence: 112.0,
            },
            ActivityType::Hiking => Profile {
                speed: 1.1,
                heart_rate: 118.0,
                kcal_per_second: 0.1,
                cadence: 96.0,
            },
            ActivityType::Swimming => Profile {
                speed: 0.8,
                heart_rate: 130.0,
                kcal_per_second: 0.13,
                cadence: 0.0,
            },
        }
    }
}

#[derive(Debug)]
struct SimState {
    activity: ActivityType,
    state: ProviderState,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    running_seconds: u64,
    distance: f64,
    energy: f64,
    heart_rates: Vec<f64>,
    sampler: Option<CancellationToken>,
}

impl SimState {
    fn idle() -> Self {
        Self {
            activity: ActivityType::default(),
            state: ProviderState::NotStarted,
            started_at: None,
            ended_at: None,
            running_seconds: 0,
            distance: 0.0,
            energy: 0.0,
            heart_rates: vec![],
            sampler: None,
        }
    }

    /// Advance one simulated second and report the updated channels
    fn sample(&mut self) -> Vec<StatisticsField> {
        let profile = Profile::for_activity(self.activity);
        let mut rng = rand::thread_rng();

        self.running_seconds += 1;
        self.distance += profile.speed * rng.gen_range(0.9..1.1);
        self.energy += profile.kcal_per_second * rng.gen_range(0.95..1.05);
        let heart_rate = (profile.heart_rate + rng.gen_range(-6.0..6.0)).round();
        self.heart_rates.push(heart_rate);

        vec![
            StatisticsField::HeartRate(heart_rate),
            StatisticsField::AverageHeartRate(mean(&self.heart_rates).unwrap_or(heart_rate)),
            StatisticsField::ActiveEnergy(self.energy),
            StatisticsField::Distance(self.distance),
        ]
    }

    fn steps(&self) -> u64 {
        let profile = Profile::for_activity(self.activity);
        (profile.cadence * self.running_seconds as f64 / 60.0) as u64
    }
}

pub struct SimulatedProvider {
    state: Arc<Mutex<SimState>>,
    events: broadcast::Sender<ProviderEvent>,
    sample_interval: Duration,
}

impl SimulatedProvider {
    pub fn new(sample_interval: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(SimState::idle())),
            events,
            sample_interval,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }

    fn set_state(&self, sim: &mut SimState, state: ProviderState) {
        debug!(from = ?sim.state, to = ?state, "simulated state change");
        sim.state = state;
        self.emit(ProviderEvent::StateChanged(state));
    }

    fn spawn_sampler(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let period = self.sample_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        let fields = {
                            let mut sim = state.lock().unwrap_or_else(PoisonError::into_inner);
                            if sim.state != ProviderState::Running {
                                continue;
                            }
                            sim.sample()
                        };
                        for field in fields {
                            let _ = events.send(ProviderEvent::StatisticsUpdated(field));
                        }
                    }
                }
            }
        });

        token
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl WorkoutProvider for SimulatedProvider {
    async fn start_session(&self, activity: ActivityType) -> Result<(), ProviderError> {
        let mut sim = self.lock();
        if matches!(sim.state, ProviderState::Running | ProviderState::Paused) {
            return Err(ProviderError::Unavailable(
                "a tracking session is already active".into(),
            ));
        }

        *sim = SimState::idle();
        sim.activity = activity;
        sim.started_at = Some(Utc::now());
        sim.sampler = Some(self.spawn_sampler());
        self.set_state(&mut sim, ProviderState::Running);
        Ok(())
    }

    async fn request_pause(&self) -> Result<(), ProviderError> {
        let mut sim = self.lock();
        match sim.state {
            ProviderState::Running => {
                self.set_state(&mut sim, ProviderState::Paused);
                Ok(())
            }
            ProviderState::Paused => Ok(()),
            _ => Err(ProviderError::NoSession),
        }
    }

    async fn request_resume(&self) -> Result<(), ProviderError> {
        let mut sim = self.lock();
        match sim.state {
            ProviderState::Paused => {
                self.set_state(&mut sim, ProviderState::Running);
                Ok(())
            }
            ProviderState::Running => Ok(()),
            _ => Err(ProviderError::NoSession),
        }
    }

    async fn request_end(&self) -> Result<(), ProviderError> {
        let mut sim = self.lock();
        if !matches!(sim.state, ProviderState::Running | ProviderState::Paused) {
            return Err(ProviderError::NoSession);
        }

        if let Some(sampler) = sim.sampler.take() {
            sampler.cancel();
        }
        sim.ended_at = Some(Utc::now());
        self.set_state(&mut sim, ProviderState::Ended);
        Ok(())
    }

    fn event_stream(&self, _activity: ActivityType) -> EventStream {
        // subscribe before reading the current state so nothing falls in between
        let live = BroadcastStream::new(self.events.subscribe())
            .filter_map(|event| futures::future::ready(event.ok()));
        let current = ProviderEvent::StateChanged(self.lock().state);

        futures::stream::once(futures::future::ready(current))
            .chain(live)
            .boxed()
    }

    async fn query_step_count(&self, _since: DateTime<Utc>) -> Result<u64, ProviderError> {
        let sim = self.lock();
        if sim.started_at.is_none() {
            return Err(ProviderError::NoSession);
        }
        if !sim.activity.counts_steps() {
            return Err(ProviderError::NoData);
        }
        Ok(sim.steps())
    }

    async fn query_average_speed(&self, _since: DateTime<Utc>) -> Result<f64, ProviderError> {
        let sim = self.lock();
        if sim.started_at.is_none() {
            return Err(ProviderError::NoSession);
        }
        match sim.running_seconds {
            0 => Err(ProviderError::NoData),
            seconds => Ok(sim.distance / seconds as f64),
        }
    }

    async fn finalize_session(&self) -> Result<WorkoutSummary, ProviderError> {
        let sim = self.lock();
        let (Some(start_date), Some(end_date)) = (sim.started_at, sim.ended_at) else {
            return Err(ProviderError::Failed("session has not ended".into()));
        };

        Ok(WorkoutSummary {
            activity_type: sim.activity,
            start_date,
            end_date,
            duration_seconds: sim.running_seconds,
            total_distance: sim.distance,
            total_energy: sim.energy,
            average_heart_rate: mean(&sim.heart_rates).unwrap_or(0.0),
        })
    }
}

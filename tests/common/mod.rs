// Shared fixtures for the orchestrator integration tests.
// ScriptedProvider hands out one channel-backed stream per `event_stream`
// call so a test can push events into a specific subscription.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;

use stride::runtime::FixedTicker;
use stride::workout::WorkoutConfig;
use stride::{
    ActivityType, EventStream, Notification, OrchestratorConfig, ProviderError, ProviderEvent,
    ProviderState, Workout, WorkoutProvider, WorkoutSummary,
};

pub const WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Start(ActivityType),
    Pause,
    Resume,
    End,
    Stream(ActivityType),
    Steps,
    Speed,
    Finalize,
}

struct Script {
    streams: Vec<mpsc::UnboundedSender<ProviderEvent>>,
    start: Result<(), ProviderError>,
    requests: Result<(), ProviderError>,
    steps: Result<u64, ProviderError>,
    speed: Result<f64, ProviderError>,
    finalize: Result<WorkoutSummary, ProviderError>,
    start_delay: Option<Duration>,
    starts_in_flight: usize,
    max_starts_in_flight: usize,
    calls: Vec<Call>,
}

pub struct ScriptedProvider {
    script: Mutex<Script>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script {
                streams: vec![],
                start: Ok(()),
                requests: Ok(()),
                steps: Ok(0),
                speed: Ok(0.0),
                finalize: Ok(summary(ActivityType::Running)),
                start_delay: None,
                starts_in_flight: 0,
                max_starts_in_flight: 0,
                calls: vec![],
            }),
        })
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    pub fn fail_start(&self, error: ProviderError) {
        self.script().start = Err(error);
    }

    pub fn fail_requests(&self, error: ProviderError) {
        self.script().requests = Err(error);
    }

    pub fn set_steps(&self, steps: Result<u64, ProviderError>) {
        self.script().steps = steps;
    }

    pub fn set_speed(&self, speed: Result<f64, ProviderError>) {
        self.script().speed = speed;
    }

    pub fn set_finalize(&self, finalize: Result<WorkoutSummary, ProviderError>) {
        self.script().finalize = finalize;
    }

    /// Make every `start_session` take this long to answer
    pub fn delay_start(&self, delay: Duration) {
        self.script().start_delay = Some(delay);
    }

    /// Most `start_session` calls ever outstanding at once
    pub fn max_starts_in_flight(&self) -> usize {
        self.script().max_starts_in_flight
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script().calls.clone()
    }

    pub fn stream_count(&self) -> usize {
        self.script().streams.len()
    }

    /// Push an event into the stream handed out by the `index`th
    /// `event_stream` call. Returns false once that stream was dropped.
    pub fn emit(&self, index: usize, event: ProviderEvent) -> bool {
        self.script().streams[index].send(event).is_ok()
    }

    pub fn emit_state(&self, index: usize, state: ProviderState) -> bool {
        self.emit(index, ProviderEvent::StateChanged(state))
    }

    pub fn is_stream_closed(&self, index: usize) -> bool {
        self.script().streams[index].is_closed()
    }

    pub async fn wait_for_streams(&self, count: usize) {
        tokio::time::timeout(WAIT, async {
            while self.stream_count() < count {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("provider stream was never requested");
    }

    pub async fn wait_for_stream_closed(&self, index: usize) {
        tokio::time::timeout(WAIT, async {
            while !self.is_stream_closed(index) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("provider stream was never released");
    }

    fn record(&self, call: Call) {
        self.script().calls.push(call);
    }
}

#[async_trait]
impl WorkoutProvider for ScriptedProvider {
    async fn start_session(&self, activity: ActivityType) -> Result<(), ProviderError> {
        self.record(Call::Start(activity));
        let delay = {
            let mut script = self.script();
            script.starts_in_flight += 1;
            script.max_starts_in_flight = script.max_starts_in_flight.max(script.starts_in_flight);
            script.start_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut script = self.script();
        script.starts_in_flight -= 1;
        script.start.clone()
    }

    async fn request_pause(&self) -> Result<(), ProviderError> {
        self.record(Call::Pause);
        self.script().requests.clone()
    }

    async fn request_resume(&self) -> Result<(), ProviderError> {
        self.record(Call::Resume);
        self.script().requests.clone()
    }

    async fn request_end(&self) -> Result<(), ProviderError> {
        self.record(Call::End);
        self.script().requests.clone()
    }

    fn event_stream(&self, activity: ActivityType) -> EventStream {
        self.record(Call::Stream(activity));
        let (tx, rx) = mpsc::unbounded_channel();
        self.script().streams.push(tx);
        UnboundedReceiverStream::new(rx).boxed()
    }

    async fn query_step_count(&self, _since: DateTime<Utc>) -> Result<u64, ProviderError> {
        self.record(Call::Steps);
        self.script().steps.clone()
    }

    async fn query_average_speed(&self, _since: DateTime<Utc>) -> Result<f64, ProviderError> {
        self.record(Call::Speed);
        self.script().speed.clone()
    }

    async fn finalize_session(&self) -> Result<WorkoutSummary, ProviderError> {
        self.record(Call::Finalize);
        self.script().finalize.clone()
    }
}

pub fn summary(activity_type: ActivityType) -> WorkoutSummary {
    let start_date = Utc::now();
    WorkoutSummary {
        activity_type,
        start_date,
        end_date: start_date + chrono::Duration::seconds(5),
        duration_seconds: 5,
        total_distance: 1200.0,
        total_energy: 80.0,
        average_heart_rate: 140.0,
    }
}

/// One tick per second of (paused) test time, no polling unless asked for
pub fn config() -> OrchestratorConfig {
    OrchestratorConfig {
        workout: WorkoutConfig {
            poll: stride::poller::PollSchedule {
                warmup_secs: 0,
                interval_secs: 0,
            },
            ..WorkoutConfig::default()
        },
        ticker: FixedTicker::new(Duration::from_secs(1)),
        queue_capacity: 16,
    }
}

/// Wait until the published workout satisfies `pred`
pub async fn wait_until<F>(view: &mut watch::Receiver<Option<Workout>>, mut pred: F) -> Workout
where
    F: FnMut(&Workout) -> bool,
{
    let current = tokio::time::timeout(
        WAIT,
        view.wait_for(|workout| workout.as_ref().is_some_and(&mut pred)),
    )
    .await
    .expect("timed out waiting for workout state")
    .expect("orchestrator stopped");
    (*current).clone().unwrap()
}

pub async fn next_notification(rx: &mut broadcast::Receiver<Notification>) -> Notification {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for notification")
        .expect("notification channel closed")
}

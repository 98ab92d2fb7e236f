//! Workout session orchestrator.
//!
//! A single task owns the live [`Workout`] and applies every event from one
//! bounded queue: provider stream events, clock ticks, poll results and
//! user commands. Producers run concurrently; only application is
//! serialized. After each applied event the new state is published on a
//! `watch` channel, so readers always see a whole transition.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::activity::ActivityType;
use crate::error::{Notification, OrchestratorError, Request, SessionError};
use crate::lifecycle::SessionStatus;
use crate::poller;
use crate::provider::WorkoutProvider;
use crate::runtime::{Clock, Command, FixedTicker, SessionEvent};
use crate::subscription::Subscription;
use crate::workout::{Action, Effect, Reduction, Workout, WorkoutConfig};

const NOTIFICATION_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorConfig {
    pub workout: WorkoutConfig,
    pub ticker: FixedTicker,
    /// Bound of the event queue shared by all producers
    pub queue_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workout: WorkoutConfig::default(),
            ticker: FixedTicker::default(),
            queue_capacity: 64,
        }
    }
}

/// Client side of a running orchestrator.
///
/// Control requests (`pause`, `resume`, `end`) go straight to the provider;
/// their effect on the session only shows once the provider reports the
/// new state through the observed stream.
pub struct OrchestratorHandle {
    provider: Arc<dyn WorkoutProvider>,
    queue: mpsc::Sender<SessionEvent>,
    view: watch::Receiver<Option<Workout>>,
    notifications: broadcast::Sender<Notification>,
    /// Held across the provider call so starts reach it one at a time
    starting: Mutex<()>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// Spawn the orchestrator task on the current tokio runtime.
pub fn spawn(provider: Arc<dyn WorkoutProvider>, config: OrchestratorConfig) -> OrchestratorHandle {
    let (queue, events) = mpsc::channel(config.queue_capacity.max(1));
    let (view_tx, view) = watch::channel(None);
    let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
    let shutdown = CancellationToken::new();

    let orchestrator = Orchestrator {
        provider: Arc::clone(&provider),
        config,
        workout: None,
        session_generation: 0,
        clock: None,
        clock_generation: 0,
        subscription: None,
        subscription_generation: 0,
        queue: queue.clone(),
        view: view_tx,
        notifications: notifications.clone(),
    };
    let task = tokio::spawn(orchestrator.run(events, shutdown.clone()));

    OrchestratorHandle {
        provider,
        queue,
        view,
        notifications,
        starting: Mutex::new(()),
        shutdown,
        task,
    }
}

impl OrchestratorHandle {
    /// Ask the provider to start a session of the given kind. Status stays
    /// `NotStarted` until the provider reports `Running`.
    ///
    /// Concurrent calls are serialized. A session the provider has not yet
    /// reported as running does not block another start; the later start
    /// replaces it and the provider decides whether to accept it.
    pub async fn start(&self, activity: ActivityType) -> Result<(), OrchestratorError> {
        let _starting = self.starting.lock().await;
        let live = self
            .view
            .borrow()
            .as_ref()
            .filter(|workout| workout.status().is_live())
            .map(|workout| workout.session().activity_type());
        if let Some(current) = live {
            return Err(SessionError::SessionInProgress(current).into());
        }

        if let Err(source) = self.provider.start_session(activity).await {
            let error = SessionError::StartFailed { activity, source };
            warn!(%error, "provider refused to start");
            self.notify(error.clone());
            return Err(error.into());
        }

        info!(%activity, "provider session started");
        self.send(Command::Select(activity)).await
    }

    /// Subscribe to the provider's event stream, cancelling any earlier
    /// subscription first.
    pub async fn observe(&self) -> Result<(), OrchestratorError> {
        self.send(Command::Observe).await
    }

    pub async fn pause(&self) -> Result<(), OrchestratorError> {
        self.request(Request::Pause).await
    }

    pub async fn resume(&self) -> Result<(), OrchestratorError> {
        self.request(Request::Resume).await
    }

    pub async fn end(&self) -> Result<(), OrchestratorError> {
        self.request(Request::End).await
    }

    /// Pause when running, resume otherwise
    pub async fn toggle_pause(&self) -> Result<(), OrchestratorError> {
        match self.status() {
            Some(SessionStatus::Running) => self.pause().await,
            _ => self.resume().await,
        }
    }

    /// Close the summary of an ended session and discard it
    pub async fn dismiss_summary(&self) -> Result<(), OrchestratorError> {
        self.send(Command::DismissSummary).await
    }

    /// Latest published state; `None` when no session exists
    pub fn snapshot(&self) -> Option<Workout> {
        self.view.borrow().clone()
    }

    pub fn status(&self) -> Option<SessionStatus> {
        self.view.borrow().as_ref().map(Workout::status)
    }

    /// Receiver notified after every applied transition
    pub fn watch(&self) -> watch::Receiver<Option<Workout>> {
        self.view.clone()
    }

    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Stop the orchestrator, releasing its clock and subscription
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(error) = self.task.await {
            warn!(%error, "orchestrator task did not shut down cleanly");
        }
    }

    async fn request(&self, request: Request) -> Result<(), OrchestratorError> {
        debug!(%request, "forwarding request to provider");
        let result = match request {
            Request::Pause => self.provider.request_pause().await,
            Request::Resume => self.provider.request_resume().await,
            Request::End => self.provider.request_end().await,
        };

        result.map_err(|source| {
            let error = SessionError::RequestFailed { request, source };
            warn!(%error, "provider request failed");
            self.notify(error.clone());
            error.into()
        })
    }

    async fn send(&self, command: Command) -> Result<(), OrchestratorError> {
        self.queue
            .send(SessionEvent::Command(command))
            .await
            .map_err(|_| OrchestratorError::Stopped)
    }

    fn notify(&self, error: SessionError) {
        let _ = self.notifications.send(Notification::now(error));
    }
}

struct Orchestrator {
    provider: Arc<dyn WorkoutProvider>,
    config: OrchestratorConfig,
    workout: Option<Workout>,
    session_generation: u64,
    clock: Option<Clock>,
    clock_generation: u64,
    subscription: Option<Subscription>,
    subscription_generation: u64,
    queue: mpsc::Sender<SessionEvent>,
    view: watch::Sender<Option<Workout>>,
    notifications: broadcast::Sender<Notification>,
}

impl Orchestrator {
    async fn run(mut self, mut events: mpsc::Receiver<SessionEvent>, shutdown: CancellationToken) {
        debug!("orchestrator running");

        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.handle(event);
        }

        self.release();
        debug!("orchestrator stopped");
    }

    fn handle(&mut self, event: SessionEvent) {
        let action = match event {
            SessionEvent::Command(command) => {
                self.on_command(command);
                return;
            }
            SessionEvent::Provider {
                subscription,
                event,
            } => {
                if self.subscription.as_ref().map(Subscription::id) != Some(subscription) {
                    debug!(subscription, "dropping event from superseded subscription");
                    return;
                }
                Action::from(event)
            }
            SessionEvent::Tick { clock } => {
                if self.clock.as_ref().map(Clock::generation) != Some(clock) {
                    debug!(clock, "dropping tick from stopped clock");
                    return;
                }
                Action::Tick
            }
            SessionEvent::StepsUpdated { session, result } => {
                if !self.is_current_session(session) {
                    return;
                }
                Action::StepsUpdated(result)
            }
            SessionEvent::SpeedUpdated { session, result } => {
                if !self.is_current_session(session) {
                    return;
                }
                Action::SpeedUpdated(result)
            }
            SessionEvent::Finalized { session, result } => {
                if !self.is_current_session(session) {
                    return;
                }
                Action::Finalized(result)
            }
        };

        let Some(workout) = self.workout.as_mut() else {
            debug!(?action, "no session; action dropped");
            return;
        };

        if let Reduction::Applied(effects) = workout.apply(action, Utc::now()) {
            self.publish();
            for effect in effects {
                self.run_effect(effect);
            }
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Select(activity) => {
                if let Some(current) = self.workout.as_ref().filter(|w| w.status().is_live()) {
                    let activity = current.session().activity_type();
                    self.notify(SessionError::SessionInProgress(activity));
                    return;
                }

                self.release();
                self.session_generation += 1;
                self.workout = Some(Workout::new(activity, self.config.workout));
                info!(%activity, session = self.session_generation, "new session");
                self.publish();
            }
            Command::Observe => {
                let Some(activity) = self.workout.as_ref().map(|w| w.session().activity_type())
                else {
                    self.notify(SessionError::NoActiveSession);
                    return;
                };

                if let Some(previous) = self.subscription.take() {
                    debug!(subscription = previous.id(), "cancelling previous observation");
                    previous.cancel();
                }

                self.subscription_generation += 1;
                let stream = self.provider.event_stream(activity);
                self.subscription = Some(Subscription::spawn(
                    self.subscription_generation,
                    stream,
                    self.queue.clone(),
                    |id, reason| debug!(subscription = id, ?reason, "observation terminated"),
                ));
                info!(subscription = self.subscription_generation, %activity, "observing provider");
            }
            Command::DismissSummary => {
                if self.workout.as_ref().map(Workout::status) != Some(SessionStatus::Ended) {
                    debug!("no ended session to dismiss");
                    return;
                }

                self.release();
                self.workout = None;
                info!("summary dismissed");
                self.publish();
            }
        }
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::StartClock => {
                self.clock_generation += 1;
                if let Some(previous) = self.clock.take() {
                    previous.cancel();
                }
                self.clock = Some(Clock::start(
                    self.clock_generation,
                    &self.config.ticker,
                    self.queue.clone(),
                ));
            }
            Effect::StopClock => {
                if let Some(clock) = self.clock.take() {
                    clock.cancel();
                }
            }
            Effect::StopObserving => {
                if let Some(subscription) = self.subscription.take() {
                    debug!(subscription = subscription.id(), "session over, releasing stream");
                    subscription.cancel();
                }
            }
            Effect::Poll { since } => poller::spawn_queries(
                Arc::clone(&self.provider),
                since,
                self.session_generation,
                self.queue.clone(),
            ),
            Effect::Finalize => {
                let provider = Arc::clone(&self.provider);
                let queue = self.queue.clone();
                let session = self.session_generation;
                tokio::spawn(async move {
                    let result = provider.finalize_session().await;
                    let _ = queue.send(SessionEvent::Finalized { session, result }).await;
                });
            }
            Effect::Notify(error) => self.notify(error),
        }
    }

    fn is_current_session(&self, session: u64) -> bool {
        let current = session == self.session_generation;
        if !current {
            debug!(session, "dropping result for a previous session");
        }
        current
    }

    /// Stop the clock and the stream subscription
    fn release(&mut self) {
        if let Some(clock) = self.clock.take() {
            clock.cancel();
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }

    fn publish(&self) {
        self.view.send_replace(self.workout.clone());
    }

    fn notify(&self, error: SessionError) {
        warn!(%error, "session notification");
        let _ = self.notifications.send(Notification::now(error));
    }
}

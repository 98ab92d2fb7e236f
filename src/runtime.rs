use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::activity::ActivityType;
use crate::provider::{ProviderError, ProviderEvent, WorkoutSummary};

/// User intent routed through the orchestrator queue
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Provider accepted a start; replace any finished session with a new one
    Select(ActivityType),
    /// Subscribe to the provider stream, superseding any earlier subscription
    Observe,
    DismissSummary,
}

/// Unified event type consumed by the orchestrator loop.
///
/// Producers (provider stream, clock, queries) run concurrently; their
/// output is applied one event at a time in arrival order. Events carry the
/// generation of the producer that emitted them so superseded producers can
/// be recognised and dropped.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    Command(Command),
    Provider {
        subscription: u64,
        event: ProviderEvent,
    },
    Tick {
        clock: u64,
    },
    StepsUpdated {
        session: u64,
        result: Result<u64, ProviderError>,
    },
    SpeedUpdated {
        session: u64,
        result: Result<f64, ProviderError>,
    },
    Finalized {
        session: u64,
        result: Result<WorkoutSummary, ProviderError>,
    },
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for FixedTicker {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// A running periodic clock feeding `Tick` events into the queue.
///
/// Stopped explicitly with [`Clock::cancel`]; dropping it also stops it.
#[derive(Debug)]
pub struct Clock {
    generation: u64,
    token: CancellationToken,
}

impl Clock {
    /// Spawn the clock task. The first tick fires one interval from now.
    pub fn start<T: Ticker>(generation: u64, ticker: &T, queue: mpsc::Sender<SessionEvent>) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let period = ticker.interval();

        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        let tick = SessionEvent::Tick { clock: generation };
                        if queue.send(tick).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!(clock = generation, "clock stopped");
        });

        Self { generation, token }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

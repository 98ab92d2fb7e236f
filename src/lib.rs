// Library surface for the binary, integration tests and embedding.
// The orchestrator is the entry point; the rest is its building blocks.
pub mod activity;
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod orchestrator;
pub mod poller;
pub mod provider;
pub mod runtime;
pub mod session;
pub mod simulator;
pub mod split;
pub mod statistics;
pub mod subscription;
pub mod util;
pub mod workout;

pub use activity::ActivityType;
pub use error::{Notification, OrchestratorError, SessionError};
pub use lifecycle::{ProviderState, SessionStatus};
pub use orchestrator::{spawn, OrchestratorConfig, OrchestratorHandle};
pub use provider::{EventStream, ProviderError, ProviderEvent, WorkoutProvider, WorkoutSummary};
pub use workout::Workout;

//! Session lifecycle state machine.
//!
//! ```text
//! NotStarted -> Running <-> Paused
//!               Running | Paused -> Ended
//! ```
//!
//! Status only changes when the provider acknowledges a state change; user
//! intent never moves it directly. `Ended` is terminal.

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    NotStarted,
    Running,
    Paused,
    Ended,
}

impl SessionStatus {
    /// Started and not yet ended
    pub fn is_live(&self) -> bool {
        matches!(self, SessionStatus::Running | SessionStatus::Paused)
    }
}

/// Session state as reported by the provider. Richer than `SessionStatus`;
/// several provider states collapse onto the same status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderState {
    NotStarted,
    Prepared,
    Running,
    Paused,
    Stopped,
    Ended,
    Unknown,
}

/// Outcome of feeding one provider state into the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First `Running`; the clock starts and the start date is recorded
    Started,
    Resumed,
    Paused,
    /// Terminal; the clock stops for good and the session is finalised
    Ended,
    /// No status change
    Ignored,
}

impl Transition {
    /// Status the session holds after this transition, if it changed
    pub fn target(&self) -> Option<SessionStatus> {
        match self {
            Transition::Started | Transition::Resumed => Some(SessionStatus::Running),
            Transition::Paused => Some(SessionStatus::Paused),
            Transition::Ended => Some(SessionStatus::Ended),
            Transition::Ignored => None,
        }
    }
}

pub fn transition(from: SessionStatus, to: ProviderState) -> Transition {
    use ProviderState as P;
    use SessionStatus as S;

    match (from, to) {
        (S::NotStarted, P::Running) => Transition::Started,
        (S::Paused, P::Running) => Transition::Resumed,
        (S::Running, P::Paused) => Transition::Paused,
        (S::Running | S::Paused, P::Ended | P::Stopped) => Transition::Ended,
        _ => Transition::Ignored,
    }
}

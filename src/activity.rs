use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Kind of workout being tracked. Fixed for the lifetime of a session.
#[derive(
    Debug,
    Default,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActivityType {
    #[default]
    Running,
    Cycling,
    Walking,
    Hiking,
    Swimming,
}

impl ActivityType {
    /// Activities offered on the start screen, in display order
    pub const SELECTABLE: [ActivityType; 3] = [
        ActivityType::Cycling,
        ActivityType::Running,
        ActivityType::Walking,
    ];

    /// Whether the step count is meaningful for this activity
    pub fn counts_steps(&self) -> bool {
        matches!(
            self,
            ActivityType::Running | ActivityType::Walking | ActivityType::Hiking
        )
    }
}

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::activity::ActivityType;
use crate::app_dirs::AppDirs;
use crate::orchestrator::OrchestratorConfig;
use crate::poller::PollSchedule;
use crate::runtime::FixedTicker;
use crate::split::SplitUnit;
use crate::workout::WorkoutConfig;

/// Persisted settings. Missing keys fall back to their defaults so older
/// files keep loading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub split_unit_meters: f64,
    pub tick_interval_ms: u64,
    pub poll_warmup_secs: u64,
    pub poll_interval_secs: u64,
    pub queue_capacity: usize,
    pub default_activity: ActivityType,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            split_unit_meters: SplitUnit::KILOMETER.meters(),
            tick_interval_ms: 1000,
            poll_warmup_secs: 5,
            poll_interval_secs: 5,
            queue_capacity: 64,
            default_activity: ActivityType::Running,
        }
    }
}

impl Config {
    pub fn split_unit(&self) -> SplitUnit {
        SplitUnit::new(self.split_unit_meters).unwrap_or_else(|| {
            warn!(
                meters = self.split_unit_meters,
                "invalid split unit, using 1 km"
            );
            SplitUnit::default()
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl From<&Config> for OrchestratorConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            workout: WorkoutConfig {
                split_unit: cfg.split_unit(),
                poll: PollSchedule {
                    warmup_secs: cfg.poll_warmup_secs,
                    interval_secs: cfg.poll_interval_secs,
                },
            },
            ticker: FixedTicker::new(cfg.tick_interval()),
            queue_capacity: cfg.queue_capacity.max(1),
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            debug!(path = %self.path.display(), "no config file, using defaults");
            return Config::default();
        };
        serde_json::from_slice::<Config>(&bytes).unwrap_or_else(|error| {
            warn!(path = %self.path.display(), %error, "unreadable config, using defaults");
            Config::default()
        })
    }

    fn save(&self, cfg: &Config) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(io::Error::other)?;
        fs::write(&self.path, data)
    }
}

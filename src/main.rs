use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

use stride::config::{Config, ConfigStore, FileConfigStore};
use stride::simulator::SimulatedProvider;
use stride::workout::Workout;
use stride::{ActivityType, OrchestratorConfig, SessionStatus};

/// live workout tracking against a simulated sensor session
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Runs a workout session against a simulated tracking provider, printing live statistics, split pace and cadence every second and a summary once the session ends."
)]
pub struct Cli {
    /// kind of workout (defaults to the configured activity)
    #[clap(short = 'a', long, value_enum)]
    activity: Option<ActivityType>,

    /// running seconds before the workout is ended
    #[clap(short = 'd', long, default_value_t = 30)]
    duration: u64,

    /// milliseconds of wall time per simulated second
    #[clap(short = 't', long)]
    tick_ms: Option<u64>,

    /// split length in meters
    #[clap(short = 's', long)]
    split_unit: Option<f64>,

    /// pause once this many running seconds have elapsed
    #[clap(long)]
    pause_at: Option<u64>,

    /// simulated seconds to stay paused
    #[clap(long, default_value_t = 3)]
    pause_for: u32,

    /// print one JSON document per update instead of text
    #[clap(long)]
    json: bool,

    /// config file to use instead of the per-user one
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// write the effective settings back to the config file
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    /// Overlay command line overrides on the loaded settings
    fn apply(&self, mut cfg: Config) -> Config {
        if let Some(activity) = self.activity {
            cfg.default_activity = activity;
        }
        if let Some(tick_ms) = self.tick_ms {
            cfg.tick_interval_ms = tick_ms;
        }
        if let Some(split_unit) = self.split_unit {
            cfg.split_unit_meters = split_unit;
        }
        cfg
    }

    fn store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let store = cli.store();
    let cfg = cli.apply(store.load());
    if cli.save_config {
        store
            .save(&cfg)
            .with_context(|| format!("writing config to {}", store.path().display()))?;
        info!(path = %store.path().display(), "config saved");
    }

    let activity = cfg.default_activity;
    let tick = cfg.tick_interval();
    let provider = Arc::new(SimulatedProvider::new(tick));
    let handle = stride::spawn(provider, OrchestratorConfig::from(&cfg));
    let mut view = handle.watch();
    let mut notifications = handle.notifications();

    handle
        .start(activity)
        .await
        .with_context(|| format!("starting {activity} workout"))?;
    handle.observe().await?;

    let mut last_printed: Option<(SessionStatus, u64)> = None;
    let mut paused_once = false;
    let mut end_requested = false;
    let mut resume_at: Option<Instant> = None;

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let Some(workout) = view.borrow_and_update().clone() else {
                    continue;
                };

                let status = workout.status();
                let elapsed = workout.session().elapsed_seconds;
                if last_printed != Some((status, elapsed)) {
                    last_printed = Some((status, elapsed));
                    print_snapshot(&workout, cli.json)?;
                }

                match status {
                    SessionStatus::Running
                        if !paused_once && cli.pause_at.is_some_and(|at| elapsed >= at) =>
                    {
                        paused_once = true;
                        handle.pause().await?;
                        resume_at = Some(Instant::now() + tick * cli.pause_for);
                    }
                    SessionStatus::Running if !end_requested && elapsed >= cli.duration => {
                        end_requested = true;
                        handle.end().await?;
                    }
                    SessionStatus::Ended
                        if workout.summary().is_some_and(|summary| !summary.finalizing) =>
                    {
                        print_summary(&workout, cli.json)?;
                        break;
                    }
                    _ => {}
                }
            }
            _ = sleep_until(resume_at.unwrap_or_else(Instant::now)), if resume_at.is_some() => {
                resume_at = None;
                handle.resume().await?;
            }
            notification = notifications.recv() => match notification {
                Ok(notification) => eprintln!("! {}", notification.error),
                Err(RecvError::Lagged(missed)) => warn!(missed, "notifications dropped"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.dismiss_summary().await?;
    handle.shutdown().await;
    Ok(())
}

fn print_snapshot(workout: &Workout, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(workout)?);
        return Ok(());
    }

    let stats = workout.statistics();
    let metrics = workout.metrics();
    println!(
        "{:<8} {}  {:>8.1} m  {:>3.0} bpm  {:>6.1} kcal  pace {}  split {} {}  {:>3.0} spm",
        workout.status().to_string(),
        clock(metrics.elapsed_seconds),
        stats.distance,
        stats.heart_rate,
        stats.active_energy,
        pace(metrics.average_pace),
        workout.split().current_split_index + 1,
        pace(metrics.split_pace),
        metrics.cadence,
    );
    Ok(())
}

fn print_summary(workout: &Workout, json: bool) -> Result<()> {
    let finished = workout.summary().and_then(|summary| summary.workout.as_ref());

    if json {
        println!("{}", serde_json::to_string(&finished)?);
        return Ok(());
    }

    let Some(summary) = finished else {
        println!("workout ended; the summary could not be saved");
        return Ok(());
    };
    println!(
        "{} finished: {} over {:.2} km, {:.0} kcal, avg {:.0} bpm",
        summary.activity_type,
        clock(summary.duration_seconds),
        summary.total_distance / 1000.0,
        summary.total_energy,
        summary.average_heart_rate,
    );
    for split in &workout.split().completed {
        println!(
            "  split {:>2}  {}  {}",
            split.index + 1,
            clock(split.elapsed_seconds),
            pace(split.pace)
        );
    }
    Ok(())
}

/// `mm:ss`, or `h:mm:ss` past the hour
fn clock(seconds: u64) -> String {
    let (hours, minutes, seconds) = (seconds / 3600, seconds / 60 % 60, seconds % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// seconds per kilometer as `m:ss/km`
fn pace(seconds_per_km: f64) -> String {
    if seconds_per_km <= 0.0 || !seconds_per_km.is_finite() {
        return "-:--/km".to_string();
    }
    let total = seconds_per_km.round() as u64;
    format!("{}:{:02}/km", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["stride"]);

        assert_eq!(cli.activity, None);
        assert_eq!(cli.duration, 30);
        assert_eq!(cli.tick_ms, None);
        assert_eq!(cli.split_unit, None);
        assert_eq!(cli.pause_at, None);
        assert_eq!(cli.pause_for, 3);
        assert!(!cli.json);
        assert!(!cli.save_config);
    }

    #[test]
    fn test_cli_activity() {
        let cli = Cli::parse_from(["stride", "-a", "cycling"]);
        assert_eq!(cli.activity, Some(ActivityType::Cycling));

        let cli = Cli::parse_from(["stride", "--activity", "walking"]);
        assert_eq!(cli.activity, Some(ActivityType::Walking));
    }

    #[test]
    fn test_cli_rejects_unknown_activity() {
        assert!(Cli::try_parse_from(["stride", "--activity", "rowing"]).is_err());
    }

    #[test]
    fn test_cli_timing_flags() {
        let cli = Cli::parse_from([
            "stride",
            "--duration",
            "90",
            "--tick-ms",
            "10",
            "--pause-at",
            "20",
            "--pause-for",
            "5",
        ]);
        assert_eq!(cli.duration, 90);
        assert_eq!(cli.tick_ms, Some(10));
        assert_eq!(cli.pause_at, Some(20));
        assert_eq!(cli.pause_for, 5);
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "stride",
            "-a",
            "hiking",
            "--tick-ms",
            "50",
            "--split-unit",
            "1609.344",
        ]);
        let cfg = cli.apply(Config::default());

        assert_eq!(cfg.default_activity, ActivityType::Hiking);
        assert_eq!(cfg.tick_interval_ms, 50);
        assert_eq!(cfg.split_unit_meters, 1609.344);
        assert_eq!(cfg.poll_interval_secs, Config::default().poll_interval_secs);
    }

    #[test]
    fn test_cli_without_overrides_keeps_config() {
        let cfg = Config {
            tick_interval_ms: 200,
            default_activity: ActivityType::Swimming,
            ..Config::default()
        };
        let cli = Cli::parse_from(["stride"]);
        assert_eq!(cli.apply(cfg.clone()), cfg);
    }

    #[test]
    fn test_clock_format() {
        assert_eq!(clock(0), "00:00");
        assert_eq!(clock(75), "01:15");
        assert_eq!(clock(3725), "1:02:05");
    }

    #[test]
    fn test_pace_format() {
        assert_eq!(pace(300.0), "5:00/km");
        assert_eq!(pace(299.6), "5:00/km");
        assert_eq!(pace(0.0), "-:--/km");
        assert_eq!(pace(f64::NAN), "-:--/km");
    }
}

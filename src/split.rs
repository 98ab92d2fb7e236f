//! Split boundary detection and pace/cadence figures.
//!
//! A split is a fixed-distance segment of the workout. The boundary counter
//! is `floor(distance / unit)`, so it follows the cumulative distance signal
//! but never moves backwards when that signal dips.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::util::{sanitize, seconds_per_km};

/// Distance covered by one split, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SplitUnit(f64);

impl SplitUnit {
    pub const KILOMETER: SplitUnit = SplitUnit(1000.0);

    /// Returns `None` unless `meters` is a finite positive distance.
    pub fn new(meters: f64) -> Option<Self> {
        (meters.is_finite() && meters > 0.0).then_some(Self(meters))
    }

    pub fn meters(&self) -> f64 {
        self.0
    }

    /// Index of the split that `distance` falls in
    pub fn index_for(&self, distance: f64) -> u64 {
        (sanitize(distance) / self.0).floor() as u64
    }
}

impl Default for SplitUnit {
    fn default() -> Self {
        Self::KILOMETER
    }
}

/// A split that has been closed by crossing its boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitRecord {
    pub index: u64,
    pub elapsed_seconds: u64,
    pub distance_meters: f64,
    /// Seconds per kilometer over the split
    pub pace: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitState {
    pub current_split_index: u64,
    pub split_elapsed_seconds: u64,
    pub split_distance_meters: f64,
    /// Cumulative distance at which the current split began
    split_start_distance: f64,
    pub completed: Vec<SplitRecord>,
}

impl SplitState {
    /// One running second has passed inside the current split
    pub fn advance_second(&mut self) {
        self.split_elapsed_seconds += 1;
    }

    /// Feed the latest cumulative distance. Returns the record of the split
    /// that was closed if a boundary was crossed.
    pub fn observe_distance(&mut self, distance: f64, unit: SplitUnit) -> Option<SplitRecord> {
        let distance = sanitize(distance);
        let index = unit.index_for(distance);

        if index <= self.current_split_index {
            self.split_distance_meters = sanitize(distance - self.split_start_distance);
            return None;
        }

        let closed_distance = sanitize(distance - self.split_start_distance);
        let record = SplitRecord {
            index: self.current_split_index,
            elapsed_seconds: self.split_elapsed_seconds,
            distance_meters: closed_distance,
            pace: seconds_per_km(self.split_elapsed_seconds as f64, closed_distance),
        };
        debug!(
            from = self.current_split_index,
            to = index,
            distance,
            "split boundary crossed"
        );

        self.completed.push(record.clone());
        self.current_split_index = index;
        self.split_elapsed_seconds = 0;
        self.split_distance_meters = 0.0;
        self.split_start_distance = distance;

        Some(record)
    }

    /// Seconds per kilometer inside the current split
    pub fn split_pace(&self) -> f64 {
        seconds_per_km(
            self.split_elapsed_seconds as f64,
            self.split_distance_meters,
        )
    }
}

/// Seconds per kilometer over the whole session
pub fn average_pace(elapsed_seconds: u64, distance: f64) -> f64 {
    seconds_per_km(elapsed_seconds as f64, distance)
}

/// Steps per whole elapsed minute; zero during the first minute.
pub fn cadence(steps: u64, elapsed_seconds: u64) -> f64 {
    let minutes = elapsed_seconds / 60;
    if minutes > 0 {
        steps as f64 / minutes as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(meters: f64) -> SplitUnit {
        SplitUnit::new(meters).unwrap()
    }

    #[test]
    fn test_split_unit_rejects_non_positive() {
        assert!(SplitUnit::new(0.0).is_none());
        assert!(SplitUnit::new(-1000.0).is_none());
        assert!(SplitUnit::new(f64::NAN).is_none());
        assert_eq!(SplitUnit::default().meters(), 1000.0);
    }

    #[test]
    fn test_index_for() {
        let km = SplitUnit::KILOMETER;
        assert_eq!(km.index_for(0.0), 0);
        assert_eq!(km.index_for(999.9), 0);
        assert_eq!(km.index_for(1000.0), 1);
        assert_eq!(km.index_for(2500.0), 2);
        assert_eq!(km.index_for(-50.0), 0);
        assert_eq!(unit(10.0).index_for(25.0), 2);
    }

    #[test]
    fn test_crossing_resets_split_counters() {
        let mut split = SplitState::default();
        for _ in 0..240 {
            split.advance_second();
        }
        split.observe_distance(800.0, SplitUnit::KILOMETER);
        assert_eq!(split.split_distance_meters, 800.0);

        let record = split.observe_distance(1005.0, SplitUnit::KILOMETER);

        assert_eq!(split.current_split_index, 1);
        assert_eq!(split.split_elapsed_seconds, 0);
        assert_eq!(split.split_distance_meters, 0.0);
        let record = record.expect("boundary should be reported");
        assert_eq!(record.index, 0);
        assert_eq!(record.elapsed_seconds, 240);
        assert_eq!(record.distance_meters, 1005.0);
    }

    #[test]
    fn test_distance_inside_split_is_relative_to_split_start() {
        let mut split = SplitState::default();
        split.observe_distance(1200.0, SplitUnit::KILOMETER);
        split.observe_distance(1450.0, SplitUnit::KILOMETER);
        assert_eq!(split.current_split_index, 1);
        assert_eq!(split.split_distance_meters, 250.0);
    }

    #[test]
    fn test_split_index_never_decreases() {
        let mut split = SplitState::default();
        let readings = [0.0, 450.0, 1010.0, 990.0, -3.0, f64::NAN, 1500.0, 2001.0, 1999.0];
        let mut last = 0;
        for distance in readings {
            split.observe_distance(distance, SplitUnit::KILOMETER);
            assert!(split.current_split_index >= last);
            last = split.current_split_index;
        }
        assert_eq!(last, 2);
    }

    #[test]
    fn test_jump_over_several_boundaries_records_one_split() {
        let mut split = SplitState::default();
        split.observe_distance(2000.0, SplitUnit::KILOMETER);
        assert_eq!(split.current_split_index, 2);
        assert_eq!(split.completed.len(), 1);
        assert_eq!(split.split_distance_meters, 0.0);
        assert_eq!(split.split_pace(), 0.0);
    }

    #[test]
    fn test_split_pace() {
        let mut split = SplitState::default();
        for _ in 0..150 {
            split.advance_second();
        }
        split.observe_distance(500.0, SplitUnit::KILOMETER);
        assert_eq!(split.split_pace(), 300.0);
    }

    #[test]
    fn test_split_pace_is_zero_without_distance() {
        let mut split = SplitState::default();
        split.advance_second();
        assert_eq!(split.split_pace(), 0.0);
    }

    #[test]
    fn test_average_pace() {
        assert_eq!(average_pace(600, 2000.0), 300.0);
        assert_eq!(average_pace(600, 0.0), 0.0);
        assert_eq!(average_pace(600, f64::NAN), 0.0);
    }

    #[test]
    fn test_cadence_is_zero_in_first_minute() {
        for elapsed in 0..60 {
            assert_eq!(cadence(10_000, elapsed), 0.0);
        }
    }

    #[test]
    fn test_cadence_uses_whole_minutes() {
        assert_eq!(cadence(170, 60), 170.0);
        assert_eq!(cadence(340, 119), 340.0);
        assert_eq!(cadence(340, 120), 170.0);
    }
}

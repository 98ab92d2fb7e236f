use serde::{Deserialize, Serialize};

/// One measurement channel reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum StatisticsField {
    /// Most recent heart rate, beats/min
    HeartRate(f64),
    /// Heart rate averaged over the session, beats/min
    AverageHeartRate(f64),
    /// Cumulative active energy, kcal
    ActiveEnergy(f64),
    /// Cumulative distance, meters
    Distance(f64),
    Steps(u64),
    /// Seconds per kilometer for the current split
    SplitPace(f64),
}

/// Latest known value of every measurement channel.
///
/// Updates overwrite a single field and leave the others untouched, so a
/// channel that stops reporting keeps its last value. Values are stored as
/// reported; consumers sanitise before dividing by them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub heart_rate: f64,
    pub average_heart_rate: f64,
    pub active_energy: f64,
    pub distance: f64,
    pub steps: u64,
    pub split_pace: f64,
    /// Average speed since the session started, meters/second
    pub average_speed: f64,
}

impl StatisticsSnapshot {
    pub fn apply(&mut self, field: StatisticsField) {
        match field {
            StatisticsField::HeartRate(v) => self.apply_heart_rate(v),
            StatisticsField::AverageHeartRate(v) => self.apply_average_heart_rate(v),
            StatisticsField::ActiveEnergy(v) => self.apply_active_energy(v),
            StatisticsField::Distance(v) => self.apply_distance(v),
            StatisticsField::Steps(v) => self.apply_steps(v),
            StatisticsField::SplitPace(v) => self.apply_split_pace(v),
        }
    }

    pub fn apply_heart_rate(&mut self, value: f64) {
        self.heart_rate = value;
    }

    pub fn apply_average_heart_rate(&mut self, value: f64) {
        self.average_heart_rate = value;
    }

    pub fn apply_active_energy(&mut self, value: f64) {
        self.active_energy = value;
    }

    pub fn apply_distance(&mut self, value: f64) {
        self.distance = value;
    }

    pub fn apply_steps(&mut self, value: u64) {
        self.steps = value;
    }

    pub fn apply_split_pace(&mut self, value: f64) {
        self.split_pace = value;
    }

    pub fn apply_average_speed(&mut self, value: f64) {
        self.average_speed = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot_is_zeroed() {
        let snapshot = StatisticsSnapshot::default();
        assert_eq!(snapshot.heart_rate, 0.0);
        assert_eq!(snapshot.distance, 0.0);
        assert_eq!(snapshot.steps, 0);
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let mut snapshot = StatisticsSnapshot::default();
        snapshot.apply(StatisticsField::HeartRate(142.0));
        snapshot.apply(StatisticsField::Distance(850.0));
        snapshot.apply(StatisticsField::ActiveEnergy(61.5));

        snapshot.apply(StatisticsField::HeartRate(150.0));

        assert_eq!(snapshot.heart_rate, 150.0);
        assert_eq!(snapshot.distance, 850.0);
        assert_eq!(snapshot.active_energy, 61.5);
    }

    #[test]
    fn test_reapplying_distance_is_an_overwrite() {
        let mut snapshot = StatisticsSnapshot::default();
        snapshot.apply(StatisticsField::Distance(1200.0));
        let once = snapshot.clone();

        snapshot.apply(StatisticsField::Distance(1200.0));
        assert_eq!(snapshot, once);
    }

    #[test]
    fn test_steps_are_replaced_not_accumulated() {
        let mut snapshot = StatisticsSnapshot::default();
        snapshot.apply_steps(400);
        snapshot.apply_steps(380);
        assert_eq!(snapshot.steps, 380);
    }

    #[test]
    fn test_values_are_stored_unvalidated() {
        let mut snapshot = StatisticsSnapshot::default();
        snapshot.apply(StatisticsField::Distance(-4.0));
        assert_eq!(snapshot.distance, -4.0);
    }

    #[test]
    fn test_field_serializes_tagged() {
        let json = serde_json::to_value(StatisticsField::Steps(12)).unwrap();
        assert_eq!(json["field"], "steps");
        assert_eq!(json["value"], 12);
    }
}

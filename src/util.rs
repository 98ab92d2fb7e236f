/// Clamp a provider measurement to a usable value: NaN, infinities and
/// negatives all become zero.
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Seconds per kilometer for `seconds` spent covering `meters`.
/// Zero when no distance has been covered.
pub fn seconds_per_km(seconds: f64, meters: f64) -> f64 {
    let seconds = sanitize(seconds);
    let meters = sanitize(meters);

    match meters {
        covered if covered > 0.0 => seconds / (covered / 1000.0),
        _ => 0.0,
    }
}

pub fn mean(data: &[f64]) -> Option<f64> {
    let sum = data.iter().sum::<f64>();
    let count = data.len();

    match count {
        positive if positive > 0 => Some(sum / count as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_passes_positive_values() {
        assert_eq!(sanitize(12.5), 12.5);
    }

    #[test]
    fn test_sanitize_clamps_negative_and_nan() {
        assert_eq!(sanitize(-3.0), 0.0);
        assert_eq!(sanitize(f64::NAN), 0.0);
        assert_eq!(sanitize(f64::INFINITY), 0.0);
        assert_eq!(sanitize(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_seconds_per_km() {
        assert_eq!(seconds_per_km(300.0, 1000.0), 300.0);
        assert_eq!(seconds_per_km(150.0, 500.0), 300.0);
    }

    #[test]
    fn test_seconds_per_km_without_distance() {
        assert_eq!(seconds_per_km(120.0, 0.0), 0.0);
        assert_eq!(seconds_per_km(120.0, -5.0), 0.0);
        assert_eq!(seconds_per_km(120.0, f64::NAN), 0.0);
    }

    #[test]
    fn test_seconds_per_km_negative_time() {
        assert_eq!(seconds_per_km(-10.0, 1000.0), 0.0);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[10., 20., 30., 15., 22.]), Some(19.4));
        assert_eq!(mean(&[42.0]), Some(42.0));
    }

    #[test]
    fn test_mean_empty_slice() {
        assert_eq!(mean(&[]), None);
    }
}

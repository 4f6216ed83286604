use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::error::AnalysisError;

/// Largest supported comparison precision.
pub const MAX_PRECISION: u32 = 8;

/// Scaled magnitudes at or above 2^50 are returned as-is. Below it, a rounded
/// value scaled back up lands within a quarter tick of its integer, so a
/// second rounding reproduces it.
const ROUNDING_LIMIT: f64 = 1_125_899_906_842_624.0; // 2^50

/// Round `level` to `precision` decimal digits (half away from zero).
/// Non-finite input, and input too large to carry `precision` fractional
/// digits, is returned unchanged.
pub fn normalize(level: f64, precision: u32) -> f64 {
    if !level.is_finite() {
        return level;
    }
    let scale = scale_for(precision);
    let scaled = level * scale;
    if !scaled.is_finite() || scaled.abs() >= ROUNDING_LIMIT {
        return level;
    }
    // Adding zero folds -0.0 into 0.0.
    (scaled.round() / scale) + 0.0
}

pub fn validate_precision(precision: u32) -> Result<(), AnalysisError> {
    if precision > MAX_PRECISION {
        return Err(AnalysisError::InvalidPrecision {
            precision,
            max: MAX_PRECISION,
        });
    }
    Ok(())
}

fn scale_for(precision: u32) -> f64 {
    10f64.powi(precision as i32)
}

/// A finite level after [`normalize`]. Two raw levels that round to the same
/// value produce bit-identical keys, so the key hashes and orders exactly.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(transparent)]
pub struct NormalizedLevel(f64);

impl NormalizedLevel {
    /// Returns `None` for NaN and infinite levels.
    pub fn new(level: f64, precision: u32) -> Option<Self> {
        level
            .is_finite()
            .then(|| Self(normalize(level, precision)))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl PartialEq for NormalizedLevel {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for NormalizedLevel {}

impl Hash for NormalizedLevel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for NormalizedLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NormalizedLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_requested_digits() {
        assert_eq!(normalize(105.004, 2), 105.0);
        assert_eq!(normalize(105.006, 2), 105.01);
        assert_eq!(normalize(-2.345678, 4), -2.3457);
        assert_eq!(normalize(0.125, 0), 0.0);
    }

    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            0.0, 1.0, -1.0, 0.005, 105.004999, 19_876.54321, -0.33333, 1e-9, 123_456.789_123,
        ];
        for precision in [0, 2, 4, 5] {
            for &x in &samples {
                let once = normalize(x, precision);
                assert_eq!(normalize(once, precision), once, "x={x} p={precision}");
            }
        }
    }

    #[test]
    fn large_magnitudes_stay_idempotent_and_finite() {
        for precision in [2, 4, 8] {
            let mut x = 1e10;
            while x < 1e300 {
                for value in [x, x + 0.49457, -x * 1.37] {
                    let once = normalize(value, precision);
                    assert!(once.is_finite(), "x={value} p={precision}");
                    assert_eq!(
                        normalize(once, precision),
                        once,
                        "x={value} p={precision}"
                    );
                }
                x *= 1.173;
            }
        }
        let near_limit = 275_040_878_466.494_57;
        let once = normalize(near_limit, 4);
        assert_eq!(normalize(once, 4), once);
        assert_eq!(normalize(1e307, 2), 1e307);
        assert_eq!(normalize(-1e307, 8), -1e307);
    }

    #[test]
    fn non_finite_levels_pass_through() {
        assert!(normalize(f64::NAN, 2).is_nan());
        assert_eq!(normalize(f64::INFINITY, 2), f64::INFINITY);
        assert!(NormalizedLevel::new(f64::NAN, 2).is_none());
        assert!(NormalizedLevel::new(f64::NEG_INFINITY, 2).is_none());
    }

    #[test]
    fn huge_finite_levels_still_get_a_key() {
        let a = NormalizedLevel::new(1e300, 2).unwrap();
        let b = NormalizedLevel::new(1e300, 2).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.value(), 1e300);
        assert!(NormalizedLevel::new(1e15, 8).unwrap() < a);
    }

    #[test]
    fn keys_collapse_values_equal_after_rounding() {
        let a = NormalizedLevel::new(120.001, 2).unwrap();
        let b = NormalizedLevel::new(119.996, 2).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.value(), 120.0);
    }

    #[test]
    fn negative_zero_matches_zero() {
        let a = NormalizedLevel::new(-0.001, 2).unwrap();
        let b = NormalizedLevel::new(0.0, 2).unwrap();
        assert_eq!(a, b);
        assert!(a.value().is_sign_positive());
    }

    #[test]
    fn keys_order_by_value() {
        let low = NormalizedLevel::new(90.0, 2).unwrap();
        let high = NormalizedLevel::new(105.0, 2).unwrap();
        let below_zero = NormalizedLevel::new(-3.5, 2).unwrap();
        assert!(low < high);
        assert!(below_zero < low);
    }

    #[test]
    fn precision_limit_is_enforced() {
        assert!(validate_precision(MAX_PRECISION).is_ok());
        assert_eq!(
            validate_precision(MAX_PRECISION + 1),
            Err(AnalysisError::InvalidPrecision {
                precision: MAX_PRECISION + 1,
                max: MAX_PRECISION
            })
        );
    }
}

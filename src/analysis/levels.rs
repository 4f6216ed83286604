use serde::Serialize;

use crate::analysis::ratios::RatioSet;
use crate::data::Bar;

/// The one positive ratio that is measured from the low instead of the high.
pub const SPECIAL_HALF_RATIO: f64 = 0.5;

/// Reference price a scaled range is added to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Anchor {
    Low,
    High,
}

/// Classification of a ratio that decides its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RatioClass {
    Negative,
    SpecialHalf,
    Positive,
}

impl RatioClass {
    pub fn of(ratio: f64) -> Self {
        if ratio < 0.0 {
            Self::Negative
        } else if ratio == SPECIAL_HALF_RATIO {
            Self::SpecialHalf
        } else {
            Self::Positive
        }
    }

    /// Anchor table. `SpecialHalf` keeps the low anchor even though the ratio
    /// is positive; the asymmetry is long-standing report behaviour.
    pub fn anchor(self) -> Anchor {
        match self {
            Self::Negative => Anchor::Low,
            Self::SpecialHalf => Anchor::Low,
            Self::Positive => Anchor::High,
        }
    }
}

/// `anchor + (high - low) * ratio`. Non-finite extremes yield a non-finite level.
pub fn compute_level(ratio: f64, high: f64, low: f64) -> f64 {
    let range = high - low;
    let anchor = match RatioClass::of(ratio).anchor() {
        Anchor::Low => low,
        Anchor::High => high,
    };
    anchor + range * ratio
}

/// Every ratio's level for a single bar, in ratio-set order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelMatrix {
    levels: Vec<f64>,
}

impl LevelMatrix {
    pub fn compute(bar: &Bar, ratios: &RatioSet) -> Self {
        let levels = ratios
            .iter()
            .map(|ratio| compute_level(ratio, bar.high, bar.low))
            .collect();
        Self { levels }
    }

    pub fn levels(&self) -> impl Iterator<Item = f64> + '_ {
        self.levels.iter().copied()
    }

    pub fn into_levels(self) -> impl Iterator<Item = f64> {
        self.levels.into_iter()
    }
}

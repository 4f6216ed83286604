use std::collections::HashSet;

use clap::ValueEnum;
use serde::Serialize;

use crate::analysis::normalize::{normalize, validate_precision, NormalizedLevel};
use crate::error::AnalysisError;

/// Whether the `stop` end of a ratio range may itself be emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Boundary {
    Inclusive,
    Exclusive,
}

/// Upper bound on the ratios one range may produce.
pub const MAX_RATIO_COUNT: usize = 100_000;

/// Ordered, duplicate-free set of ratio offsets.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RatioSet {
    ratios: Vec<f64>,
}

impl RatioSet {
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.ratios.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ratios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }

    /// Appends the ratios of `other` not already present, keeping first-seen order.
    pub fn union(mut self, other: &RatioSet) -> RatioSet {
        for ratio in other.iter() {
            if !self.ratios.contains(&ratio) {
                self.ratios.push(ratio);
            }
        }
        self
    }
}

/// Produce `round(start + i * step, precision)` for `i = 0, 1, ...` while the
/// unrounded value stays within `[start, stop]` (or `[start, stop)`), dropping
/// anything equal to an exclusion once both are rounded.
pub fn generate(
    start: f64,
    stop: f64,
    step: f64,
    precision: u32,
    exclusions: &[f64],
    boundary: Boundary,
) -> Result<RatioSet, AnalysisError> {
    if !(step.is_finite() && step > 0.0) {
        return Err(AnalysisError::InvalidStep { step });
    }
    if !(start.is_finite() && stop.is_finite()) || stop < start {
        return Err(AnalysisError::InvalidBounds { start, stop });
    }
    validate_precision(precision)?;

    let excluded: HashSet<NormalizedLevel> = exclusions
        .iter()
        .filter_map(|&value| NormalizedLevel::new(value, precision))
        .collect();

    // Absorbs accumulated float error at the stop boundary.
    let tolerance = step * 1e-9;
    let last_index = ((stop - start + tolerance) / step).floor();
    if last_index >= MAX_RATIO_COUNT as f64 {
        return Err(AnalysisError::TooManyRatios {
            start,
            stop,
            step,
            max: MAX_RATIO_COUNT,
        });
    }

    let mut seen = HashSet::new();
    let mut ratios = Vec::new();
    for i in 0..=last_index as usize {
        let raw = start + i as f64 * step;
        let within = match boundary {
            Boundary::Inclusive => raw <= stop + tolerance,
            Boundary::Exclusive => raw < stop - tolerance,
        };
        if !within {
            break;
        }
        let Some(key) = NormalizedLevel::new(raw, precision) else {
            break;
        };
        if excluded.contains(&key) || !seen.insert(key) {
            continue;
        }
        ratios.push(normalize(raw, precision));
    }

    Ok(RatioSet { ratios })
}

/// One `[start, stop]` run of a ratio table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioSegment {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
    pub boundary: Boundary,
}

/// Full description of a ratio table: one or more segments sharing a
/// precision and an exclusion list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioConfig {
    pub segments: Vec<RatioSegment>,
    pub precision: u32,
    pub exclusions: Vec<f64>,
}

impl RatioConfig {
    pub fn single(start: f64, stop: f64, step: f64, boundary: Boundary, precision: u32) -> Self {
        Self {
            segments: vec![RatioSegment {
                start,
                stop,
                step,
                boundary,
            }],
            precision,
            exclusions: Vec::new(),
        }
    }

    pub fn build(&self) -> Result<RatioSet, AnalysisError> {
        let mut set = RatioSet::default();
        for segment in &self.segments {
            let part = generate(
                segment.start,
                segment.stop,
                segment.step,
                self.precision,
                &self.exclusions,
                segment.boundary,
            )?;
            set = set.union(&part);
        }
        Ok(set)
    }
}

/// Named ratio tables used by the report and request entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RatioPreset {
    /// -6.0..0.0 (stop excluded) plus 0.5..=6.0 in 0.25 steps, without 0, 0.25, 0.75.
    Workbook,
    /// -3.0..=3.0 in 0.25 steps.
    Web,
}

impl RatioPreset {
    pub fn config(self) -> RatioConfig {
        match self {
            Self::Workbook => RatioConfig {
                segments: vec![
                    RatioSegment {
                        start: -6.0,
                        stop: 0.0,
                        step: 0.25,
                        boundary: Boundary::Exclusive,
                    },
                    RatioSegment {
                        start: 0.5,
                        stop: 6.0,
                        step: 0.25,
                        boundary: Boundary::Inclusive,
                    },
                ],
                precision: 4,
                exclusions: vec![0.0, 0.25, 0.75],
            },
            Self::Web => RatioConfig::single(-3.0, 3.0, 0.25, Boundary::Inclusive, 3),
        }
    }
}

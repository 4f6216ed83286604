use std::collections::BTreeMap;

use itertools::Itertools;
use serde::Serialize;

use crate::analysis::normalize::NormalizedLevel;

/// Population of levels a recurrence count is taken over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Scope {
    /// Every level of every bar in the dataset.
    Global,
    /// The levels of a single bar.
    PerRow,
}

/// Minimum count a value needs before it is reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ThresholdPolicy {
    Fixed(usize),
    /// Datasets spanning more than `cutoff_months` require `long_min`
    /// occurrences; shorter ones (or ones without a span) require `short_min`.
    SpanAware {
        cutoff_months: f64,
        short_min: usize,
        long_min: usize,
    },
}

impl ThresholdPolicy {
    pub const PER_ROW: ThresholdPolicy = ThresholdPolicy::Fixed(2);

    /// Drops 2x recurrences once a dataset covers more than three months.
    pub fn span_aware() -> Self {
        Self::SpanAware {
            cutoff_months: 3.0,
            short_min: 2,
            long_min: 3,
        }
    }

    pub fn for_scope(scope: Scope) -> Self {
        match scope {
            Scope::Global => Self::span_aware(),
            Scope::PerRow => Self::PER_ROW,
        }
    }

    pub fn min_count(&self, span_months: Option<f64>) -> usize {
        match *self {
            Self::Fixed(min) => min,
            Self::SpanAware {
                cutoff_months,
                short_min,
                long_min,
            } => match span_months {
                Some(months) if months > cutoff_months => long_min,
                _ => short_min,
            },
        }
    }
}

/// Qualifying values and how often each occurred.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ClusterCounts {
    pub counts: BTreeMap<NormalizedLevel, usize>,
    pub min_count: usize,
    pub skipped_non_finite: usize,
}

impl ClusterCounts {
    pub fn get(&self, value: f64, precision: u32) -> Option<usize> {
        NormalizedLevel::new(value, precision).and_then(|key| self.counts.get(&key).copied())
    }
}

/// Count the normalized form of each level and keep the ones reaching the
/// policy's minimum. NaN and infinite levels are skipped, never counted;
/// every finite level is counted whatever its magnitude.
pub fn cluster<I>(
    levels: I,
    precision: u32,
    policy: ThresholdPolicy,
    span_months: Option<f64>,
) -> ClusterCounts
where
    I: IntoIterator<Item = f64>,
{
    let mut skipped_non_finite = 0usize;
    let raw_counts = levels
        .into_iter()
        .filter_map(|level| {
            let key = NormalizedLevel::new(level, precision);
            if key.is_none() {
                skipped_non_finite += 1;
            }
            key
        })
        .counts();

    // A threshold below 2 would report values that never repeat.
    let min_count = policy.min_count(span_months).max(2);
    let counts = raw_counts
        .into_iter()
        .filter(|&(_, count)| count >= min_count)
        .collect();

    ClusterCounts {
        counts,
        min_count,
        skipped_non_finite,
    }
}

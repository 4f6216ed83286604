use chrono::NaiveDate;
use serde::Serialize;

use crate::analysis::clustering::{cluster, ClusterCounts, Scope, ThresholdPolicy};
use crate::analysis::levels::LevelMatrix;
use crate::analysis::normalize::validate_precision;
use crate::analysis::ratios::{RatioConfig, RatioSet};
use crate::analysis::tiers::{assign_tiers, AnalysisResult, Tier};
use crate::data::{Bar, DateSpan};
use crate::error::AnalysisError;

/// Everything one analysis run depends on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineConfig {
    pub ratios: RatioConfig,
    /// Decimal digits levels are rounded to before they are compared.
    pub precision: u32,
    /// Minimum-count policy for whole-dataset counting.
    pub threshold: ThresholdPolicy,
    /// Also count each bar's own high and low in the whole-dataset pass.
    pub count_bar_extremes: bool,
}

impl EngineConfig {
    pub fn new(ratios: RatioConfig, precision: u32) -> Self {
        Self {
            ratios,
            precision,
            threshold: ThresholdPolicy::for_scope(Scope::Global),
            count_bar_extremes: false,
        }
    }

    pub fn with_threshold(mut self, threshold: ThresholdPolicy) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_bar_extremes(mut self, enabled: bool) -> Self {
        self.count_bar_extremes = enabled;
        self
    }
}

/// Outcome of a whole-dataset run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalAnalysis {
    pub result: AnalysisResult,
    pub span: Option<DateSpan>,
    pub min_count: usize,
    pub bar_count: usize,
    pub ratio_count: usize,
    pub skipped_non_finite: usize,
}

/// Tier of every (ratio, level) cell of one bar; `None` where the level
/// does not recur within the bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowTiers {
    pub date: NaiveDate,
    pub cells: Vec<Option<Tier>>,
}

/// One `RowTiers` per bar, columns in ratio-set order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerBarTierMap {
    rows: Vec<RowTiers>,
}

impl PerBarTierMap {
    pub fn rows(&self) -> &[RowTiers] {
        &self.rows
    }
}

/// Level generation, normalization, counting and tiering behind one
/// configuration value. Holds no state between runs.
#[derive(Debug, Clone)]
pub struct LevelEngine {
    config: EngineConfig,
    ratios: RatioSet,
}

impl LevelEngine {
    pub fn new(config: EngineConfig) -> Result<Self, AnalysisError> {
        validate_precision(config.precision)?;
        let ratios = config.ratios.build()?;
        if ratios.is_empty() {
            log::warn!("ratio table is empty; no levels will be produced");
        }
        log::debug!(
            "ratio table ready: {} ratios, comparison precision {}",
            ratios.len(),
            config.precision
        );
        Ok(Self { config, ratios })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ratios(&self) -> &RatioSet {
        &self.ratios
    }

    pub fn level_matrix(&self, bar: &Bar) -> LevelMatrix {
        LevelMatrix::compute(bar, &self.ratios)
    }

    /// Count recurring levels across every ratio of every bar.
    pub fn analyze(&self, bars: &[Bar]) -> Result<GlobalAnalysis, AnalysisError> {
        if bars.is_empty() {
            return Err(AnalysisError::no_bars());
        }

        let incomplete = bars.iter().filter(|bar| !bar.has_finite_extremes()).count();
        if incomplete > 0 {
            log::warn!("{incomplete} bar(s) have missing prices; their levels are not counted");
        }

        let span = DateSpan::of(bars);
        let span_months = span.map(|span| span.months());
        let count_extremes = self.config.count_bar_extremes;
        let levels = bars.iter().flat_map(|bar| {
            let extremes = if count_extremes {
                vec![bar.high, bar.low]
            } else {
                Vec::new()
            };
            self.level_matrix(bar).into_levels().chain(extremes)
        });

        let counts = cluster(
            levels,
            self.config.precision,
            self.config.threshold,
            span_months,
        );
        if counts.skipped_non_finite > 0 {
            log::debug!("skipped {} non-finite levels", counts.skipped_non_finite);
        }

        let result = assign_tiers(&counts);
        log::info!(
            "{} recurring levels across {} bars (minimum count {})",
            result.len(),
            bars.len(),
            counts.min_count
        );

        Ok(GlobalAnalysis {
            result,
            span,
            min_count: counts.min_count,
            bar_count: bars.len(),
            ratio_count: self.ratios.len(),
            skipped_non_finite: counts.skipped_non_finite,
        })
    }

    /// Recurrences among a single bar's own levels.
    pub fn analyze_row(&self, matrix: &LevelMatrix) -> AnalysisResult {
        assign_tiers(&self.row_counts(matrix))
    }

    pub fn tag_row(&self, bar: &Bar) -> RowTiers {
        let matrix = self.level_matrix(bar);
        let counts = self.row_counts(&matrix);
        let precision = self.config.precision;
        let cells = matrix
            .levels()
            .map(|level| counts.get(level, precision).and_then(Tier::for_count))
            .collect();
        RowTiers {
            date: bar.date,
            cells,
        }
    }

    pub fn tier_map(&self, bars: &[Bar]) -> PerBarTierMap {
        PerBarTierMap {
            rows: bars.iter().map(|bar| self.tag_row(bar)).collect(),
        }
    }

    fn row_counts(&self, matrix: &LevelMatrix) -> ClusterCounts {
        cluster(
            matrix.levels(),
            self.config.precision,
            ThresholdPolicy::for_scope(Scope::PerRow),
            None,
        )
    }
}

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::analysis::clustering::ThresholdPolicy;
use crate::analysis::engine::EngineConfig;
use crate::analysis::ratios::{Boundary, RatioConfig, RatioPreset};

/// Command-line configuration for the Fibonacci level recurrence tool.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct AppConfig {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Analyse a ticker's stored bars and print the JSON response.
    Analyze(AnalyzeArgs),
    /// Print and save the grouped recurring-level report for a CSV file.
    Report(ReportArgs),
    /// Export the per-bar level matrix and its per-row tier map.
    Levels(LevelsArgs),
    /// Write the recurring levels into a Pine Script chart overlay.
    Pine(PineArgs),
}

/// Ratio table selection shared by every command.
#[derive(Debug, Clone, Args)]
pub struct RatioArgs {
    /// Named ratio table (defaults depend on the command).
    #[arg(long, value_enum)]
    pub preset: Option<RatioPreset>,

    /// First ratio of a custom table; replaces the preset.
    #[arg(long, allow_hyphen_values = true, requires_all = ["ratio_stop", "ratio_step"])]
    pub ratio_start: Option<f64>,

    /// Last ratio of a custom table.
    #[arg(long, allow_hyphen_values = true)]
    pub ratio_stop: Option<f64>,

    /// Spacing between custom ratios.
    #[arg(long)]
    pub ratio_step: Option<f64>,

    /// Leave the custom table's stop value out.
    #[arg(long, default_value_t = false)]
    pub stop_exclusive: bool,

    /// Decimal digits custom ratios are rounded to.
    #[arg(long, default_value_t = 4)]
    pub ratio_precision: u32,

    /// Ratios to drop, comma separated (added to the preset's own exclusions).
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub exclude: Vec<f64>,
}

impl RatioArgs {
    pub fn ratio_config(&self, default_preset: RatioPreset) -> RatioConfig {
        let mut config = match (self.ratio_start, self.ratio_stop, self.ratio_step) {
            (Some(start), Some(stop), Some(step)) => {
                let boundary = if self.stop_exclusive {
                    Boundary::Exclusive
                } else {
                    Boundary::Inclusive
                };
                RatioConfig::single(start, stop, step, boundary, self.ratio_precision)
            }
            _ => self.preset.unwrap_or(default_preset).config(),
        };
        config.exclusions.extend(self.exclude.iter().copied());
        config
    }
}

/// Whole-dataset counting options.
#[derive(Debug, Clone, Args)]
pub struct CountArgs {
    /// Fixed minimum count; without it 2x recurrences are dropped for
    /// datasets spanning more than three months.
    #[arg(long)]
    pub min_count: Option<usize>,

    /// Count each bar's own high and low alongside its levels.
    #[arg(long, default_value_t = false)]
    pub count_extremes: bool,
}

impl CountArgs {
    fn threshold(&self) -> ThresholdPolicy {
        self.min_count
            .map(ThresholdPolicy::Fixed)
            .unwrap_or_else(ThresholdPolicy::span_aware)
    }
}

#[derive(Debug, Clone, Args)]
pub struct AnalyzeArgs {
    /// Ticker symbol; bars are read from `<data-dir>/<TICKER>.csv`.
    #[arg(short, long)]
    pub ticker: String,

    /// First date to include (YYYY-MM-DD).
    #[arg(long)]
    pub start: NaiveDate,

    /// Last date to include (YYYY-MM-DD).
    #[arg(long)]
    pub end: NaiveDate,

    /// Directory holding one CSV file per ticker.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Comparison precision for levels.
    #[arg(long, default_value_t = 5)]
    pub precision: u32,

    #[command(flatten)]
    pub ratios: RatioArgs,

    #[command(flatten)]
    pub counting: CountArgs,
}

#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    /// Input CSV file of daily bars.
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input_path: PathBuf,

    /// Report file; defaults to `repeated_values_<timestamp>.txt`.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Comparison precision for levels.
    #[arg(long, default_value_t = 2)]
    pub precision: u32,

    #[command(flatten)]
    pub ratios: RatioArgs,

    #[command(flatten)]
    pub counting: CountArgs,
}

#[derive(Debug, Clone, Args)]
pub struct LevelsArgs {
    /// Input CSV file of daily bars.
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input_path: PathBuf,

    /// Level matrix CSV to write.
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Tier map CSV; defaults to `<output stem>_tiers.csv`.
    #[arg(long, value_name = "FILE")]
    pub tiers: Option<PathBuf>,

    /// Display and per-row comparison precision.
    #[arg(long, default_value_t = 4)]
    pub precision: u32,

    #[command(flatten)]
    pub ratios: RatioArgs,
}

#[derive(Debug, Clone, Args)]
pub struct PineArgs {
    /// Input CSV file of daily bars.
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input_path: PathBuf,

    /// Pine Script file to update in place.
    #[arg(short, long, value_name = "FILE", default_value = "superfib.pine")]
    pub script: PathBuf,

    /// Comparison precision for levels.
    #[arg(long, default_value_t = 2)]
    pub precision: u32,

    #[command(flatten)]
    pub ratios: RatioArgs,

    #[command(flatten)]
    pub counting: CountArgs,
}

impl AnalyzeArgs {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.ratios.ratio_config(RatioPreset::Web), self.precision)
            .with_threshold(self.counting.threshold())
            .with_bar_extremes(self.counting.count_extremes)
    }
}

impl ReportArgs {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(
            self.ratios.ratio_config(RatioPreset::Workbook),
            self.precision,
        )
        .with_threshold(self.counting.threshold())
        .with_bar_extremes(self.counting.count_extremes)
    }
}

impl LevelsArgs {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(
            self.ratios.ratio_config(RatioPreset::Workbook),
            self.precision,
        )
    }

    pub fn tiers_path(&self) -> PathBuf {
        if let Some(path) = &self.tiers {
            return path.clone();
        }
        let stem = self
            .output
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("levels"));
        self.output.with_file_name(format!("{stem}_tiers.csv"))
    }
}

impl PineArgs {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(
            self.ratios.ratio_config(RatioPreset::Workbook),
            self.precision,
        )
        .with_threshold(self.counting.threshold())
        .with_bar_extremes(self.counting.count_extremes)
    }
}

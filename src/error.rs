use thiserror::Error;

/// Failures the analysis core reports to its callers.
#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("ratio step must be positive (got {step})")]
    InvalidStep { step: f64 },

    #[error("ratio stop {stop} is below start {start}")]
    InvalidBounds { start: f64, stop: f64 },

    #[error("precision {precision} exceeds the supported maximum of {max}")]
    InvalidPrecision { precision: u32, max: u32 },

    #[error("ratio range {start}..{stop} with step {step} yields more than {max} ratios")]
    TooManyRatios {
        start: f64,
        stop: f64,
        step: f64,
        max: usize,
    },

    #[error("no data found {context}")]
    DataUnavailable { context: String },
}

impl AnalysisError {
    /// True for errors raised while validating ratio-table parameters.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidStep { .. }
                | Self::InvalidBounds { .. }
                | Self::InvalidPrecision { .. }
                | Self::TooManyRatios { .. }
        )
    }

    pub fn no_bars() -> Self {
        Self::DataUnavailable {
            context: String::from("for analysis"),
        }
    }

    pub fn no_bars_for_ticker(ticker: &str) -> Self {
        Self::DataUnavailable {
            context: format!("for ticker '{ticker}' in the specified date range"),
        }
    }
}

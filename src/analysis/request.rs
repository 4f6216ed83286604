use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;

use crate::analysis::engine::{EngineConfig, LevelEngine};
use crate::analysis::tiers::AnalysisResult;
use crate::data::Bar;
use crate::error::AnalysisError;

/// Supplies daily bars for a ticker and inclusive date range.
pub trait BarSource {
    fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RepeatedValue {
    pub value: f64,
    pub count: usize,
}

/// `{"success": true, "repeated_values": [...]}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisResponse {
    Success {
        success: bool,
        repeated_values: Vec<RepeatedValue>,
    },
    Failure {
        error: String,
    },
}

impl AnalysisResponse {
    pub fn success(result: &AnalysisResult) -> Self {
        let repeated_values = result
            .entries()
            .iter()
            .map(|entry| RepeatedValue {
                value: entry.value,
                count: entry.count,
            })
            .collect();
        Self::Success {
            success: true,
            repeated_values,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            error: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Fetch bars through `source` and run a whole-dataset analysis. Never
/// fails: every problem becomes an `error` response.
pub fn handle_request(
    request: &AnalysisRequest,
    source: &dyn BarSource,
    config: &EngineConfig,
) -> AnalysisResponse {
    match run_request(request, source, config) {
        Ok(result) => AnalysisResponse::success(&result),
        Err(err) => {
            let misconfigured = err
                .downcast_ref::<AnalysisError>()
                .is_some_and(AnalysisError::is_configuration);
            if misconfigured {
                log::error!("analysis engine misconfigured: {err:#}");
            } else {
                log::warn!("analysis request for {} failed: {err:#}", request.ticker);
            }
            AnalysisResponse::failure(format!("{err:#}"))
        }
    }
}

fn run_request(
    request: &AnalysisRequest,
    source: &dyn BarSource,
    config: &EngineConfig,
) -> Result<AnalysisResult> {
    let ticker = request.ticker.trim();
    if ticker.is_empty() {
        anyhow::bail!("please provide a ticker symbol and date range");
    }

    let engine = LevelEngine::new(config.clone())?;
    log::info!(
        "analysing {ticker} from {} to {}",
        request.start,
        request.end
    );
    let bars = source.fetch(ticker, request.start, request.end)?;
    if bars.is_empty() {
        return Err(AnalysisError::no_bars_for_ticker(ticker).into());
    }

    Ok(engine.analyze(&bars)?.result)
}

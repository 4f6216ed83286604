use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use thiserror::Error;

use crate::analysis::request::BarSource;
use crate::data::Bar;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("input file contains no valid rows")]
    Empty,

    #[error("unable to parse date from value '{0}'")]
    Date(String),

    #[error("header row has no '{0}' column")]
    MissingColumn(&'static str),

    #[error("failed to parse numeric field '{field}' from value '{value}'")]
    ParseNumber { field: &'static str, value: String },
}

/// Positions of the fields a bar is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnLayout {
    date: usize,
    high: usize,
    low: usize,
}

impl ColumnLayout {
    /// `Date,Open,High,Low,Close,...` or the short `Date,High,Low` form.
    fn positional(width: usize) -> Self {
        if width == 3 {
            Self {
                date: 0,
                high: 1,
                low: 2,
            }
        } else {
            Self {
                date: 0,
                high: 2,
                low: 3,
            }
        }
    }

    fn from_header(record: &StringRecord) -> Result<Self, LoaderError> {
        let find = |name: &'static str| {
            record
                .iter()
                .position(|field| field.trim().eq_ignore_ascii_case(name))
                .ok_or(LoaderError::MissingColumn(name))
        };
        Ok(Self {
            date: find("date")?,
            high: find("high")?,
            low: find("low")?,
        })
    }
}

/// Load daily bars sorted by date. Missing prices load as NaN.
pub fn load_bars_from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Bar>> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref).with_context(|| format!("failed to open {:?}", path_ref))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let mut layout: Option<ColumnLayout> = None;
    let mut bars = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        if is_header(&record) {
            layout = Some(ColumnLayout::from_header(&record)?);
            continue;
        }
        let columns = *layout.get_or_insert_with(|| ColumnLayout::positional(record.len()));
        bars.push(parse_record(&record, columns)?);
    }

    if bars.is_empty() {
        return Err(LoaderError::Empty.into());
    }

    bars.sort_by_key(|bar| bar.date);
    log::debug!("loaded {} bars from {:?}", bars.len(), path_ref);
    Ok(bars)
}

fn is_header(record: &StringRecord) -> bool {
    record
        .iter()
        .any(|field| field.trim().eq_ignore_ascii_case("date"))
}

fn parse_record(record: &StringRecord, columns: ColumnLayout) -> Result<Bar> {
    let date_field = record.get(columns.date).unwrap_or_default();
    let date = parse_date(date_field)?;
    let high = parse_price(record.get(columns.high), "high")?;
    let low = parse_price(record.get(columns.low), "low")?;
    Ok(Bar::new(date, high, low))
}

/// Blank and placeholder cells are missing data, not errors.
fn parse_price(value: Option<&str>, field: &'static str) -> Result<f64> {
    let value = value.unwrap_or_default().trim();
    if value.is_empty()
        || value == "-"
        || value.eq_ignore_ascii_case("null")
        || value.eq_ignore_ascii_case("nan")
    {
        return Ok(f64::NAN);
    }
    value
        .replace(',', "")
        .parse::<f64>()
        .map_err(|_| LoaderError::ParseNumber {
            field,
            value: value.to_string(),
        })
        .map_err(anyhow::Error::from)
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    let patterns = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%-m/%-d/%Y"];
    for pattern in &patterns {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, pattern) {
            return Ok(date);
        }
    }

    // Timestamps exported with a midnight time component.
    let datetime_patterns = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];
    for pattern in &datetime_patterns {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, pattern) {
            return Ok(datetime.date());
        }
    }
    if let Ok(datetime) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Ok(datetime.date_naive());
    }

    Err(LoaderError::Date(trimmed.to_string()).into())
}

/// Reads `<data_dir>/<TICKER>.csv`.
#[derive(Debug, Clone)]
pub struct CsvBarSource {
    data_dir: PathBuf,
}

impl CsvBarSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.data_dir.join(format!("{ticker}.csv"))
    }
}

impl BarSource for CsvBarSource {
    fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>> {
        let path = self.path_for(ticker);
        if !path.exists() {
            log::warn!("no data file for {ticker} at {:?}", path);
            return Ok(Vec::new());
        }
        let bars = match load_bars_from_csv(&path) {
            Ok(bars) => bars,
            Err(err) if matches!(err.downcast_ref::<LoaderError>(), Some(LoaderError::Empty)) => {
                log::warn!("data file for {ticker} at {:?} has no rows", path);
                return Ok(Vec::new());
            }
            Err(err) => {
                return Err(err.context(format!(
                    "failed to load bars for {ticker} from {:?}",
                    path
                )))
            }
        };
        Ok(filter_dates(&bars, start, end))
    }
}

/// Bars dated within `[start, end]`.
pub fn filter_dates(bars: &[Bar], start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
    bars.iter()
        .copied()
        .filter(|bar| bar.date >= start && bar.date <= end)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::{NamedTempFile, TempDir};

    use super::*;
    use crate::analysis::engine::EngineConfig;
    use crate::analysis::ratios::RatioPreset;
    use crate::analysis::request::{handle_request, AnalysisRequest, AnalysisResponse};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_named_columns_in_any_order() {
        let file = csv_file(
            "Date,Close,Low,High,Volume\n\
             2024-01-03,105,101.5,111,1000\n\
             2024-01-02,104,100,110,1200\n",
        );
        let bars = load_bars_from_csv(file.path()).unwrap();
        assert_eq!(
            bars,
            vec![
                Bar::new(day(2024, 1, 2), 110.0, 100.0),
                Bar::new(day(2024, 1, 3), 111.0, 101.5),
            ]
        );
    }

    #[test]
    fn headerless_rows_use_ohlc_layout() {
        let file = csv_file("2024-01-02,105,110,100,108,5000\n01/03/2024,106,\"1,112\",99,107,4000\n");
        let bars = load_bars_from_csv(file.path()).unwrap();
        assert_eq!(bars[0], Bar::new(day(2024, 1, 2), 110.0, 100.0));
        assert_eq!(bars[1], Bar::new(day(2024, 1, 3), 1112.0, 99.0));
    }

    #[test]
    fn short_rows_are_date_high_low() {
        let file = csv_file("2024-01-02 00:00:00,110,100\n");
        let bars = load_bars_from_csv(file.path()).unwrap();
        assert_eq!(bars, vec![Bar::new(day(2024, 1, 2), 110.0, 100.0)]);
    }

    #[test]
    fn blank_prices_load_as_missing() {
        let file = csv_file("Date,High,Low\n2024-01-02,110,\n2024-01-03,null,99\n");
        let bars = load_bars_from_csv(file.path()).unwrap();
        assert!(bars[0].low.is_nan());
        assert!(bars[1].high.is_nan());
        assert_eq!(bars[1].low, 99.0);
    }

    #[test]
    fn bad_values_are_errors() {
        let file = csv_file("Date,High,Low\n2024-01-02,abc,100\n");
        let err = load_bars_from_csv(file.path()).unwrap_err();
        assert!(err.to_string().contains("high"));

        let file = csv_file("Date,High,Low\nyesterday,110,100\n");
        assert!(load_bars_from_csv(file.path()).is_err());

        let file = csv_file("Date,Open,Close\n2024-01-02,1,2\n");
        let err = load_bars_from_csv(file.path()).unwrap_err();
        assert!(err.to_string().contains("high"));
    }

    #[test]
    fn header_only_file_is_empty() {
        let file = csv_file("Date,High,Low\n\n");
        let err = load_bars_from_csv(file.path()).unwrap_err();
        assert!(err.to_string().contains("no valid rows"));
    }

    #[test]
    fn source_filters_by_date_range() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("SPY.csv"),
            "Date,High,Low\n2024-01-02,110,100\n2024-02-02,120,110\n2024-03-04,130,120\n",
        )
        .unwrap();
        let source = CsvBarSource::new(dir.path());
        let bars = source
            .fetch("SPY", day(2024, 1, 15), day(2024, 3, 4))
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, day(2024, 2, 2));
        assert_eq!(bars[1].date, day(2024, 3, 4));
    }

    #[test]
    fn unknown_ticker_yields_no_bars() {
        let dir = TempDir::new().unwrap();
        let source = CsvBarSource::new(dir.path());
        let bars = source
            .fetch("NOPE", day(2024, 1, 1), day(2024, 12, 31))
            .unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn header_only_ticker_file_yields_no_bars() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("QQQ.csv"), "Date,High,Low\n").unwrap();
        let source = CsvBarSource::new(dir.path());
        let bars = source
            .fetch("QQQ", day(2024, 1, 1), day(2024, 12, 31))
            .unwrap();
        assert!(bars.is_empty());

        let request = AnalysisRequest {
            ticker: "QQQ".to_string(),
            start: day(2024, 1, 1),
            end: day(2024, 12, 31),
        };
        let config = EngineConfig::new(RatioPreset::Web.config(), 5);
        assert_eq!(
            handle_request(&request, &source, &config),
            AnalysisResponse::failure(
                "no data found for ticker 'QQQ' in the specified date range"
            )
        );
    }

    #[test]
    fn malformed_ticker_file_is_still_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("BAD.csv"), "Date,High,Low\n2024-01-02,abc,1\n").unwrap();
        let source = CsvBarSource::new(dir.path());
        let err = source
            .fetch("BAD", day(2024, 1, 1), day(2024, 12, 31))
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to load bars for BAD"));
    }
}

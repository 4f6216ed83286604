use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use tabled::{settings::Style, Table, Tabled};

use crate::analysis::engine::{GlobalAnalysis, LevelEngine, PerBarTierMap};
use crate::data::Bar;

#[derive(Tabled)]
struct LevelRow {
    #[tabled(rename = "Count")]
    count: usize,
    #[tabled(rename = "Tier")]
    tier: &'static str,
    #[tabled(rename = "Level")]
    level: String,
}

pub fn print_report(analysis: &GlobalAnalysis, precision: u32) {
    println!("\n=== Recurring Fibonacci Levels ===\n");
    println!(
        "Bars: {} | Ratios: {} | Minimum count: {}",
        analysis.bar_count, analysis.ratio_count, analysis.min_count
    );
    if let Some(span) = analysis.span {
        println!(
            "Date range: {} to {} (~{:.1} months)",
            span.start,
            span.end,
            span.months()
        );
    }
    if analysis.skipped_non_finite > 0 {
        println!(
            "Skipped {} levels from bars with missing prices",
            analysis.skipped_non_finite
        );
    }

    if analysis.result.is_empty() {
        println!("No repeated values found in the dataset.");
        return;
    }

    let digits = precision as usize;
    let rows: Vec<LevelRow> = analysis
        .result
        .entries()
        .iter()
        .map(|entry| LevelRow {
            count: entry.count,
            tier: entry.tier.letter(),
            level: format!("{:.*}", digits, entry.value),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("\n{table}\n");
}

/// Plain-text report grouped by count, highest count first.
pub fn render_text_report(
    out: &mut impl fmt::Write,
    analysis: &GlobalAnalysis,
    source: &str,
    generated_at: NaiveDateTime,
    precision: u32,
) -> fmt::Result {
    let digits = precision as usize;
    writeln!(out, "Repeated Values Analysis for {source}")?;
    writeln!(
        out,
        "Analysis performed on: {}",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(out, "{}\n", "=".repeat(50))?;

    if let Some(span) = analysis.span {
        let months = span.months();
        writeln!(out, "Date range spans approximately {months:.1} months")?;
        if analysis.min_count > 2 {
            writeln!(
                out,
                "Values repeated fewer than {} times are excluded",
                analysis.min_count
            )?;
        }
    }

    if analysis.result.is_empty() {
        return writeln!(out, "No repeated values found in the dataset.");
    }

    writeln!(out, "Found the following repeated values:")?;
    writeln!(out, "{}\n", "-".repeat(50))?;
    for group in analysis.result.groups() {
        writeln!(out, "\nValues that appear {} times:", group.count)?;
        writeln!(out, "{}", "-".repeat(30))?;
        for entry in group.entries {
            writeln!(out, "Level: {:.*}", digits, entry.value)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_text_report(path: &Path, report: &str) -> Result<()> {
    fs::write(path, report).with_context(|| format!("failed to write report to {:?}", path))
}

/// Full-precision value; non-finite levels become empty cells.
fn format_cell(value: f64) -> String {
    if value.is_finite() {
        value.to_string()
    } else {
        String::new()
    }
}

fn matrix_header(engine: &LevelEngine) -> Vec<String> {
    let mut header = vec![
        String::from("Date"),
        String::from("High"),
        String::from("Low"),
    ];
    header.extend(engine.ratios().iter().map(|ratio| ratio.to_string()));
    header
}

/// One row per bar: date, high, low and the unrounded level of every ratio.
pub fn write_level_matrix(path: &Path, bars: &[Bar], engine: &LevelEngine) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {:?}", path))?;
    writer.write_record(matrix_header(engine))?;

    for bar in bars {
        let mut record = vec![
            bar.date.format("%Y-%m-%d").to_string(),
            format_cell(bar.high),
            format_cell(bar.low),
        ];
        record.extend(
            engine
                .level_matrix(bar)
                .levels()
                .map(format_cell),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Same shape as the level matrix; each ratio cell holds the tier letter of
/// its level within the row, or nothing.
pub fn write_tier_map(
    path: &Path,
    bars: &[Bar],
    map: &PerBarTierMap,
    engine: &LevelEngine,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {:?}", path))?;
    writer.write_record(matrix_header(engine))?;

    for (bar, row) in bars.iter().zip(map.rows()) {
        let mut record = vec![
            row.date.format("%Y-%m-%d").to_string(),
            format_cell(bar.high),
            format_cell(bar.low),
        ];
        record.extend(
            row.cells
                .iter()
                .map(|cell| cell.map(|tier| tier.letter().to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;
    use crate::analysis::clustering::ThresholdPolicy;
    use crate::analysis::engine::EngineConfig;
    use crate::analysis::ratios::{Boundary, RatioConfig};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn engine() -> LevelEngine {
        let ratios = RatioConfig::single(-1.0, 1.0, 0.5, Boundary::Inclusive, 2);
        LevelEngine::new(EngineConfig::new(ratios, 2).with_threshold(ThresholdPolicy::Fixed(2)))
            .unwrap()
    }

    fn bars() -> Vec<Bar> {
        vec![
            Bar::new(day(2024, 1, 2), 110.0, 100.0),
            Bar::new(day(2024, 1, 3), 120.0, 110.0),
            Bar::new(day(2024, 1, 4), 50.0, 50.0),
            Bar::new(day(2024, 1, 5), 110.0, f64::NAN),
        ]
    }

    #[test]
    fn text_report_groups_by_count() {
        let engine = engine();
        let analysis = engine.analyze(&bars()).unwrap();
        let generated = day(2024, 2, 1).and_hms_opt(9, 30, 0).unwrap();
        let mut report = String::new();
        render_text_report(&mut report, &analysis, "SPY.csv", generated, 2).unwrap();

        assert!(report.starts_with("Repeated Values Analysis for SPY.csv\n"));
        assert!(report.contains("Analysis performed on: 2024-02-01 09:30:00"));
        let five = report.find("Values that appear 5 times:").unwrap();
        let two = report.find("Values that appear 2 times:").unwrap();
        assert!(five < two);
        let l120 = report.find("Level: 120.00").unwrap();
        let l105 = report.find("Level: 105.00").unwrap();
        assert!(two < l120 && l120 < l105);
        assert!(report[five..two].contains("Level: 50.00"));
    }

    #[test]
    fn text_report_without_recurrences() {
        let engine = engine();
        let analysis = engine
            .analyze(&[Bar::new(day(2024, 1, 2), 110.0, 100.0)])
            .unwrap();
        let generated = day(2024, 2, 1).and_hms_opt(0, 0, 0).unwrap();
        let mut report = String::new();
        render_text_report(&mut report, &analysis, "x", generated, 2).unwrap();
        assert!(report.contains("No repeated values found in the dataset."));
    }

    #[test]
    fn level_matrix_export_blanks_missing_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("levels.csv");
        write_level_matrix(&path, &bars(), &engine()).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "Date,High,Low,-1,-0.5,0,0.5,1");
        assert_eq!(lines[1], "2024-01-02,110,100,90,95,110,105,120");
        assert_eq!(lines[4], "2024-01-05,110,,,,,,");
    }

    #[test]
    fn level_matrix_export_keeps_full_precision() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("levels.csv");
        let bars = [Bar::new(day(2024, 1, 2), 110.125, 100.0)];
        write_level_matrix(&path, &bars, &engine()).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines[1],
            "2024-01-02,110.125,100,89.875,94.9375,110.125,105.0625,120.25"
        );
    }

    #[test]
    fn tier_export_marks_recurring_cells() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiers.csv");
        let engine = engine();
        let bars = bars();
        let map = engine.tier_map(&bars);
        write_tier_map(&path, &bars, &map, &engine).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "2024-01-02,110,100,,,,,");
        assert_eq!(lines[3], "2024-01-04,50,50,R,R,R,R,R");
    }
}

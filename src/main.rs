mod analysis;
mod chart;
mod config;
mod data;
mod error;
mod loader;
mod output;

use std::fs;
use std::path::{Path, PathBuf};

use analysis::{handle_request, AnalysisRequest, LevelEngine};
use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use itertools::Itertools;

use config::{AnalyzeArgs, AppConfig, Command, LevelsArgs, PineArgs, ReportArgs};
use data::Bar;
use loader::{load_bars_from_csv, CsvBarSource};
use output::{
    print_report, render_text_report, write_level_matrix, write_text_report, write_tier_map,
};

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let config = AppConfig::parse();
    match &config.command {
        Command::Analyze(args) => run_analyze(args),
        Command::Report(args) => run_report(args),
        Command::Levels(args) => run_levels(args),
        Command::Pine(args) => run_pine(args),
    }
}

fn load_input(input_path: &Path) -> Result<Vec<Bar>> {
    if !input_path.exists() {
        bail!("input file {:?} does not exist", input_path);
    }
    let bars = load_bars_from_csv(input_path)
        .with_context(|| format!("failed to load input data from {:?}", input_path))?;

    if let (Some(first), Some(last)) = (bars.first(), bars.last()) {
        log::info!(
            "Loaded {} daily bars spanning {} to {}",
            bars.len(),
            first.date,
            last.date
        );
    }
    Ok(bars)
}

fn run_analyze(args: &AnalyzeArgs) -> Result<()> {
    let request = AnalysisRequest {
        ticker: args.ticker.clone(),
        start: args.start,
        end: args.end,
    };
    let source = CsvBarSource::new(&args.data_dir);
    let response = handle_request(&request, &source, &args.engine_config());
    println!("{}", serde_json::to_string_pretty(&response)?);
    if !response.is_success() {
        bail!("analysis request for {} did not succeed", args.ticker);
    }
    Ok(())
}

fn run_report(args: &ReportArgs) -> Result<()> {
    let bars = load_input(&args.input_path)?;
    let engine = LevelEngine::new(args.engine_config())?;
    let analysis = engine.analyze(&bars)?;
    print_report(&analysis, args.precision);

    let now = Local::now().naive_local();
    let output = args.output.clone().unwrap_or_else(|| {
        PathBuf::from(format!("repeated_values_{}.txt", now.format("%Y%m%d_%H%M%S")))
    });
    let source = args.input_path.display().to_string();
    let mut report = String::new();
    render_text_report(&mut report, &analysis, &source, now, args.precision)?;
    write_text_report(&output, &report)?;
    log::info!("Report written to {:?}", output);
    Ok(())
}

fn run_levels(args: &LevelsArgs) -> Result<()> {
    let bars = load_input(&args.input_path)?;
    let engine = LevelEngine::new(args.engine_config())?;
    log::info!("Calculating levels for {} ratios", engine.ratios().len());

    write_level_matrix(&args.output, &bars, &engine)?;
    let tiers_path = args.tiers_path();
    let tier_map = engine.tier_map(&bars);
    write_tier_map(&tiers_path, &bars, &tier_map, &engine)?;

    let mut tagged = 0usize;
    for bar in &bars {
        let row = engine.analyze_row(&engine.level_matrix(bar));
        if row.is_empty() {
            continue;
        }
        tagged += 1;
        let values = row
            .entries()
            .iter()
            .map(|entry| format!("{}x{}", entry.value, entry.count))
            .join(", ");
        log::debug!("{}: in-row recurrences {}", bar.date, values);
    }
    log::info!(
        "Level matrix written to {:?}; tiers to {:?} ({} rows with in-row recurrences)",
        args.output,
        tiers_path,
        tagged
    );
    Ok(())
}

fn run_pine(args: &PineArgs) -> Result<()> {
    let bars = load_input(&args.input_path)?;
    let engine = LevelEngine::new(args.engine_config())?;
    let analysis = engine.analyze(&bars)?;

    let script = fs::read_to_string(&args.script)
        .with_context(|| format!("failed to read chart script {:?}", args.script))?;
    let source = args.input_path.display().to_string();
    let patched = chart::patch_chart_script(
        &script,
        &analysis.result,
        &source,
        Local::now().naive_local(),
    );
    fs::write(&args.script, patched)
        .with_context(|| format!("failed to write chart script {:?}", args.script))?;
    log::info!(
        "Updated {:?} with {} price levels",
        args.script,
        analysis.result.len()
    );
    Ok(())
}

//! Hands the recurring levels to a Pine Script chart overlay by rewriting its
//! `prices`/`texts` array declarations.

use chrono::NaiveDateTime;

use crate::analysis::tiers::AnalysisResult;

const HEADER: &str = "// Price levels from repeated_values analysis";
/// Earlier spelling of the header; its block is replaced like the current one.
const LEGACY_HEADER: &str = "// Price levels from repeated values analysis";
const UPDATED_PREFIX: &str = "// Last updated:";
const COUNT_PREFIX: &str = "// All ";
const PRICES_PREFIX: &str = "var prices = array.from(";
const TEXTS_PREFIX: &str = "var texts = array.from(";

fn provenance(result: &AnalysisResult, source: &str, updated: NaiveDateTime) -> [String; 3] {
    [
        HEADER.to_string(),
        format!("{UPDATED_PREFIX} {}", updated.format("%Y-%m-%d %H:%M:%S")),
        format!("{COUNT_PREFIX}{} levels from file: {source}", result.len()),
    ]
}

fn prices_line(result: &AnalysisResult) -> String {
    let prices = result
        .entries()
        .iter()
        .map(|entry| format!("{:?}", entry.value))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{PRICES_PREFIX}{prices})  // Auto-generated price levels")
}

fn texts_line(result: &AnalysisResult) -> String {
    let texts = result
        .entries()
        .iter()
        .map(|entry| format!("\"{}X\"", entry.count))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{TEXTS_PREFIX}{texts})  // Frequency labels")
}

fn is_header(line: &str) -> bool {
    line.starts_with(HEADER) || line.starts_with(LEGACY_HEADER)
}

/// `// All 12 levels from file: x.txt`, `// All 12 levels from: x.csv` or
/// `// 12 levels from ...`.
fn is_count_line(line: &str) -> bool {
    let Some(rest) = line.strip_prefix("//") else {
        return false;
    };
    let rest = rest.trim_start();
    let rest = rest.strip_prefix("All ").unwrap_or(rest);
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && rest[digits..].starts_with(" levels from")
}

fn find_line(lines: &[String], prefix: &str) -> Option<usize> {
    lines
        .iter()
        .position(|line| line.trim_start().starts_with(prefix))
}

/// Replace (or append) the level arrays in `script`, keeping everything else.
pub fn patch_chart_script(
    script: &str,
    result: &AnalysisResult,
    source: &str,
    updated: NaiveDateTime,
) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut iter = script.lines().peekable();
    while let Some(line) = iter.next() {
        if is_header(line.trim_start()) {
            // Drop the previous provenance block.
            while iter.peek().is_some_and(|next| {
                let next = next.trim_start();
                next.starts_with(UPDATED_PREFIX) || is_count_line(next)
            }) {
                iter.next();
            }
            continue;
        }
        lines.push(line.to_string());
    }

    let prices_at = match find_line(&lines, PRICES_PREFIX) {
        Some(idx) => {
            lines[idx] = prices_line(result);
            idx
        }
        None => {
            lines.push(prices_line(result));
            lines.len() - 1
        }
    };
    for (offset, comment) in provenance(result, source, updated).into_iter().enumerate() {
        lines.insert(prices_at + offset, comment);
    }

    match find_line(&lines, TEXTS_PREFIX) {
        Some(idx) => lines[idx] = texts_line(result),
        None => {
            let after_prices = find_line(&lines, PRICES_PREFIX).map_or(lines.len(), |idx| idx + 1);
            lines.insert(after_prices, texts_line(result));
        }
    }

    let mut patched = lines.join("\n");
    if script.ends_with('\n') || script.is_empty() {
        patched.push('\n');
    }
    patched
}

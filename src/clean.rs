// Cleaning pass over raw CSV exports: normalized headers, ISO dates,
// no duplicate rows, no rows missing an identifying field.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::table::{Table, is_missing};

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d"];
const CLEANED_SUFFIX: &str = "_cleaned.csv";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanSummary {
    pub rows_in: usize,
    pub duplicates_dropped: usize,
    pub missing_key_dropped: usize,
    pub rows_out: usize,
}

/// Lowercase, trim and collapse whitespace runs to `_`.
pub fn normalize_column_name(raw: &str) -> String {
    let lower = raw.trim().trim_start_matches('\u{feff}').to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut in_space = false;
    for ch in lower.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push('_');
                in_space = true;
            }
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

/// Reformat to `%Y-%m-%d` when one of the accepted layouts parses; otherwise
/// return the input unchanged.
pub fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| raw.to_string())
}

pub fn cleaned_file_name(file_name: &str) -> String {
    match file_name.strip_suffix(".csv") {
        Some(stem) => format!("{stem}{CLEANED_SUFFIX}"),
        None => format!("{file_name}{CLEANED_SUFFIX}"),
    }
}

fn critical_columns(headers: &[String]) -> Vec<usize> {
    let mut cols = Vec::new();
    if !headers.is_empty() {
        cols.push(0);
    }
    for (idx, h) in headers.iter().enumerate().skip(1) {
        if h.contains("team") || h.contains("player") {
            cols.push(idx);
        }
    }
    cols
}

pub fn clean_table(table: &Table) -> (Table, CleanSummary) {
    let headers: Vec<String> = table
        .headers
        .iter()
        .map(|h| normalize_column_name(h))
        .collect();
    let date_cols: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.contains("date"))
        .map(|(i, _)| i)
        .collect();
    let critical = critical_columns(&headers);

    let mut summary = CleanSummary {
        rows_in: table.rows.len(),
        ..Default::default()
    };
    let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(table.rows.len());
    let mut out = Table::new(table.name.clone(), headers);

    for row in &table.rows {
        let mut row = row.clone();
        for &idx in &date_cols {
            if let Some(cell) = row.get_mut(idx) {
                *cell = normalize_date(cell);
            }
        }
        if !seen.insert(row.clone()) {
            summary.duplicates_dropped += 1;
            continue;
        }
        let missing_key = critical
            .iter()
            .any(|&idx| row.get(idx).is_none_or(|cell| is_missing(cell)));
        if missing_key {
            summary.missing_key_dropped += 1;
            continue;
        }
        out.rows.push(row);
    }

    summary.rows_out = out.rows.len();
    (out, summary)
}

pub fn clean_csv_file(path: &Path) -> Result<(PathBuf, CleanSummary)> {
    let raw = Table::read_csv(path)?;
    let (cleaned, summary) = clean_table(&raw);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let out_path = path.with_file_name(cleaned_file_name(&file_name));
    cleaned.write_csv(&out_path)?;
    info!(
        "cleaned {} -> {} (in={} dup={} missing_key={} out={})",
        file_name,
        out_path.display(),
        summary.rows_in,
        summary.duplicates_dropped,
        summary.missing_key_dropped,
        summary.rows_out
    );
    Ok((out_path, summary))
}

/// Clean every raw `*.csv` in `dir`, skipping files that are already cleaned.
/// A file that fails to parse is reported and the remaining files continue.
pub fn clean_dir(dir: &Path) -> Result<Vec<(PathBuf, CleanSummary)>> {
    let entries = fs::read_dir(dir).map_err(|source| PipelineError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut inputs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| PipelineError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
            continue;
        };
        if name.ends_with(".csv") && !name.ends_with(CLEANED_SUFFIX) && is_raw_input(&name) {
            inputs.push(path);
        }
    }
    inputs.sort();

    let mut out = Vec::with_capacity(inputs.len());
    for path in inputs {
        match clean_csv_file(&path) {
            Ok(done) => out.push(done),
            Err(err @ PipelineError::Csv { .. }) => warn!("skipping {}: {err}", path.display()),
            Err(err) => return Err(err),
        }
    }
    Ok(out)
}

// Stage outputs share the directory with raw inputs.
fn is_raw_input(lower_name: &str) -> bool {
    !matches!(
        lower_name,
        "team_features.csv" | "player_features.csv" | "matchup_dataset.csv"
    )
}

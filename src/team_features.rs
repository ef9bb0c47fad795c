use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::dataset::MatchRecord;
use crate::error::{PipelineError, Result};
use crate::table::{check_columns, ensure_parent};

pub const RECENT_FORM_WINDOW: usize = 5;

/// Ordered inputs of the match classifier.
pub const TEAM_FEATURE_NAMES: [&str; 6] = [
    "avg_goals_for",
    "avg_goals_against",
    "win_rate",
    "draw_rate",
    "loss_rate",
    "recent_form",
];
pub const TEAM_FEATURE_COUNT: usize = TEAM_FEATURE_NAMES.len();

const TEAM_FEATURE_COLUMNS: [&str; 8] = [
    "team",
    "avg_goals_for",
    "avg_goals_against",
    "win_rate",
    "draw_rate",
    "loss_rate",
    "recent_form",
    "matches_played",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamFeatureRow {
    pub team: String,
    pub avg_goals_for: f64,
    pub avg_goals_against: f64,
    pub win_rate: f64,
    pub draw_rate: f64,
    pub loss_rate: f64,
    pub recent_form: f64,
    pub matches_played: u32,
}

impl TeamFeatureRow {
    pub fn feature_vector(&self) -> [f64; TEAM_FEATURE_COUNT] {
        [
            self.avg_goals_for,
            self.avg_goals_against,
            self.win_rate,
            self.draw_rate,
            self.loss_rate,
            self.recent_form,
        ]
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.team.to_lowercase() == name.trim().to_lowercase()
    }
}

/// One match seen from one side.
#[derive(Debug, Clone, Copy)]
struct SideResult {
    kickoff: NaiveDateTime,
    goals_for: u32,
    goals_against: u32,
}

pub fn compute_team_features(matches: &[MatchRecord]) -> Vec<TeamFeatureRow> {
    let mut by_team: BTreeMap<&str, Vec<SideResult>> = BTreeMap::new();
    for m in matches {
        by_team.entry(m.home_team.as_str()).or_default().push(SideResult {
            kickoff: m.kickoff,
            goals_for: m.home_goals,
            goals_against: m.away_goals,
        });
        by_team.entry(m.away_team.as_str()).or_default().push(SideResult {
            kickoff: m.kickoff,
            goals_for: m.away_goals,
            goals_against: m.home_goals,
        });
    }

    by_team
        .into_iter()
        .filter_map(|(team, mut sides)| {
            // Stable: equal kickoffs keep input order.
            sides.sort_by_key(|s| s.kickoff);
            summarize(team, &sides)
        })
        .collect()
}

fn summarize(team: &str, sides: &[SideResult]) -> Option<TeamFeatureRow> {
    if sides.is_empty() {
        return None;
    }
    let n = sides.len() as f64;
    let mut goals_for = 0.0;
    let mut goals_against = 0.0;
    let (mut wins, mut draws, mut losses) = (0usize, 0usize, 0usize);
    for s in sides {
        goals_for += f64::from(s.goals_for);
        goals_against += f64::from(s.goals_against);
        match s.goals_for.cmp(&s.goals_against) {
            std::cmp::Ordering::Greater => wins += 1,
            std::cmp::Ordering::Equal => draws += 1,
            std::cmp::Ordering::Less => losses += 1,
        }
    }

    Some(TeamFeatureRow {
        team: team.to_string(),
        avg_goals_for: goals_for / n,
        avg_goals_against: goals_against / n,
        win_rate: wins as f64 / n,
        draw_rate: draws as f64 / n,
        loss_rate: losses as f64 / n,
        recent_form: recent_form(sides, RECENT_FORM_WINDOW),
        matches_played: sides.len() as u32,
    })
}

/// Mean goals-for over the trailing `window` matches (fewer when the team
/// has played less). `sides` must be in kickoff order.
fn recent_form(sides: &[SideResult], window: usize) -> f64 {
    let start = sides.len().saturating_sub(window.max(1));
    let tail = &sides[start..];
    if tail.is_empty() {
        return 0.0;
    }
    tail.iter().map(|s| f64::from(s.goals_for)).sum::<f64>() / tail.len() as f64
}

pub fn write_team_features(path: &Path, rows: &[TeamFeatureRow]) -> Result<()> {
    ensure_parent(path)?;
    let csv_err = |source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    if rows.is_empty() {
        writer.write_record(TEAM_FEATURE_COLUMNS).map_err(csv_err)?;
    }
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_team_features(path: &Path) -> Result<Vec<TeamFeatureRow>> {
    let file = fs::File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_team_features_from(&path.display().to_string(), file).map_err(|err| match err {
        PipelineError::Csv { source, .. } => PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Reader-based loader; lets the dashboard and tests feed uploaded bytes.
pub fn read_team_features_from<R: std::io::Read>(name: &str, rdr: R) -> Result<Vec<TeamFeatureRow>> {
    let csv_err = |source| PipelineError::Csv {
        path: name.into(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(rdr);
    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();
    check_columns(name, &headers, &TEAM_FEATURE_COLUMNS)?;

    let mut rows = Vec::new();
    for record in reader.deserialize::<TeamFeatureRow>() {
        rows.push(record.map_err(csv_err)?);
    }
    Ok(rows)
}

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::config::{MatchColumns, PlayerColumns};
use crate::error::Result;
use crate::evaluation::Outcome;
use crate::table::Table;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d %b %Y - %H:%M",
];
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d %b %Y"];

#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub home_team: String,
    pub away_team: String,
    pub home_goals: u32,
    pub away_goals: u32,
    pub kickoff: NaiveDateTime,
}

impl MatchRecord {
    pub fn outcome(&self) -> Outcome {
        Outcome::from_goals(self.home_goals, self.away_goals)
    }
}

/// One raw player row: key fields plus every other cell parsed as a number.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStatRow {
    pub player: String,
    pub team: String,
    pub position: Option<String>,
    pub minutes: Option<f64>,
    pub stats: BTreeMap<String, f64>,
}

impl PlayerStatRow {
    pub fn stat(&self, name: &str) -> Option<f64> {
        self.stats.get(name).copied()
    }
}

pub fn parse_kickoff(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_goals(raw: Option<f64>) -> Option<u32> {
    let v = raw?;
    if !(0.0..=1000.0).contains(&v) || v.fract() != 0.0 {
        return None;
    }
    Some(v as u32)
}

pub fn load_matches(table: &Table, columns: &MatchColumns) -> Result<Vec<MatchRecord>> {
    let home_idx = table.require_column(&columns.home_team)?;
    let away_idx = table.require_column(&columns.away_team)?;
    let home_goals_idx = table.require_column(&columns.home_goals)?;
    let away_goals_idx = table.require_column(&columns.away_goals)?;
    let date_idx = table.require_column(&columns.date)?;

    let mut out = Vec::with_capacity(table.len());
    let mut skipped = 0usize;
    for row in &table.rows {
        let (Some(home), Some(away)) = (table.get(row, home_idx), table.get(row, away_idx)) else {
            skipped += 1;
            continue;
        };
        let (Some(home_goals), Some(away_goals)) = (
            parse_goals(table.get_f64(row, home_goals_idx)),
            parse_goals(table.get_f64(row, away_goals_idx)),
        ) else {
            debug!("skipping {home} v {away}: unusable score");
            skipped += 1;
            continue;
        };
        let Some(kickoff) = table.get(row, date_idx).and_then(parse_kickoff) else {
            debug!("skipping {home} v {away}: unparseable date");
            skipped += 1;
            continue;
        };
        out.push(MatchRecord {
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_goals,
            away_goals,
            kickoff,
        });
    }

    if skipped > 0 {
        warn!("{}: skipped {} of {} match rows", table.name, skipped, table.len());
    }
    Ok(out)
}

pub fn load_player_rows(table: &Table, columns: &PlayerColumns) -> Result<Vec<PlayerStatRow>> {
    let player_idx = table.require_column(&columns.player)?;
    let team_idx = table.require_column(&columns.team)?;
    let position_idx = table.find_column(&columns.position);
    let minutes_idx = table.find_column(&columns.minutes);
    if !columns.minutes.is_empty() && minutes_idx.is_none() {
        // Per-90 derivation cannot run without it.
        table.require_column(&columns.minutes)?;
    }

    let key_cols = [Some(player_idx), Some(team_idx), position_idx, minutes_idx];
    let stat_cols: Vec<(usize, &str)> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(i, _)| !key_cols.contains(&Some(*i)))
        .map(|(i, h)| (i, h.as_str()))
        .collect();

    let mut out = Vec::with_capacity(table.len());
    for row in &table.rows {
        let (Some(player), Some(team)) = (table.get(row, player_idx), table.get(row, team_idx))
        else {
            continue;
        };
        let mut stats = BTreeMap::new();
        for &(idx, name) in &stat_cols {
            if let Some(v) = table.get_f64(row, idx) {
                stats.insert(name.to_string(), v);
            }
        }
        out.push(PlayerStatRow {
            player: player.to_string(),
            team: team.to_string(),
            position: position_idx
                .and_then(|idx| table.get(row, idx))
                .map(str::to_string),
            minutes: minutes_idx.and_then(|idx| table.get_f64(row, idx)),
            stats,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::per90_profile;

    #[test]
    fn kickoff_accepts_worldcup_layouts() {
        let a = parse_kickoff("13 Jul 1930 - 15:00").unwrap();
        assert_eq!(a.format("%Y-%m-%d %H:%M").to_string(), "1930-07-13 15:00");
        let b = parse_kickoff("2022-11-20").unwrap();
        assert_eq!(b.format("%H:%M").to_string(), "00:00");
        assert!(parse_kickoff("soon").is_none());
    }

    #[test]
    fn match_rows_with_bad_scores_are_skipped() {
        let raw = "datetime,home_team_name,home_team_goals,away_team_goals,away_team_name\n\
                   2022-11-20,Qatar,0,2,Ecuador\n\
                   2022-11-21,England,x,2,Iran\n\
                   2022-11-21,Senegal,0.0,2.0,Netherlands\n\
                   2022-11-22,Mexico,2.5,0,Poland\n";
        let table = Table::from_reader("m", raw.as_bytes()).unwrap();
        let rows = load_matches(&table, &per90_profile().match_columns).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.home_team != "Mexico"));
        assert_eq!(rows[1].home_team, "Senegal");
        assert_eq!(rows[1].away_goals, 2);
        assert_eq!(rows[0].outcome(), Outcome::Away);
    }
}

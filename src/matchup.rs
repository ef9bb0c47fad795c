use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::dataset::MatchRecord;
use crate::error::{PipelineError, Result};
use crate::table::{Table, fmt_f64, write_records};
use crate::team_features::{TEAM_FEATURE_COUNT, TEAM_FEATURE_NAMES, TeamFeatureRow};

#[derive(Debug, Clone, PartialEq)]
pub struct MatchupExample {
    pub team_a: String,
    pub team_b: String,
    pub diff: [f64; TEAM_FEATURE_COUNT],
    /// 1 iff team_a outscored team_b.
    pub label: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchupSummary {
    pub matches_used: usize,
    pub matches_skipped: usize,
    pub examples: usize,
}

pub fn diff_column_names() -> Vec<String> {
    TEAM_FEATURE_NAMES
        .iter()
        .map(|name| format!("diff_{name}"))
        .collect()
}

pub fn feature_diff(
    a: &[f64; TEAM_FEATURE_COUNT],
    b: &[f64; TEAM_FEATURE_COUNT],
) -> [f64; TEAM_FEATURE_COUNT] {
    let mut out = [0.0; TEAM_FEATURE_COUNT];
    for i in 0..TEAM_FEATURE_COUNT {
        out[i] = a[i] - b[i];
    }
    out
}

/// Two examples per match with both teams featured: home-vs-away and
/// away-vs-home. Matches involving an unknown team are skipped.
pub fn build_matchups(
    matches: &[MatchRecord],
    teams: &[TeamFeatureRow],
) -> (Vec<MatchupExample>, MatchupSummary) {
    let by_name: HashMap<&str, [f64; TEAM_FEATURE_COUNT]> = teams
        .iter()
        .map(|t| (t.team.as_str(), t.feature_vector()))
        .collect();

    let mut out = Vec::with_capacity(matches.len() * 2);
    let mut summary = MatchupSummary::default();

    for m in matches {
        let (Some(home), Some(away)) = (
            by_name.get(m.home_team.as_str()),
            by_name.get(m.away_team.as_str()),
        ) else {
            debug!("no features for {} v {}; skipping", m.home_team, m.away_team);
            summary.matches_skipped += 1;
            continue;
        };

        out.push(MatchupExample {
            team_a: m.home_team.clone(),
            team_b: m.away_team.clone(),
            diff: feature_diff(home, away),
            label: u8::from(m.home_goals > m.away_goals),
        });
        out.push(MatchupExample {
            team_a: m.away_team.clone(),
            team_b: m.home_team.clone(),
            diff: feature_diff(away, home),
            label: u8::from(m.away_goals > m.home_goals),
        });
        summary.matches_used += 1;
    }

    summary.examples = out.len();
    (out, summary)
}

pub fn write_matchups(path: &Path, examples: &[MatchupExample]) -> Result<()> {
    let mut headers = vec!["team_a".to_string(), "team_b".to_string()];
    headers.extend(diff_column_names());
    headers.push("label".to_string());

    let records: Vec<Vec<String>> = examples
        .iter()
        .map(|e| {
            let mut rec = Vec::with_capacity(headers.len());
            rec.push(e.team_a.clone());
            rec.push(e.team_b.clone());
            rec.extend(e.diff.iter().map(|v| fmt_f64(*v)));
            rec.push(e.label.to_string());
            rec
        })
        .collect();
    write_records(path, &headers, records.iter())
}

pub fn read_matchups(path: &Path) -> Result<Vec<MatchupExample>> {
    matchups_from_table(&Table::read_csv(path)?)
}

pub fn matchups_from_table(table: &Table) -> Result<Vec<MatchupExample>> {
    let col = |name: &str| table.require_column(&[name.to_string()]);
    let a_idx = col("team_a")?;
    let b_idx = col("team_b")?;
    let label_idx = col("label")?;
    let diff_idx = diff_column_names()
        .iter()
        .map(|name| col(name.as_str()))
        .collect::<Result<Vec<_>>>()?;

    let mut out = Vec::with_capacity(table.len());
    for row in &table.rows {
        let (Some(a), Some(b)) = (table.get(row, a_idx), table.get(row, b_idx)) else {
            continue;
        };
        let Some(label) = table.get_f64(row, label_idx) else {
            continue;
        };
        let mut diff = [0.0; TEAM_FEATURE_COUNT];
        let mut complete = true;
        for (slot, &idx) in diff.iter_mut().zip(&diff_idx) {
            match table.get_f64(row, idx) {
                Some(v) => *slot = v,
                None => complete = false,
            }
        }
        if !complete {
            continue;
        }
        out.push(MatchupExample {
            team_a: a.to_string(),
            team_b: b.to_string(),
            diff,
            label: u8::from(label > 0.5),
        });
    }

    if out.is_empty() && !table.is_empty() {
        return Err(PipelineError::EmptyInput {
            context: "matchup dataset (no complete rows)",
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_is_antisymmetric() {
        let a = [1.5, 0.25, 0.5, 0.25, 0.25, 2.0];
        let b = [0.75, 1.0, 0.2, 0.4, 0.4, 0.6];
        let ab = feature_diff(&a, &b);
        let ba = feature_diff(&b, &a);
        for i in 0..TEAM_FEATURE_COUNT {
            assert_eq!(ab[i], -ba[i]);
        }
    }

    fn team(name: &str, goals_for: f64) -> TeamFeatureRow {
        TeamFeatureRow {
            team: name.to_string(),
            avg_goals_for: goals_for,
            avg_goals_against: 1.0,
            win_rate: 0.5,
            draw_rate: 0.25,
            loss_rate: 0.25,
            recent_form: goals_for,
            matches_played: 4,
        }
    }

    fn played(home: &str, away: &str, home_goals: u32, away_goals: u32) -> MatchRecord {
        MatchRecord {
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_goals,
            away_goals,
            kickoff: chrono::NaiveDate::from_ymd_opt(2022, 11, 20)
                .unwrap()
                .and_hms_opt(16, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn labels_follow_the_result_from_each_side() {
        let teams = [team("Brazil", 2.0), team("Serbia", 1.0)];
        let matches = [
            played("Brazil", "Serbia", 2, 0),
            played("Brazil", "Serbia", 1, 1),
            played("Brazil", "Serbia", 0, 1),
        ];
        let (examples, summary) = build_matchups(&matches, &teams);
        let labels: Vec<u8> = examples.iter().map(|e| e.label).collect();
        assert_eq!(labels, vec![1, 0, 0, 0, 0, 1]);
        assert_eq!(examples[0].team_a, "Brazil");
        assert_eq!(examples[1].team_a, "Serbia");
        assert_eq!(examples[0].diff[0], 1.0);
        assert_eq!(examples[1].diff[0], -1.0);
        assert_eq!(
            summary,
            MatchupSummary {
                matches_used: 3,
                matches_skipped: 0,
                examples: 6,
            }
        );
    }

    #[test]
    fn unfeatured_team_is_skipped_and_counted() {
        let teams = [team("Brazil", 2.0), team("Serbia", 1.0)];
        let matches = [
            played("Brazil", "Serbia", 2, 0),
            played("Cameroon", "Serbia", 3, 3),
            played("Brazil", "Switzerland", 1, 0),
        ];
        let (examples, summary) = build_matchups(&matches, &teams);
        assert_eq!(examples.len(), 2);
        assert!(examples.iter().all(|e| e.team_a != "Cameroon" && e.team_b != "Switzerland"));
        assert_eq!(summary.matches_used, 1);
        assert_eq!(summary.matches_skipped, 2);
        assert_eq!(summary.examples, 2);
    }

    #[test]
    fn diff_columns_are_prefixed() {
        let cols = diff_column_names();
        assert_eq!(cols[0], "diff_avg_goals_for");
        assert_eq!(cols.last().unwrap(), "diff_recent_form");
    }
}

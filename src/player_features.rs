use std::collections::HashMap;
use std::path::Path;

use tracing::warn;

use crate::config::{PlayerFeatureSpec, SAVE_PERCENTAGE, SaveSource};
use crate::dataset::PlayerStatRow;
use crate::error::{PipelineError, Result};
use crate::table::{Table, check_columns, fmt_opt, write_records};

const KEY_COLUMNS: [&str; 3] = ["player", "team", "position"];

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerFeatureRow {
    pub player: String,
    pub team: String,
    pub position: Option<String>,
    /// Aligned with `PlayerFeatureTable::columns`.
    pub values: Vec<Option<f64>>,
}

impl PlayerFeatureRow {
    pub fn is_goalkeeper(&self) -> bool {
        is_goalkeeper(self.position.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerFeatureTable {
    columns: Vec<String>,
    rows: Vec<PlayerFeatureRow>,
}

impl PlayerFeatureTable {
    pub fn new(columns: Vec<String>, rows: Vec<PlayerFeatureRow>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[PlayerFeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn value(&self, row: &PlayerFeatureRow, name: &str) -> Option<f64> {
        let idx = self.column_index(name)?;
        row.values.get(idx).copied().flatten()
    }

    /// Values for `names` in order; `None` where absent.
    pub fn values_for(&self, row: &PlayerFeatureRow, names: &[String]) -> Vec<Option<f64>> {
        names.iter().map(|n| self.value(row, n)).collect()
    }

    /// Case-insensitive exact match on the player name; first row wins.
    pub fn find_player(&self, name: &str) -> Result<&PlayerFeatureRow> {
        let wanted = name.trim().to_lowercase();
        self.rows
            .iter()
            .find(|r| r.player.to_lowercase() == wanted)
            .ok_or_else(|| PipelineError::player_not_found(name.trim()))
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut headers: Vec<String> = KEY_COLUMNS.iter().map(|s| s.to_string()).collect();
        headers.extend(self.columns.iter().cloned());
        let records: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| {
                let mut rec = vec![
                    r.player.clone(),
                    r.team.clone(),
                    r.position.clone().unwrap_or_default(),
                ];
                rec.extend(r.values.iter().map(|v| fmt_opt(*v)));
                rec
            })
            .collect();
        write_records(path, &headers, records.iter())
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        Self::from_table(&Table::read_csv(path)?)
    }

    pub fn from_table(table: &Table) -> Result<Self> {
        check_columns(&table.name, &table.headers, &KEY_COLUMNS[..2])?;
        let index = table.index();
        let player_idx = index["player"];
        let team_idx = index["team"];
        let position_idx = index.get("position").copied();

        let feature_cols: Vec<(usize, String)> = table
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !KEY_COLUMNS.contains(&h.as_str()))
            .map(|(i, h)| (i, h.clone()))
            .collect();

        let mut rows = Vec::with_capacity(table.len());
        for raw in &table.rows {
            let (Some(player), Some(team)) = (table.get(raw, player_idx), table.get(raw, team_idx))
            else {
                continue;
            };
            rows.push(PlayerFeatureRow {
                player: player.to_string(),
                team: team.to_string(),
                position: position_idx
                    .and_then(|idx| table.get(raw, idx))
                    .map(str::to_string),
                values: feature_cols
                    .iter()
                    .map(|(idx, _)| table.get_f64(raw, *idx))
                    .collect(),
            });
        }

        Ok(Self {
            columns: feature_cols.into_iter().map(|(_, h)| h).collect(),
            rows,
        })
    }
}

pub fn is_goalkeeper(position: Option<&str>) -> bool {
    let Some(raw) = position else {
        return false;
    };
    let s = raw.trim().to_lowercase();
    s.contains("goalkeeper") || s.contains("keeper") || s == "gk"
}

#[derive(Debug, Default)]
struct Accum {
    position: Option<String>,
    sums: Vec<f64>,
    counts: Vec<u32>,
}

impl Accum {
    fn new(width: usize) -> Self {
        Self {
            position: None,
            sums: vec![0.0; width],
            counts: vec![0; width],
        }
    }

    fn push(&mut self, position: Option<&str>, values: &[Option<f64>]) {
        if self.position.is_none() {
            self.position = position.map(str::to_string);
        }
        for (idx, v) in values.iter().enumerate() {
            if let Some(v) = v {
                self.sums[idx] += v;
                self.counts[idx] += 1;
            }
        }
    }

    fn means(&self) -> Vec<Option<f64>> {
        self.sums
            .iter()
            .zip(&self.counts)
            .map(|(s, &n)| (n > 0).then(|| s / f64::from(n)))
            .collect()
    }
}

/// Per-90 and pass-through features averaged per `(player, team)`.
pub fn compute_player_features(rows: &[PlayerStatRow], spec: &PlayerFeatureSpec) -> PlayerFeatureTable {
    let present = |name: &str| rows.iter().any(|r| r.stats.contains_key(name));

    for stat in &spec.per90 {
        for col in &stat.sum_of {
            if !rows.is_empty() && !present(col) {
                warn!("per-90 stat `{}`: source column `{col}` has no values", stat.name);
            }
        }
    }

    let passthrough: Vec<&String> = spec
        .passthrough
        .iter()
        .filter(|col| {
            let keep = present(col);
            if !keep {
                warn!("pass-through column `{col}` not found in player stats; skipping");
            }
            keep
        })
        .collect();

    let mut columns: Vec<String> = spec.per90.iter().map(|s| s.name.clone()).collect();
    columns.extend(passthrough.iter().map(|s| s.to_string()));
    let has_saves = !matches!(spec.save_percentage, SaveSource::None);
    if has_saves && !columns.iter().any(|c| c == SAVE_PERCENTAGE) {
        columns.push(SAVE_PERCENTAGE.to_string());
    }
    let save_idx = columns.iter().position(|c| c == SAVE_PERCENTAGE);

    let mut order: Vec<(String, String)> = Vec::new();
    let mut groups: HashMap<(String, String), Accum> = HashMap::new();

    for row in rows {
        let mut values: Vec<Option<f64>> = Vec::with_capacity(columns.len());
        for stat in &spec.per90 {
            values.push(per90(row, &stat.sum_of));
        }
        for col in &passthrough {
            values.push(row.stat(col));
        }
        if let Some(idx) = save_idx {
            let save = if is_goalkeeper(row.position.as_deref()) {
                save_percentage(row, &spec.save_percentage)
            } else {
                None
            };
            if idx < values.len() {
                values[idx] = save;
            } else {
                values.push(save);
            }
        }

        let key = (row.player.clone(), row.team.clone());
        let acc = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Accum::new(columns.len())
        });
        acc.push(row.position.as_deref(), &values);
    }

    order.sort();
    let out_rows = order
        .into_iter()
        .filter_map(|key| {
            let acc = groups.remove(&key)?;
            Some(PlayerFeatureRow {
                player: key.0,
                team: key.1,
                position: acc.position.clone(),
                values: acc.means(),
            })
        })
        .collect();

    PlayerFeatureTable::new(columns, out_rows)
}

fn per90(row: &PlayerStatRow, sum_of: &[String]) -> Option<f64> {
    let minutes = row.minutes.filter(|m| *m > 0.0)?;
    let mut total = 0.0;
    for col in sum_of {
        total += row.stat(col)?;
    }
    Some(total / minutes * 90.0)
}

fn save_percentage(row: &PlayerStatRow, source: &SaveSource) -> Option<f64> {
    match source {
        SaveSource::None => None,
        SaveSource::Column { name } => row.stat(name),
        SaveSource::Derived { saves, conceded } => {
            let saves = row.stat(saves)?;
            let faced = saves + row.stat(conceded)?;
            (faced > 0.0).then(|| saves / faced)
        }
    }
}

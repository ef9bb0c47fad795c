use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{PipelineError, Result};
use crate::model::{AwardMetric, RegressorModel};
use crate::player_features::{PlayerFeatureRow, PlayerFeatureTable};

#[derive(Debug, Clone, PartialEq)]
pub struct AwardPrediction {
    pub player: String,
    pub team: String,
    pub position: Option<String>,
    pub goals: Option<f64>,
    pub assists: Option<f64>,
    pub cards: Option<f64>,
    /// Goalkeepers only.
    pub save_percentage: Option<f64>,
}

impl AwardPrediction {
    pub fn get(&self, metric: AwardMetric) -> Option<f64> {
        match metric {
            AwardMetric::Goals => self.goals,
            AwardMetric::Assists => self.assists,
            AwardMetric::Cards => self.cards,
            AwardMetric::Saves => self.save_percentage,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedPlayer {
    pub player: String,
    pub team: String,
    pub position: Option<String>,
    pub value: f64,
}

pub struct AwardPredictor {
    models: HashMap<AwardMetric, RegressorModel>,
    players: PlayerFeatureTable,
}

impl AwardPredictor {
    pub fn new(models: HashMap<AwardMetric, RegressorModel>, players: PlayerFeatureTable) -> Self {
        Self { models, players }
    }

    pub fn from_models(models: Vec<RegressorModel>, players: PlayerFeatureTable) -> Self {
        let models = models.into_iter().map(|m| (m.metric, m)).collect();
        Self::new(models, players)
    }

    pub fn players(&self) -> &PlayerFeatureTable {
        &self.players
    }

    pub fn has_model(&self, metric: AwardMetric) -> bool {
        self.models.contains_key(&metric)
    }

    /// Metrics with a trained model, in canonical order.
    pub fn available_metrics(&self) -> Vec<AwardMetric> {
        AwardMetric::ALL
            .into_iter()
            .filter(|m| self.has_model(*m))
            .collect()
    }

    fn predict_row(&self, metric: AwardMetric, row: &PlayerFeatureRow) -> Result<Option<f64>> {
        let Some(model) = self.models.get(&metric) else {
            return Ok(None);
        };
        if model.goalkeepers_only && !row.is_goalkeeper() {
            return Ok(None);
        }
        let x = self.players.values_for(row, model.feature_names());
        model.predict(&x).map(Some)
    }

    pub fn predict_all_awards(&self, player: &str) -> Result<AwardPrediction> {
        let row = self.players.find_player(player)?;
        Ok(AwardPrediction {
            player: row.player.clone(),
            team: row.team.clone(),
            position: row.position.clone(),
            goals: self.predict_row(AwardMetric::Goals, row)?,
            assists: self.predict_row(AwardMetric::Assists, row)?,
            cards: self.predict_row(AwardMetric::Cards, row)?,
            save_percentage: self.predict_row(AwardMetric::Saves, row)?,
        })
    }

    /// Best `n` players for `metric`. Cards rank ascending, everything else
    /// descending; equal values fall back to the player name.
    pub fn get_top_players(&self, metric: AwardMetric, n: usize) -> Result<Vec<RankedPlayer>> {
        if !self.has_model(metric) {
            return Err(PipelineError::MissingModel {
                metric: metric.to_string(),
            });
        }

        let mut ranked = Vec::new();
        for row in self.players.rows() {
            if metric.goalkeepers_only() && !row.is_goalkeeper() {
                continue;
            }
            if let Some(value) = self.predict_row(metric, row)? {
                ranked.push(RankedPlayer {
                    player: row.player.clone(),
                    team: row.team.clone(),
                    position: row.position.clone(),
                    value,
                });
            }
        }

        ranked.sort_by(|a, b| {
            let by_value = a.value.partial_cmp(&b.value).unwrap_or(Ordering::Equal);
            let by_value = if metric.lower_is_better() {
                by_value
            } else {
                by_value.reverse()
            };
            by_value.then_with(|| a.player.cmp(&b.player))
        });
        ranked.truncate(n);
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinearModel;

    fn regressor(metric: AwardMetric, feature: &str, coeff: f64) -> RegressorModel {
        RegressorModel {
            target: format!("{metric}_target"),
            metric,
            linear: LinearModel {
                feature_names: vec![feature.to_string()],
                feature_means: vec![0.0],
                feature_stds: vec![1.0],
                coeffs: vec![coeff],
                intercept: 0.0,
            },
            goalkeepers_only: metric.goalkeepers_only(),
            test_rmse: None,
            train_samples: 10,
            test_samples: 2,
        }
    }

    fn table() -> PlayerFeatureTable {
        let row = |name: &str, pos: &str, v: f64| PlayerFeatureRow {
            player: name.into(),
            team: "Team".into(),
            position: Some(pos.into()),
            values: vec![Some(v)],
        };
        PlayerFeatureTable::new(
            vec!["signal".into()],
            vec![
                row("Bravo", "Forward", 0.4),
                row("Alpha", "Forward", 0.4),
                row("Keeper", "Goalkeeper", 0.1),
                row("Charlie", "Defender", 0.9),
            ],
        )
    }

    #[test]
    fn ties_break_on_player_name() {
        let p = AwardPredictor::from_models(vec![regressor(AwardMetric::Goals, "signal", 1.0)], table());
        let top = p.get_top_players(AwardMetric::Goals, 3).unwrap();
        let names: Vec<&str> = top.iter().map(|r| r.player.as_str()).collect();
        assert_eq!(names, ["Charlie", "Alpha", "Bravo"]);
    }

    #[test]
    fn saves_rank_goalkeepers_only() {
        let p = AwardPredictor::from_models(vec![regressor(AwardMetric::Saves, "signal", 1.0)], table());
        let top = p.get_top_players(AwardMetric::Saves, 10).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].player, "Keeper");

        let outfield = p.predict_all_awards("charlie").unwrap();
        assert_eq!(outfield.save_percentage, None);
    }

    #[test]
    fn untrained_metric_is_an_error() {
        let p = AwardPredictor::from_models(Vec::new(), table());
        assert!(matches!(
            p.get_top_players(AwardMetric::Assists, 5),
            Err(PipelineError::MissingModel { metric }) if metric == "assists"
        ));
        let all = p.predict_all_awards("Alpha").unwrap();
        assert_eq!(all.goals, None);
    }
}

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::config::{SchemaProfile, TrainingConfig};
use crate::error::{PipelineError, Result};
use crate::evaluation::rmse;
use crate::matchup::{MatchupExample, diff_column_names};
use crate::model::{AwardMetric, ClassifierModel, LinearModel, RegressorModel, sigmoid};
use crate::player_features::PlayerFeatureTable;

pub const MATCH_TARGET: &str = "label";

const CONVERGENCE_EPS: f64 = 1e-9;
const LR_DECAY: f64 = 0.003;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loss {
    /// Binary cross-entropy on `sigmoid(score)`.
    Logistic,
    /// Mean squared error on the raw score.
    Squared,
}

/// Feature matrix with one target per row.
#[derive(Debug, Clone, Default)]
pub struct Samples {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
}

impl Samples {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    fn subset(&self, idx: &[usize]) -> Samples {
        Samples {
            x: idx.iter().map(|&i| self.x[i].clone()).collect(),
            y: idx.iter().map(|&i| self.y[i]).collect(),
        }
    }
}

/// Column means and population standard deviations (floored at 1e-6).
pub fn feature_norm_stats(x: &[Vec<f64>], width: usize) -> (Vec<f64>, Vec<f64>) {
    let mut mean = vec![0.0; width];
    let mut std = vec![1.0; width];
    if x.is_empty() {
        return (mean, std);
    }
    let n = x.len() as f64;
    for row in x {
        for (m, v) in mean.iter_mut().zip(row) {
            *m += v;
        }
    }
    for m in &mut mean {
        *m /= n;
    }

    let mut var = vec![0.0; width];
    for row in x {
        for i in 0..width {
            let d = row[i] - mean[i];
            var[i] += d * d;
        }
    }
    for (s, v) in std.iter_mut().zip(var) {
        *s = (v / n).sqrt().max(1e-6);
    }
    (mean, std)
}

/// Full-batch gradient descent on standardized inputs with L2 on the
/// coefficients (never the intercept).
pub fn fit_linear(
    feature_names: &[String],
    data: &Samples,
    loss: Loss,
    cfg: &TrainingConfig,
) -> LinearModel {
    let width = feature_names.len();
    let (feature_means, feature_stds) = feature_norm_stats(&data.x, width);
    let z: Vec<Vec<f64>> = data
        .x
        .iter()
        .map(|row| {
            (0..width)
                .map(|i| (row[i] - feature_means[i]) / feature_stds[i])
                .collect()
        })
        .collect();

    let n = data.len().max(1) as f64;
    let y_mean = data.y.iter().sum::<f64>() / n;
    let mut intercept = match loss {
        Loss::Squared => y_mean,
        Loss::Logistic => {
            let p = y_mean.clamp(0.01, 0.99);
            (p / (1.0 - p)).ln()
        }
    };
    let mut coeffs = vec![0.0; width];

    for iter in 0..cfg.max_iters {
        let mut grad = vec![0.0; width];
        let mut grad_b = 0.0;
        for (row, &y) in z.iter().zip(&data.y) {
            let score = intercept + dot(&coeffs, row);
            let pred = match loss {
                Loss::Logistic => sigmoid(score),
                Loss::Squared => score,
            };
            let dz = pred - y;
            grad_b += dz;
            for j in 0..width {
                grad[j] += dz * row[j];
            }
        }

        let lr = cfg.learning_rate / (1.0 + iter as f64 * LR_DECAY);
        let mut step = (lr * grad_b / n).abs();
        intercept -= lr * grad_b / n;
        for j in 0..width {
            let g = grad[j] / n + cfg.l2 * coeffs[j];
            coeffs[j] -= lr * g;
            step = step.max((lr * g).abs());
        }

        if step < CONVERGENCE_EPS {
            debug!("converged after {} iterations", iter + 1);
            break;
        }
    }

    LinearModel {
        feature_names: feature_names.to_vec(),
        feature_means,
        feature_stds,
        coeffs,
        intercept,
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn shuffled_indices(n: usize, seed: u64) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    idx.shuffle(&mut rng);
    idx
}

/// Per-fold accuracy of the logistic fit at a 0.5 threshold. Folds are a
/// seeded shuffle dealt round-robin; fewer rows than folds shrinks `k`.
pub fn cross_validate(feature_names: &[String], data: &Samples, cfg: &TrainingConfig) -> Vec<f64> {
    let k = cfg.cv_folds.min(data.len());
    if k < 2 {
        return Vec::new();
    }
    let order = shuffled_indices(data.len(), cfg.seed);

    let mut scores = Vec::with_capacity(k);
    for fold in 0..k {
        let (test_idx, train_idx): (Vec<usize>, Vec<usize>) = order
            .iter()
            .enumerate()
            .map(|(pos, &i)| (pos % k == fold, i))
            .fold((Vec::new(), Vec::new()), |(mut te, mut tr), (is_test, i)| {
                if is_test {
                    te.push(i);
                } else {
                    tr.push(i);
                }
                (te, tr)
            });

        let model = fit_linear(feature_names, &data.subset(&train_idx), Loss::Logistic, cfg);
        let test = data.subset(&test_idx);
        let correct = test
            .x
            .iter()
            .zip(&test.y)
            .filter(|(row, y)| {
                let opts: Vec<Option<f64>> = row.iter().copied().map(Some).collect();
                let p = sigmoid(model.linear_score(&opts));
                (p >= 0.5) == (**y > 0.5)
            })
            .count();
        scores.push(correct as f64 / test.len().max(1) as f64);
    }
    scores
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

pub fn train_match_model(examples: &[MatchupExample], cfg: &TrainingConfig) -> Result<ClassifierModel> {
    if examples.len() < cfg.min_samples {
        return Err(PipelineError::InsufficientData {
            target: MATCH_TARGET.to_string(),
            samples: examples.len(),
            required: cfg.min_samples,
        });
    }

    let names = diff_column_names();
    let data = Samples {
        x: examples.iter().map(|e| e.diff.to_vec()).collect(),
        y: examples.iter().map(|e| f64::from(e.label)).collect(),
    };

    let folds = cross_validate(&names, &data, cfg);
    let (cv_mean, cv_std) = mean_std(&folds);
    info!(
        "match model: {}-fold CV accuracy {:.3} ± {:.3} over {} examples",
        folds.len(),
        cv_mean,
        cv_std,
        data.len()
    );

    Ok(ClassifierModel {
        target: MATCH_TARGET.to_string(),
        linear: fit_linear(&names, &data, Loss::Logistic, cfg),
        cv_accuracy_mean: cv_mean,
        cv_accuracy_std: cv_std,
        train_samples: data.len(),
    })
}

#[derive(Debug, Default)]
pub struct TrainingSummary {
    pub models: Vec<RegressorModel>,
    /// Targets that produced no model, with the reason.
    pub skipped: Vec<(AwardMetric, PipelineError)>,
}

impl TrainingSummary {
    pub fn model(&self, metric: AwardMetric) -> Option<&RegressorModel> {
        self.models.iter().find(|m| m.metric == metric)
    }
}

pub fn train_award_models(
    players: &PlayerFeatureTable,
    profile: &SchemaProfile,
    cfg: &TrainingConfig,
) -> TrainingSummary {
    let mut summary = TrainingSummary::default();
    for target in &profile.award_targets {
        match train_award_model(players, target.metric, &target.target, &target.features, cfg) {
            Ok(model) => {
                info!(
                    "award model `{}` ({}): {} train / {} test rows, hold-out RMSE {}",
                    model.target,
                    model.metric,
                    model.train_samples,
                    model.test_samples,
                    model
                        .test_rmse
                        .map(|v| format!("{v:.4}"))
                        .unwrap_or_else(|| "n/a".to_string())
                );
                summary.models.push(model);
            }
            Err(err) => {
                warn!("skipping award model for {}: {err}", target.metric);
                summary.skipped.push((target.metric, err));
            }
        }
    }
    summary
}

pub fn train_award_model(
    players: &PlayerFeatureTable,
    metric: AwardMetric,
    target: &str,
    features: &[String],
    cfg: &TrainingConfig,
) -> Result<RegressorModel> {
    let insufficient = |samples| PipelineError::InsufficientData {
        target: target.to_string(),
        samples,
        required: cfg.min_samples,
    };

    let Some(target_idx) = players.column_index(target) else {
        return Err(insufficient(0));
    };
    let mut feature_idx = Vec::with_capacity(features.len());
    for name in features {
        match players.column_index(name) {
            Some(idx) => feature_idx.push(idx),
            None => {
                debug!("feature `{name}` absent from player table");
                return Err(insufficient(0));
            }
        }
    }

    let mut data = Samples::default();
    for row in players.rows() {
        if metric.goalkeepers_only() && !row.is_goalkeeper() {
            continue;
        }
        let Some(y) = row.values[target_idx] else {
            continue;
        };
        let x: Option<Vec<f64>> = feature_idx.iter().map(|&i| row.values[i]).collect();
        if let Some(x) = x {
            data.x.push(x);
            data.y.push(y);
        }
    }
    // A hold-out split needs at least one row on each side.
    if data.len() < cfg.min_samples.max(2) {
        return Err(insufficient(data.len()));
    }

    let order = shuffled_indices(data.len(), cfg.seed);
    let n_test = ((data.len() as f64) * cfg.test_fraction).round() as usize;
    let n_test = n_test.clamp(1, data.len() - 1);
    let (test_idx, train_idx) = order.split_at(n_test);
    let train = data.subset(train_idx);
    let test = data.subset(test_idx);

    let linear = fit_linear(features, &train, Loss::Squared, cfg);
    let preds: Vec<f64> = test
        .x
        .iter()
        .map(|row| {
            let opts: Vec<Option<f64>> = row.iter().copied().map(Some).collect();
            linear.linear_score(&opts)
        })
        .collect();

    Ok(RegressorModel {
        target: target.to_string(),
        metric,
        linear,
        goalkeepers_only: metric.goalkeepers_only(),
        test_rmse: rmse(&test.y, &preds).ok(),
        train_samples: train.len(),
        test_samples: test.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player_features::PlayerFeatureRow;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("x{i}")).collect()
    }

    #[test]
    fn squared_loss_recovers_a_line() {
        let data = Samples {
            x: (0..20).map(|i| vec![i as f64]).collect(),
            y: (0..20).map(|i| 3.0 + 2.0 * i as f64).collect(),
        };
        let cfg = TrainingConfig {
            l2: 0.0,
            max_iters: 5000,
            ..Default::default()
        };
        let model = fit_linear(&names(1), &data, Loss::Squared, &cfg);
        let pred = model.linear_score(&[Some(10.0)]);
        assert!((pred - 23.0).abs() < 1e-3, "pred {pred}");
    }

    #[test]
    fn logistic_loss_separates_classes() {
        let data = Samples {
            x: (0..20).map(|i| vec![i as f64 - 10.0]).collect(),
            y: (0..20).map(|i| if i >= 10 { 1.0 } else { 0.0 }).collect(),
        };
        let model = fit_linear(&names(1), &data, Loss::Logistic, &TrainingConfig::default());
        assert!(sigmoid(model.linear_score(&[Some(8.0)])) > 0.8);
        assert!(sigmoid(model.linear_score(&[Some(-8.0)])) < 0.2);
    }

    #[test]
    fn constant_feature_does_not_blow_up() {
        let data = Samples {
            x: vec![vec![1.0]; 6],
            y: vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0],
        };
        let model = fit_linear(&names(1), &data, Loss::Logistic, &TrainingConfig::default());
        assert!(model.coeffs[0].is_finite());
        assert!((sigmoid(model.linear_score(&[Some(1.0)])) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn too_few_matchups_is_insufficient() {
        let err = train_match_model(&[], &TrainingConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientData { samples: 0, required: 5, .. }
        ));
    }

    #[test]
    fn goalkeeper_target_with_few_keepers_is_skipped() {
        let columns = vec!["assists_per_90".to_string(), "save_percentage".to_string()];
        let rows = (0..10)
            .map(|i| PlayerFeatureRow {
                player: format!("P{i}"),
                team: "X".into(),
                position: Some(if i < 2 { "Goalkeeper" } else { "Midfielder" }.into()),
                values: vec![Some(0.1 * i as f64), (i < 2).then_some(0.7)],
            })
            .collect();
        let table = PlayerFeatureTable::new(columns.clone(), rows);
        let err = train_award_model(
            &table,
            AwardMetric::Saves,
            "save_percentage",
            &columns[..1],
            &TrainingConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData { samples: 2, .. }));
    }

    #[test]
    fn folds_are_deterministic() {
        let data = Samples {
            x: (0..30).map(|i| vec![(i % 7) as f64, (i % 3) as f64]).collect(),
            y: (0..30).map(|i| f64::from(u8::from(i % 7 > 3))).collect(),
        };
        let cfg = TrainingConfig::default();
        let a = cross_validate(&names(2), &data, &cfg);
        let b = cross_validate(&names(2), &data, &cfg);
        assert_eq!(a.len(), 5);
        assert_eq!(a, b);
    }
}

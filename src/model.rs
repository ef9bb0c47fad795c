use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::table::ensure_parent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardMetric {
    Goals,
    Assists,
    Cards,
    Saves,
}

impl AwardMetric {
    pub const ALL: [AwardMetric; 4] = [
        AwardMetric::Goals,
        AwardMetric::Assists,
        AwardMetric::Cards,
        AwardMetric::Saves,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AwardMetric::Goals => "goals",
            AwardMetric::Assists => "assists",
            AwardMetric::Cards => "cards",
            AwardMetric::Saves => "saves",
        }
    }

    /// Fewer cards ranks higher.
    pub fn lower_is_better(self) -> bool {
        matches!(self, AwardMetric::Cards)
    }

    pub fn goalkeepers_only(self) -> bool {
        matches!(self, AwardMetric::Saves)
    }
}

impl fmt::Display for AwardMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AwardMetric {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "goals" => Ok(AwardMetric::Goals),
            "assists" => Ok(AwardMetric::Assists),
            "cards" => Ok(AwardMetric::Cards),
            "saves" => Ok(AwardMetric::Saves),
            _ => Err(PipelineError::InvalidMetric(s.trim().to_string())),
        }
    }
}

/// Linear predictor over standardized inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub feature_names: Vec<String>,
    pub feature_means: Vec<f64>,
    pub feature_stds: Vec<f64>,
    pub coeffs: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub fn n_features(&self) -> usize {
        self.coeffs.len()
    }

    pub fn standardized(&self, raw: f64, idx: usize) -> f64 {
        let mean = self.feature_means.get(idx).copied().unwrap_or(0.0);
        let std = self
            .feature_stds
            .get(idx)
            .copied()
            .unwrap_or(1.0)
            .max(1e-6);
        (raw - mean) / std
    }

    /// `intercept + coeffs · standardize(x)`. Absent inputs sit at the
    /// training mean, i.e. contribute zero.
    pub fn linear_score(&self, x: &[Option<f64>]) -> f64 {
        let mut sum = self.intercept;
        for (idx, c) in self.coeffs.iter().enumerate() {
            if let Some(v) = x.get(idx).copied().flatten() {
                sum += c * self.standardized(v, idx);
            }
        }
        sum
    }
}

pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierModel {
    pub target: String,
    pub linear: LinearModel,
    #[serde(default)]
    pub cv_accuracy_mean: f64,
    #[serde(default)]
    pub cv_accuracy_std: f64,
    #[serde(default)]
    pub train_samples: usize,
}

impl ClassifierModel {
    /// Probability of the positive class ("team A wins").
    pub fn predict_proba(&self, x: &[f64]) -> Result<f64> {
        check_width(&self.target, self.linear.n_features(), x.len())?;
        let opts: Vec<Option<f64>> = x.iter().copied().map(Some).collect();
        Ok(sigmoid(self.linear.linear_score(&opts)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressorModel {
    pub target: String,
    pub metric: AwardMetric,
    pub linear: LinearModel,
    #[serde(default)]
    pub goalkeepers_only: bool,
    #[serde(default)]
    pub test_rmse: Option<f64>,
    #[serde(default)]
    pub train_samples: usize,
    #[serde(default)]
    pub test_samples: usize,
}

impl RegressorModel {
    pub fn predict(&self, x: &[Option<f64>]) -> Result<f64> {
        check_width(&self.target, self.linear.n_features(), x.len())?;
        Ok(self.linear.linear_score(x))
    }

    pub fn feature_names(&self) -> &[String] {
        &self.linear.feature_names
    }
}

fn check_width(target: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(PipelineError::FeatureCount {
            target: target.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// A persisted model, tagged by what it can produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainedModel {
    Classifier(ClassifierModel),
    Regressor(RegressorModel),
}

impl TrainedModel {
    pub fn kind_label(&self) -> &'static str {
        match self {
            TrainedModel::Classifier(_) => "classifier",
            TrainedModel::Regressor(_) => "regressor",
        }
    }

    pub fn target(&self) -> &str {
        match self {
            TrainedModel::Classifier(m) => &m.target,
            TrainedModel::Regressor(m) => &m.target,
        }
    }

    pub fn supports_probability(&self) -> bool {
        matches!(self, TrainedModel::Classifier(_))
    }

    pub fn feature_names(&self) -> &[String] {
        match self {
            TrainedModel::Classifier(m) => &m.linear.feature_names,
            TrainedModel::Regressor(m) => &m.linear.feature_names,
        }
    }

    pub fn into_classifier(self) -> Result<ClassifierModel> {
        match self {
            TrainedModel::Classifier(m) => Ok(m),
            TrainedModel::Regressor(m) => Err(PipelineError::Capability {
                target: m.target,
                kind: "regressor",
            }),
        }
    }

    pub fn into_regressor(self) -> Option<RegressorModel> {
        match self {
            TrainedModel::Regressor(m) => Some(m),
            TrainedModel::Classifier(_) => None,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        ensure_parent(path)?;
        let io_err = |source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self).map_err(|source| PipelineError::Artifact {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| PipelineError::Artifact {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(coeffs: Vec<f64>, intercept: f64) -> LinearModel {
        let n = coeffs.len();
        LinearModel {
            feature_names: (0..n).map(|i| format!("f{i}")).collect(),
            feature_means: vec![0.0; n],
            feature_stds: vec![1.0; n],
            coeffs,
            intercept,
        }
    }

    #[test]
    fn metric_parses_case_insensitively() {
        assert_eq!("Cards".parse::<AwardMetric>().unwrap(), AwardMetric::Cards);
        assert!(matches!(
            "offsides".parse::<AwardMetric>(),
            Err(PipelineError::InvalidMetric(m)) if m == "offsides"
        ));
    }

    #[test]
    fn capability_follows_the_tag() {
        let clf = TrainedModel::Classifier(ClassifierModel {
            target: "label".into(),
            linear: linear(vec![1.0], 0.0),
            cv_accuracy_mean: 0.0,
            cv_accuracy_std: 0.0,
            train_samples: 0,
        });
        let reg = TrainedModel::Regressor(RegressorModel {
            target: "goals_scored".into(),
            metric: AwardMetric::Goals,
            linear: linear(vec![1.0], 0.0),
            goalkeepers_only: false,
            test_rmse: None,
            train_samples: 0,
            test_samples: 0,
        });
        assert!(clf.supports_probability());
        assert!(!reg.supports_probability());
        assert!(matches!(
            reg.into_classifier(),
            Err(PipelineError::Capability { kind: "regressor", .. })
        ));
    }

    #[test]
    fn tagged_json_round_trips_kind() {
        let clf = TrainedModel::Classifier(ClassifierModel {
            target: "label".into(),
            linear: linear(vec![0.5, -0.5], 0.1),
            cv_accuracy_mean: 0.6,
            cv_accuracy_std: 0.05,
            train_samples: 10,
        });
        let raw = serde_json::to_string(&clf).unwrap();
        assert!(raw.contains("\"kind\":\"classifier\""));
        assert_eq!(TrainedModel::from_json(&raw).unwrap(), clf);
    }

    #[test]
    fn wrong_width_is_rejected() {
        let clf = ClassifierModel {
            target: "label".into(),
            linear: linear(vec![1.0, 1.0], 0.0),
            cv_accuracy_mean: 0.0,
            cv_accuracy_std: 0.0,
            train_samples: 0,
        };
        assert!(matches!(
            clf.predict_proba(&[1.0]),
            Err(PipelineError::FeatureCount { expected: 2, actual: 1, .. })
        ));
        assert!((clf.predict_proba(&[0.0, 0.0]).unwrap() - 0.5).abs() < 1e-12);
    }
}

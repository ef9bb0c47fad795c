use crate::error::{PipelineError, Result, ensure_same_len};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Home, Outcome::Draw, Outcome::Away];

    pub fn from_goals(home_goals: u32, away_goals: u32) -> Self {
        if home_goals > away_goals {
            Outcome::Home
        } else if home_goals < away_goals {
            Outcome::Away
        } else {
            Outcome::Draw
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prob3 {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl Prob3 {
    pub fn uniform() -> Self {
        Self {
            home: 1.0 / 3.0,
            draw: 1.0 / 3.0,
            away: 1.0 / 3.0,
        }
    }

    pub fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }

    /// Most likely outcome; ties prefer home, then draw.
    pub fn favourite(&self) -> Outcome {
        if self.home >= self.draw && self.home >= self.away {
            Outcome::Home
        } else if self.draw >= self.away {
            Outcome::Draw
        } else {
            Outcome::Away
        }
    }

    /// Same distribution seen from the other side.
    pub fn swapped(self) -> Self {
        Self {
            home: self.away,
            draw: self.draw,
            away: self.home,
        }
    }

    pub fn normalized(self) -> Self {
        let home = self.home.max(0.0);
        let draw = self.draw.max(0.0);
        let away = self.away.max(0.0);
        let total = home + draw + away;
        if total <= 0.0 || !total.is_finite() {
            return Self::uniform();
        }
        Self {
            home: home / total,
            draw: draw / total,
            away: away / total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub samples: usize,
    pub accuracy: f64,
    pub brier: Option<f64>,
    pub rmse: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutcomeMetrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

fn check_inputs(left: usize, right: usize, context: &'static str) -> Result<()> {
    ensure_same_len(left, right)?;
    if left == 0 {
        return Err(PipelineError::EmptyInput { context });
    }
    Ok(())
}

/// Fraction of positions where prediction equals truth.
pub fn accuracy<T: PartialEq>(y_true: &[T], y_pred: &[T]) -> Result<f64> {
    check_inputs(y_true.len(), y_pred.len(), "accuracy")?;
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Mean squared error between binary outcomes and predicted probabilities.
pub fn brier_score(y_true: &[u8], y_prob: &[f64]) -> Result<f64> {
    check_inputs(y_true.len(), y_prob.len(), "brier score")?;
    let sum: f64 = y_true
        .iter()
        .zip(y_prob)
        .map(|(&y, &p)| (f64::from(y) - p).powi(2))
        .sum();
    Ok(sum / y_true.len() as f64)
}

pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_inputs(y_true.len(), y_pred.len(), "rmse")?;
    let sum: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    Ok((sum / y_true.len() as f64).sqrt())
}

pub fn log_loss(y_true: &[u8], y_prob: &[f64]) -> Result<f64> {
    check_inputs(y_true.len(), y_prob.len(), "log loss")?;
    let sum: f64 = y_true
        .iter()
        .zip(y_prob)
        .map(|(&y, &p)| {
            let p = p.clamp(1e-12, 1.0 - 1e-12);
            if y > 0 { -p.ln() } else { -(1.0 - p).ln() }
        })
        .sum();
    Ok(sum / y_true.len() as f64)
}

/// Accuracy, plus Brier and RMSE of `y_prob` when given; `positive` marks the
/// class the probabilities refer to (e.g. "win").
pub fn evaluate_predictions<T: PartialEq>(
    y_true: &[T],
    y_pred: &[T],
    y_prob: Option<&[f64]>,
    positive: &T,
) -> Result<Metrics> {
    let acc = accuracy(y_true, y_pred)?;
    let (brier, rmse_value) = match y_prob {
        Some(probs) => {
            let bin: Vec<u8> = y_true.iter().map(|y| u8::from(y == positive)).collect();
            let as_f64: Vec<f64> = bin.iter().map(|&b| f64::from(b)).collect();
            (Some(brier_score(&bin, probs)?), Some(rmse(&as_f64, probs)?))
        }
        None => (None, None),
    };
    Ok(Metrics {
        samples: y_true.len(),
        accuracy: acc,
        brier,
        rmse: rmse_value,
    })
}

/// Three-way Brier (summed over outcomes), log loss of the realized outcome
/// and hit rate of the favourite.
pub fn evaluate_outcome_probs(predictions: &[Prob3], outcomes: &[Outcome]) -> Result<OutcomeMetrics> {
    check_inputs(predictions.len(), outcomes.len(), "outcome probabilities")?;
    let n = predictions.len() as f64;

    let brier = predictions
        .iter()
        .zip(outcomes)
        .map(|(p, &o)| {
            Outcome::ALL
                .iter()
                .map(|&k| (p.get(k) - if k == o { 1.0 } else { 0.0 }).powi(2))
                .sum::<f64>()
        })
        .sum::<f64>()
        / n;
    let log_loss = predictions
        .iter()
        .zip(outcomes)
        .map(|(p, &o)| -p.get(o).clamp(1e-12, 1.0).ln())
        .sum::<f64>()
        / n;
    let favourites: Vec<Outcome> = predictions.iter().map(|p| p.favourite()).collect();

    Ok(OutcomeMetrics {
        samples: predictions.len(),
        brier,
        log_loss,
        accuracy: accuracy(outcomes, &favourites[..])?,
    })
}

/// Equal-width probability buckets; empty buckets are omitted.
pub fn calibration_bins(y_true: &[u8], y_prob: &[f64], bins: usize) -> Result<Vec<CalibrationBin>> {
    check_inputs(y_true.len(), y_prob.len(), "calibration bins")?;
    let bins = bins.max(1);
    let mut sums = vec![(0usize, 0.0_f64, 0.0_f64); bins];
    for (&y, &p) in y_true.iter().zip(y_prob) {
        let p = p.clamp(0.0, 1.0);
        let idx = ((p * bins as f64) as usize).min(bins - 1);
        let slot = &mut sums[idx];
        slot.0 += 1;
        slot.1 += p;
        slot.2 += f64::from(y.min(1));
    }

    let width = 1.0 / bins as f64;
    Ok(sums
        .into_iter()
        .enumerate()
        .filter(|(_, (count, _, _))| *count > 0)
        .map(|(idx, (count, pred_sum, actual_sum))| CalibrationBin {
            bucket_start: idx as f64 * width,
            bucket_end: (idx + 1) as f64 * width,
            count,
            avg_pred: pred_sum / count as f64,
            actual_rate: actual_sum / count as f64,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_three_way_predictions_have_zero_brier() {
        let preds = vec![
            Prob3 {
                home: 1.0,
                draw: 0.0,
                away: 0.0,
            },
            Prob3 {
                home: 0.0,
                draw: 1.0,
                away: 0.0,
            },
            Prob3 {
                home: 0.0,
                draw: 0.0,
                away: 1.0,
            },
        ];
        let outcomes = vec![Outcome::Home, Outcome::Draw, Outcome::Away];
        let m = evaluate_outcome_probs(&preds, &outcomes).unwrap();
        assert_eq!(m.samples, 3);
        assert!(m.brier < 1e-12);
        assert!((m.accuracy - 1.0).abs() < 1e-12);
    }

    #[test]
    fn favourite_ties_prefer_home_then_draw() {
        let level = Prob3 {
            home: 0.2,
            draw: 0.4,
            away: 0.4,
        };
        assert_eq!(level.favourite(), Outcome::Draw);
        assert_eq!(Prob3::uniform().favourite(), Outcome::Home);

        let m = evaluate_outcome_probs(&[level, level], &[Outcome::Draw, Outcome::Away]).unwrap();
        assert!((m.accuracy - 0.5).abs() < 1e-12);
        // 0.04 + 0.36 + 0.16 and 0.04 + 0.16 + 0.36.
        assert!((m.brier - 0.56).abs() < 1e-12);
        assert!((m.log_loss + 0.4_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn normalized_keeps_distribution_summing_to_one() {
        let p = Prob3 {
            home: 0.7,
            draw: -0.1,
            away: 0.6,
        }
        .normalized();
        let sum = p.home + p.draw + p.away;
        assert!((sum - 1.0).abs() < 1e-9);
        assert_eq!(p.draw, 0.0);
    }

    #[test]
    fn calibration_bins_group_by_probability() {
        let bins = calibration_bins(&[1, 0, 1, 1], &[0.05, 0.15, 0.95, 1.0], 10).unwrap();
        assert_eq!(bins.len(), 3);
        assert_eq!(bins[2].count, 2);
        assert!((bins[2].actual_rate - 1.0).abs() < 1e-12);
        assert!((bins[0].bucket_end - 0.1).abs() < 1e-12);
    }
}

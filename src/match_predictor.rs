use crate::error::{PipelineError, Result};
use crate::evaluation::Prob3;
use crate::matchup::feature_diff;
use crate::model::{ClassifierModel, TrainedModel};
use crate::team_features::TeamFeatureRow;

#[derive(Debug, Clone, PartialEq)]
pub struct WinProbability {
    pub team_a: String,
    pub team_b: String,
    pub prob_a: f64,
    pub prob_b: f64,
}

/// Head-to-head predictor over a trained classifier and the team table it
/// was trained against.
#[derive(Debug, Clone)]
pub struct MatchPredictor {
    model: ClassifierModel,
    teams: Vec<TeamFeatureRow>,
}

impl MatchPredictor {
    pub fn new(model: ClassifierModel, teams: Vec<TeamFeatureRow>) -> Self {
        Self { model, teams }
    }

    /// Fails with a capability error for anything but a classifier.
    pub fn from_model(model: TrainedModel, teams: Vec<TeamFeatureRow>) -> Result<Self> {
        Ok(Self::new(model.into_classifier()?, teams))
    }

    pub fn model(&self) -> &ClassifierModel {
        &self.model
    }

    pub fn teams(&self) -> &[TeamFeatureRow] {
        &self.teams
    }

    pub fn team_row(&self, name: &str) -> Result<&TeamFeatureRow> {
        self.teams
            .iter()
            .find(|t| t.matches_name(name))
            .ok_or_else(|| PipelineError::team_not_found(name.trim()))
    }

    fn oriented(&self, a: &TeamFeatureRow, b: &TeamFeatureRow) -> Result<(f64, f64)> {
        let va = a.feature_vector();
        let vb = b.feature_vector();
        let p_ab = self.model.predict_proba(&feature_diff(&va, &vb))?;
        let p_ba = self.model.predict_proba(&feature_diff(&vb, &va))?;
        Ok((p_ab, p_ba))
    }

    /// Symmetrized: averages A's view with the complement of B's view, so
    /// swapping the arguments swaps the probabilities.
    pub fn predict(&self, team_a: &str, team_b: &str) -> Result<WinProbability> {
        let a = self.team_row(team_a)?;
        let b = self.team_row(team_b)?;
        let (p_ab, p_ba) = self.oriented(a, b)?;
        let prob_a = (p_ab + (1.0 - p_ba)) / 2.0;
        Ok(WinProbability {
            team_a: a.team.clone(),
            team_b: b.team.clone(),
            prob_a,
            prob_b: 1.0 - prob_a,
        })
    }

    pub fn predict_pair(&self, team_a: &str, team_b: &str) -> Result<(f64, f64)> {
        let p = self.predict(team_a, team_b)?;
        Ok((p.prob_a, p.prob_b))
    }

    /// Raw `f(A - B)`.
    pub fn directional_probability(&self, team_a: &str, team_b: &str) -> Result<f64> {
        let a = self.team_row(team_a)?;
        let b = self.team_row(team_b)?;
        self.model
            .predict_proba(&feature_diff(&a.feature_vector(), &b.feature_vector()))
    }

    /// A-win / draw / B-win. The draw share is whatever neither side's win
    /// probability claims.
    pub fn outcome_probabilities(&self, team_a: &str, team_b: &str) -> Result<Prob3> {
        let a = self.team_row(team_a)?;
        let b = self.team_row(team_b)?;
        let (home, away) = self.oriented(a, b)?;
        let claimed = home + away;
        if claimed >= 1.0 {
            return Ok(Prob3 {
                home: home / claimed,
                draw: 0.0,
                away: away / claimed,
            });
        }
        Ok(Prob3 {
            home,
            draw: 1.0 - claimed,
            away,
        })
    }
}

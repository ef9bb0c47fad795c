//! Stage runners: resolve file locations from the configuration and call the
//! pure stage functions. Each stage reads its whole input and writes a
//! complete output, so re-running on unchanged input reproduces it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::award_predictor::AwardPredictor;
use crate::clean::{CleanSummary, clean_dir};
use crate::config::PipelineConfig;
use crate::dataset::{MatchRecord, load_matches, load_player_rows};
use crate::error::{PipelineError, Result};
use crate::match_predictor::MatchPredictor;
use crate::matchup::{MatchupSummary, build_matchups, read_matchups, write_matchups};
use crate::model::{AwardMetric, ClassifierModel, TrainedModel};
use crate::player_features::{PlayerFeatureTable, compute_player_features};
use crate::table::Table;
use crate::team_features::{compute_team_features, read_team_features, write_team_features};
use crate::train::{TrainingSummary, train_award_models, train_match_model};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSummary {
    pub matches: usize,
    pub teams: usize,
    /// `None` when the profile's player file is absent.
    pub players: Option<usize>,
}

#[derive(Debug, Default)]
pub struct TrainReport {
    pub match_model: Option<ClassifierModel>,
    /// Why the match model was not written, if it wasn't.
    pub match_skipped: Option<PipelineError>,
    pub awards: TrainingSummary,
}

pub fn run_clean(cfg: &PipelineConfig) -> Result<Vec<(PathBuf, CleanSummary)>> {
    let done = clean_dir(&cfg.paths.data_dir)?;
    if done.is_empty() {
        warn!("no raw CSV files found in {}", cfg.paths.data_dir.display());
    }
    Ok(done)
}

pub fn load_match_records(cfg: &PipelineConfig) -> Result<Vec<MatchRecord>> {
    let table = Table::read_csv(&cfg.paths.cleaned_matches(&cfg.profile))?;
    load_matches(&table, &cfg.profile.match_columns)
}

pub fn build_player_table(cfg: &PipelineConfig, path: &Path) -> Result<PlayerFeatureTable> {
    let table = Table::read_csv(path)?;
    let rows = load_player_rows(&table, &cfg.profile.player_columns)?;
    Ok(compute_player_features(&rows, &cfg.profile.player_features))
}

pub fn run_features(cfg: &PipelineConfig) -> Result<FeatureSummary> {
    let matches = load_match_records(cfg)?;
    let teams = compute_team_features(&matches);
    let team_path = cfg.paths.team_features();
    write_team_features(&team_path, &teams)?;
    info!(
        "wrote {} team rows from {} matches to {}",
        teams.len(),
        matches.len(),
        team_path.display()
    );

    let players_in = cfg.paths.cleaned_players(&cfg.profile);
    let players = if players_in.exists() {
        let table = build_player_table(cfg, &players_in)?;
        let out = cfg.paths.player_features();
        table.write_csv(&out)?;
        info!(
            "wrote {} player rows ({} feature columns) to {}",
            table.len(),
            table.columns().len(),
            out.display()
        );
        Some(table.len())
    } else {
        warn!(
            "{} not found; skipping player features",
            players_in.display()
        );
        remove_stale(&cfg.paths.player_features())?;
        None
    };

    Ok(FeatureSummary {
        matches: matches.len(),
        teams: teams.len(),
        players,
    })
}

pub fn run_matchups(cfg: &PipelineConfig) -> Result<MatchupSummary> {
    let matches = load_match_records(cfg)?;
    let teams = read_team_features(&cfg.paths.team_features())?;
    let (examples, summary) = build_matchups(&matches, &teams);
    let out = cfg.paths.matchup_dataset();
    write_matchups(&out, &examples)?;
    info!(
        "wrote {} matchup rows from {} matches ({} skipped) to {}",
        summary.examples,
        summary.matches_used,
        summary.matches_skipped,
        out.display()
    );
    Ok(summary)
}

pub fn run_train(cfg: &PipelineConfig) -> Result<TrainReport> {
    let mut report = TrainReport::default();

    let examples = read_matchups(&cfg.paths.matchup_dataset())?;
    let match_path = cfg.paths.match_model();
    match train_match_model(&examples, &cfg.training) {
        Ok(model) => {
            TrainedModel::Classifier(model.clone()).save(&match_path)?;
            info!("saved match model to {}", match_path.display());
            report.match_model = Some(model);
        }
        Err(err @ PipelineError::InsufficientData { .. }) => {
            warn!("match model not trained: {err}");
            remove_stale(&match_path)?;
            report.match_skipped = Some(err);
        }
        Err(err) => return Err(err),
    }

    let players_path = cfg.paths.player_features();
    if !players_path.exists() {
        warn!(
            "{} not found; skipping award models",
            players_path.display()
        );
        for metric in AwardMetric::ALL {
            remove_stale(&cfg.paths.award_model(metric))?;
        }
        return Ok(report);
    }
    let players = PlayerFeatureTable::read_csv(&players_path)?;
    report.awards = train_award_models(&players, &cfg.profile, &cfg.training);

    for model in &report.awards.models {
        let path = cfg.paths.award_model(model.metric);
        TrainedModel::Regressor(model.clone()).save(&path)?;
        info!("saved award model `{}` to {}", model.target, path.display());
    }
    for (metric, _) in &report.awards.skipped {
        remove_stale(&cfg.paths.award_model(*metric))?;
    }
    Ok(report)
}

// A skipped target must not leave last run's artifact behind.
fn remove_stale(path: &Path) -> Result<()> {
    if path.exists() {
        warn!("removing stale artifact {}", path.display());
        fs::remove_file(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

pub fn load_match_predictor(cfg: &PipelineConfig) -> Result<MatchPredictor> {
    let model = TrainedModel::load(&cfg.paths.match_model())?;
    let teams = read_team_features(&cfg.paths.team_features())?;
    MatchPredictor::from_model(model, teams)
}

/// Loads whichever award artifacts exist; missing ones leave that metric
/// without a model.
pub fn load_award_predictor(cfg: &PipelineConfig) -> Result<AwardPredictor> {
    let players = PlayerFeatureTable::read_csv(&cfg.paths.player_features())?;
    let mut models = HashMap::new();
    for metric in AwardMetric::ALL {
        let path = cfg.paths.award_model(metric);
        if !path.exists() {
            warn!("no {metric} model at {}", path.display());
            continue;
        }
        let model = TrainedModel::load(&path)?;
        let kind = model.kind_label();
        match model.into_regressor() {
            Some(reg) => {
                models.insert(metric, reg);
            }
            None => warn!("{} holds a {kind}, not a regressor; ignoring", path.display()),
        }
    }
    Ok(AwardPredictor::new(models, players))
}

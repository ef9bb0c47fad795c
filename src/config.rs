// Pipeline configuration: schema profiles, file locations and training knobs.
//
// Sources, lowest priority first: built-in defaults, an optional `wc26.toml`
// (or the file named by WC26_CONFIG), then WC26_* environment variables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::model::AwardMetric;

pub const CONFIG_FILE: &str = "wc26.toml";
pub const DEFAULT_PROFILE: &str = "per90";
pub const SAVE_PERCENTAGE: &str = "save_percentage";

pub const ENV_CONFIG: &str = "WC26_CONFIG";
pub const ENV_PROFILE: &str = "WC26_PROFILE";
pub const ENV_DATA_DIR: &str = "WC26_DATA_DIR";
pub const ENV_MODELS_DIR: &str = "WC26_MODELS_DIR";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("unknown schema profile `{0}`")]
    UnknownProfile(String),

    #[error("validation error for field `{field}`: {message}")]
    Validation { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Schema profiles
// ---------------------------------------------------------------------------

/// Column aliases for the matches table. The first alias present wins.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchColumns {
    pub home_team: Vec<String>,
    pub away_team: Vec<String>,
    pub home_goals: Vec<String>,
    pub away_goals: Vec<String>,
    pub date: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerColumns {
    pub player: Vec<String>,
    /// Team or nationality; together with `player` forms the row key.
    pub team: Vec<String>,
    #[serde(default)]
    pub position: Vec<String>,
    #[serde(default)]
    pub minutes: Vec<String>,
}

/// A rate derived as `sum(sum_of) / minutes * 90`.
#[derive(Debug, Clone, Deserialize)]
pub struct Per90Stat {
    pub name: String,
    pub sum_of: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SaveSource {
    #[default]
    None,
    Derived {
        saves: String,
        conceded: String,
    },
    Column {
        name: String,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerFeatureSpec {
    #[serde(default)]
    pub per90: Vec<Per90Stat>,
    #[serde(default)]
    pub passthrough: Vec<String>,
    #[serde(default)]
    pub save_percentage: SaveSource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AwardTarget {
    pub metric: AwardMetric,
    pub target: String,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaProfile {
    /// Filled from the profile's key when loaded from TOML.
    #[serde(default)]
    pub name: String,
    pub matches_file: String,
    pub players_file: String,
    pub match_columns: MatchColumns,
    pub player_columns: PlayerColumns,
    #[serde(default)]
    pub player_features: PlayerFeatureSpec,
    #[serde(default)]
    pub award_targets: Vec<AwardTarget>,
}

impl SchemaProfile {
    pub fn award_target(&self, metric: AwardMetric) -> Option<&AwardTarget> {
        self.award_targets.iter().find(|t| t.metric == metric)
    }
}

fn aliases(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn worldcup_match_columns() -> MatchColumns {
    MatchColumns {
        home_team: aliases(&["home_team_name", "home_team", "home"]),
        away_team: aliases(&["away_team_name", "away_team", "away"]),
        home_goals: aliases(&["home_team_goals", "home_goals", "home_score"]),
        away_goals: aliases(&["away_team_goals", "away_goals", "away_score"]),
        date: aliases(&["datetime", "date", "match_date", "kickoff"]),
    }
}

fn target(metric: AwardMetric, target: &str, features: &[&str]) -> AwardTarget {
    AwardTarget {
        metric,
        target: target.to_string(),
        features: aliases(features),
    }
}

/// Player stats that arrive already normalized to 90 minutes.
pub fn per90_profile() -> SchemaProfile {
    SchemaProfile {
        name: "per90".to_string(),
        matches_file: "WorldCupMatches.csv".to_string(),
        players_file: "player_stats.csv".to_string(),
        match_columns: worldcup_match_columns(),
        player_columns: PlayerColumns {
            player: aliases(&["player_name", "player"]),
            team: aliases(&["nationality", "team", "team_name"]),
            position: aliases(&["position", "pos"]),
            minutes: Vec::new(),
        },
        player_features: PlayerFeatureSpec {
            per90: Vec::new(),
            passthrough: aliases(&[
                "goals_scored",
                "assists_provided",
                "cards_per_90",
                "dribbles_per_90",
                "interceptions_per_90",
                "tackles_per_90",
                "total_duels_won_per_90",
                "clean_sheets",
            ]),
            save_percentage: SaveSource::Column {
                name: SAVE_PERCENTAGE.to_string(),
            },
        },
        award_targets: vec![
            target(
                AwardMetric::Goals,
                "goals_scored",
                &[
                    "assists_provided",
                    "dribbles_per_90",
                    "interceptions_per_90",
                    "tackles_per_90",
                    "total_duels_won_per_90",
                ],
            ),
            target(
                AwardMetric::Assists,
                "assists_provided",
                &[
                    "goals_scored",
                    "dribbles_per_90",
                    "interceptions_per_90",
                    "tackles_per_90",
                    "total_duels_won_per_90",
                ],
            ),
            target(
                AwardMetric::Cards,
                "cards_per_90",
                &[
                    "dribbles_per_90",
                    "interceptions_per_90",
                    "tackles_per_90",
                    "total_duels_won_per_90",
                ],
            ),
            target(
                AwardMetric::Saves,
                SAVE_PERCENTAGE,
                &[
                    "clean_sheets",
                    "interceptions_per_90",
                    "tackles_per_90",
                    "total_duels_won_per_90",
                ],
            ),
        ],
    }
}

/// Raw per-match totals plus minutes played; rates are derived here.
pub fn minutes_profile() -> SchemaProfile {
    SchemaProfile {
        name: "minutes".to_string(),
        matches_file: "WorldCupMatches.csv".to_string(),
        players_file: "WorldCupPlayers.csv".to_string(),
        match_columns: worldcup_match_columns(),
        player_columns: PlayerColumns {
            player: aliases(&["player_name", "player"]),
            team: aliases(&["team", "team_initials", "nationality"]),
            position: aliases(&["position", "pos"]),
            minutes: aliases(&["minutes_played", "minutes", "mins"]),
        },
        player_features: PlayerFeatureSpec {
            per90: vec![
                Per90Stat {
                    name: "goals_per_90".to_string(),
                    sum_of: aliases(&["goals"]),
                },
                Per90Stat {
                    name: "assists_per_90".to_string(),
                    sum_of: aliases(&["assists"]),
                },
                Per90Stat {
                    name: "cards_per_90".to_string(),
                    sum_of: aliases(&["yellow_cards", "red_cards"]),
                },
            ],
            passthrough: Vec::new(),
            save_percentage: SaveSource::Derived {
                saves: "saves".to_string(),
                conceded: "goals_conceded".to_string(),
            },
        },
        award_targets: vec![
            target(AwardMetric::Goals, "goals_per_90", &["assists_per_90", "cards_per_90"]),
            target(AwardMetric::Assists, "assists_per_90", &["goals_per_90", "cards_per_90"]),
            target(AwardMetric::Cards, "cards_per_90", &["goals_per_90", "assists_per_90"]),
            target(AwardMetric::Saves, SAVE_PERCENTAGE, &["assists_per_90", "cards_per_90"]),
        ],
    }
}

pub fn builtin_profile(name: &str) -> Option<SchemaProfile> {
    match name.trim().to_ascii_lowercase().as_str() {
        "per90" => Some(per90_profile()),
        "minutes" => Some(minutes_profile()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Paths and training knobs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DataPaths {
    pub data_dir: PathBuf,
    pub models_dir: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/processed"),
            models_dir: PathBuf::from("models"),
        }
    }
}

impl DataPaths {
    pub fn new(data_dir: impl Into<PathBuf>, models_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            models_dir: models_dir.into(),
        }
    }

    pub fn cleaned_matches(&self, profile: &SchemaProfile) -> PathBuf {
        self.data_dir
            .join(crate::clean::cleaned_file_name(&profile.matches_file))
    }

    pub fn cleaned_players(&self, profile: &SchemaProfile) -> PathBuf {
        self.data_dir
            .join(crate::clean::cleaned_file_name(&profile.players_file))
    }

    pub fn team_features(&self) -> PathBuf {
        self.data_dir.join("team_features.csv")
    }

    pub fn player_features(&self) -> PathBuf {
        self.data_dir.join("player_features.csv")
    }

    pub fn matchup_dataset(&self) -> PathBuf {
        self.data_dir.join("matchup_dataset.csv")
    }

    pub fn groups(&self) -> PathBuf {
        self.data_dir.join("groups.toml")
    }

    pub fn match_model(&self) -> PathBuf {
        self.models_dir.join("match_model.json")
    }

    pub fn award_model(&self, metric: AwardMetric) -> PathBuf {
        self.models_dir
            .join(format!("award_model_{}.json", metric.as_str()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub seed: u64,
    pub cv_folds: usize,
    pub test_fraction: f64,
    pub min_samples: usize,
    pub l2: f64,
    pub max_iters: usize,
    pub learning_rate: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            cv_folds: 5,
            test_fraction: 0.2,
            min_samples: 5,
            l2: 0.01,
            max_iters: 2000,
            learning_rate: 0.1,
        }
    }
}

// ---------------------------------------------------------------------------
// File format and assembly
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsSection {
    pub data_dir: Option<PathBuf>,
    pub models_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub profile: Option<String>,
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub training: Option<TrainingConfig>,
    #[serde(default)]
    pub profiles: HashMap<String, SchemaProfile>,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub profile: SchemaProfile,
    pub paths: DataPaths,
    pub training: TrainingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            profile: per90_profile(),
            paths: DataPaths::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Layer an optional config file and environment lookups over the defaults.
    pub fn from_sources<F>(file: Option<ConfigFile>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = file.unwrap_or_default();

        let profile_name = env(ENV_PROFILE)
            .filter(|s| !s.trim().is_empty())
            .or(file.profile.clone())
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
        let profile = resolve_profile(&profile_name, &file.profiles)?;

        let mut paths = DataPaths::default();
        if let Some(dir) = file.paths.data_dir {
            paths.data_dir = dir;
        }
        if let Some(dir) = file.paths.models_dir {
            paths.models_dir = dir;
        }
        if let Some(dir) = env(ENV_DATA_DIR).filter(|s| !s.trim().is_empty()) {
            paths.data_dir = PathBuf::from(dir.trim());
        }
        if let Some(dir) = env(ENV_MODELS_DIR).filter(|s| !s.trim().is_empty()) {
            paths.models_dir = PathBuf::from(dir.trim());
        }

        let config = Self {
            profile,
            paths,
            training: file.training.unwrap_or_default(),
        };
        validate(&config)?;
        Ok(config)
    }
}

fn resolve_profile(
    name: &str,
    custom: &HashMap<String, SchemaProfile>,
) -> Result<SchemaProfile, ConfigError> {
    if let Some(profile) = custom.get(name) {
        let mut profile = profile.clone();
        profile.name = name.to_string();
        return Ok(profile);
    }
    builtin_profile(name).ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))
}

pub fn parse_config_file(text: &str, path: &Path) -> Result<ConfigFile, ConfigError> {
    toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load configuration from the working directory and process environment.
pub fn load_config() -> Result<PipelineConfig, ConfigError> {
    let explicit = std::env::var(ENV_CONFIG).ok().map(PathBuf::from);
    let path = explicit.clone().unwrap_or_else(|| PathBuf::from(CONFIG_FILE));

    let file = if path.exists() {
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Some(parse_config_file(&text, &path)?)
    } else if let Some(path) = explicit {
        return Err(ConfigError::Read {
            path,
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
    } else {
        None
    };

    PipelineConfig::from_sources(file, |key| std::env::var(key).ok())
}

fn validate(config: &PipelineConfig) -> Result<(), ConfigError> {
    let t = &config.training;
    if t.cv_folds < 2 {
        return Err(ConfigError::Validation {
            field: "training.cv_folds".into(),
            message: format!("must be at least 2, got {}", t.cv_folds),
        });
    }
    if !(t.test_fraction > 0.0 && t.test_fraction < 1.0) {
        return Err(ConfigError::Validation {
            field: "training.test_fraction".into(),
            message: format!("must be in (0, 1), got {}", t.test_fraction),
        });
    }
    if t.max_iters == 0 || !(t.learning_rate > 0.0) || t.l2 < 0.0 {
        return Err(ConfigError::Validation {
            field: "training".into(),
            message: "max_iters and learning_rate must be positive, l2 non-negative".into(),
        });
    }

    let p = &config.profile;
    let columns = [
        ("match_columns.home_team", &p.match_columns.home_team),
        ("match_columns.away_team", &p.match_columns.away_team),
        ("match_columns.home_goals", &p.match_columns.home_goals),
        ("match_columns.away_goals", &p.match_columns.away_goals),
        ("match_columns.date", &p.match_columns.date),
        ("player_columns.player", &p.player_columns.player),
        ("player_columns.team", &p.player_columns.team),
    ];
    for (field, list) in columns {
        if list.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::Validation {
                field: format!("profiles.{}.{field}", p.name),
                message: "at least one column alias is required".into(),
            });
        }
    }
    for target in &p.award_targets {
        if target.features.iter().any(|f| f == &target.target) {
            return Err(ConfigError::Validation {
                field: format!("profiles.{}.award_targets", p.name),
                message: format!("target `{}` appears in its own feature set", target.target),
            });
        }
    }
    if !p.player_features.per90.is_empty() && p.player_columns.minutes.is_empty() {
        return Err(ConfigError::Validation {
            field: format!("profiles.{}.player_columns.minutes", p.name),
            message: "per-90 stats need a minutes column".into(),
        });
    }
    Ok(())
}

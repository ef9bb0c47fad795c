use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Team or player name absent from a feature table. Always recoverable.
    #[error("{entity} '{name}' not found in {entity} features")]
    Lookup { entity: &'static str, name: String },

    #[error("{table}: missing required column `{column}`; available columns: {available:?}")]
    Schema {
        table: String,
        column: String,
        available: Vec<String>,
    },

    #[error("insufficient data for {target}: {samples} usable samples, need at least {required}")]
    InsufficientData {
        target: String,
        samples: usize,
        required: usize,
    },

    #[error("failed to read or write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("model artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("length mismatch: {left} vs {right} elements")]
    LengthMismatch { left: usize, right: usize },

    #[error("{context}: no input values")]
    EmptyInput { context: &'static str },

    #[error("model `{target}` expects {expected} features, got {actual}")]
    FeatureCount {
        target: String,
        expected: usize,
        actual: usize,
    },

    #[error("model `{target}` is a {kind}; probability output is not supported")]
    Capability { target: String, kind: &'static str },

    #[error("no trained model for metric `{metric}`")]
    MissingModel { metric: String },

    #[error("invalid metric '{0}'; choose from: goals, assists, cards, saves")]
    InvalidMetric(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    pub fn team_not_found(name: &str) -> Self {
        Self::Lookup {
            entity: "team",
            name: name.to_string(),
        }
    }

    pub fn player_not_found(name: &str) -> Self {
        Self::Lookup {
            entity: "player",
            name: name.to_string(),
        }
    }

    pub fn is_lookup(&self) -> bool {
        matches!(self, Self::Lookup { .. })
    }
}

pub(crate) fn ensure_same_len(left: usize, right: usize) -> Result<()> {
    if left != right {
        return Err(PipelineError::LengthMismatch { left, right });
    }
    Ok(())
}

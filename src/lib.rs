pub mod award_predictor;
pub mod clean;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod match_predictor;
pub mod matchup;
pub mod model;
pub mod pipeline;
pub mod player_features;
pub mod simulation;
pub mod table;
pub mod team_features;
pub mod telemetry;
pub mod train;

pub use error::{PipelineError, Result};

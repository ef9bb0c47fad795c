use std::io;

use anyhow::Context;
use tracing::warn;

use wc26_predictor::cli::{bootstrap, run_award_session, run_match_session};
use wc26_predictor::pipeline::{load_award_predictor, load_match_predictor};

fn main() -> anyhow::Result<()> {
    let cfg = bootstrap()?;

    let matches = load_match_predictor(&cfg).with_context(|| {
        format!(
            "failed to load match model from {} (run train_models first)",
            cfg.paths.models_dir.display()
        )
    })?;
    // Award models are optional: without player features only head-to-head works.
    let awards = match load_award_predictor(&cfg) {
        Ok(p) => Some(p),
        Err(err) => {
            warn!("award predictions unavailable: {err}");
            None
        }
    };

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();

    println!(
        "World Cup predictor ({} teams, profile `{}`)",
        matches.teams().len(),
        cfg.profile.name
    );
    run_match_session(&matches, &mut input, &mut out)?;
    if let Some(awards) = &awards {
        run_award_session(awards, &mut input, &mut out)?;
    }
    Ok(())
}

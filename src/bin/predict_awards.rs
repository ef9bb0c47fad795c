use std::io;

use anyhow::Context;

use wc26_predictor::cli::{bootstrap, run_award_session};
use wc26_predictor::pipeline::load_award_predictor;

fn main() -> anyhow::Result<()> {
    let cfg = bootstrap()?;
    let predictor = load_award_predictor(&cfg).context("failed to load award models")?;
    if predictor.available_metrics().is_empty() {
        anyhow::bail!(
            "no award models in {} (run train_models first)",
            cfg.paths.models_dir.display()
        );
    }

    let stdin = io::stdin();
    run_award_session(&predictor, &mut stdin.lock(), &mut io::stdout())?;
    Ok(())
}

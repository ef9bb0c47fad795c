use std::io;

use anyhow::Context;

use wc26_predictor::cli::{bootstrap, run_match_session};
use wc26_predictor::pipeline::load_match_predictor;

fn main() -> anyhow::Result<()> {
    let cfg = bootstrap()?;
    let predictor = load_match_predictor(&cfg).context("failed to load match model")?;

    let stdin = io::stdin();
    run_match_session(&predictor, &mut stdin.lock(), &mut io::stdout())?;
    Ok(())
}

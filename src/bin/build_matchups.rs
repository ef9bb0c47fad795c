use anyhow::Context;

use wc26_predictor::cli::bootstrap;
use wc26_predictor::pipeline::run_matchups;

fn main() -> anyhow::Result<()> {
    let cfg = bootstrap()?;
    let summary = run_matchups(&cfg).context("matchup build failed (did build_features run?)")?;

    println!("Matches used:    {}", summary.matches_used);
    println!("Matches skipped: {}", summary.matches_skipped);
    println!("Examples:        {}", summary.examples);
    Ok(())
}

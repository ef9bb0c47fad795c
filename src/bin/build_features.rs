use anyhow::Context;

use wc26_predictor::cli::bootstrap;
use wc26_predictor::pipeline::run_features;

fn main() -> anyhow::Result<()> {
    let cfg = bootstrap()?;
    let summary = run_features(&cfg).with_context(|| {
        format!(
            "feature build failed for profile `{}` (did clean_data run?)",
            cfg.profile.name
        )
    })?;

    println!("Matches: {}", summary.matches);
    println!("Teams:   {}", summary.teams);
    match summary.players {
        Some(n) => println!("Players: {n}"),
        None => println!("Players: skipped (no player stats file)"),
    }
    Ok(())
}

use anyhow::Context;

use wc26_predictor::cli::bootstrap;
use wc26_predictor::pipeline::load_match_predictor;
use wc26_predictor::simulation::{OutcomeModel, TournamentSetup, monte_carlo_tournament};

fn main() -> anyhow::Result<()> {
    let cfg = bootstrap()?;
    let groups_path = cfg.paths.groups();
    let setup = TournamentSetup::load(&groups_path)
        .with_context(|| format!("failed to load {}", groups_path.display()))?;

    let table;
    let predictor;
    let model: &dyn OutcomeModel = if setup.probabilities.is_empty() {
        predictor = load_match_predictor(&cfg).context("failed to load match model")?;
        for team in setup.teams() {
            predictor.team_row(team)?;
        }
        &predictor
    } else {
        table = setup.probability_table();
        &table
    };

    let shares = monte_carlo_tournament(&setup, model, setup.simulations)?;
    println!(
        "{} simulations, {} groups, top {} advance",
        setup.simulations,
        setup.groups.len(),
        setup.advance_per_group
    );
    for (team, share) in shares.iter().filter(|(_, s)| *s > 0.0) {
        println!("{team:<24} {:>6.2}%", share * 100.0);
    }
    Ok(())
}

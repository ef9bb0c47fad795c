use std::path::PathBuf;

use anyhow::Context;
use tracing::warn;

use wc26_predictor::cli::bootstrap;
use wc26_predictor::evaluation::{
    Outcome, Prob3, calibration_bins, evaluate_outcome_probs, evaluate_predictions, log_loss,
};
use wc26_predictor::matchup::read_matchups;
use wc26_predictor::pipeline::{load_match_predictor, load_match_records};

fn main() -> anyhow::Result<()> {
    let cfg = bootstrap()?;
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.paths.matchup_dataset());

    let predictor = load_match_predictor(&cfg).context("failed to load match model")?;
    let examples = read_matchups(&path).with_context(|| format!("reading {}", path.display()))?;

    // In-sample: the model was fit on these rows.
    let mut labels = Vec::with_capacity(examples.len());
    let mut symmetric = Vec::with_capacity(examples.len());
    let mut directional = Vec::with_capacity(examples.len());
    for ex in &examples {
        let (Ok(p), Ok(d)) = (
            predictor.predict(&ex.team_a, &ex.team_b),
            predictor.directional_probability(&ex.team_a, &ex.team_b),
        ) else {
            warn!("no features for {} v {}; skipping", ex.team_a, ex.team_b);
            continue;
        };
        labels.push(ex.label);
        symmetric.push(p.prob_a);
        directional.push(d);
    }

    println!("Rows: {}", labels.len());
    for (name, probs) in [("symmetrized", &symmetric), ("directional", &directional)] {
        let preds: Vec<u8> = probs.iter().map(|p| u8::from(*p >= 0.5)).collect();
        let m = evaluate_predictions(&labels, &preds, Some(probs.as_slice()), &1)?;
        println!(
            "{name:<12} accuracy {:.3}  brier {:.4}  rmse {:.4}  log-loss {:.4}",
            m.accuracy,
            m.brier.unwrap_or(f64::NAN),
            m.rmse.unwrap_or(f64::NAN),
            log_loss(&labels, probs)?
        );
    }

    println!("Calibration (symmetrized):");
    for bin in calibration_bins(&labels, &symmetric, 10)? {
        println!(
            "  {:.1}-{:.1}  n={:<5} predicted {:.3}  observed {:.3}",
            bin.bucket_start, bin.bucket_end, bin.count, bin.avg_pred, bin.actual_rate
        );
    }

    // Three-way view over the source matches.
    let matches = load_match_records(&cfg)?;
    let mut probs: Vec<Prob3> = Vec::new();
    let mut outcomes: Vec<Outcome> = Vec::new();
    for m in &matches {
        if let Ok(p) = predictor.outcome_probabilities(&m.home_team, &m.away_team) {
            probs.push(p);
            outcomes.push(m.outcome());
        }
    }
    if !probs.is_empty() {
        let m = evaluate_outcome_probs(&probs, &outcomes)?;
        println!(
            "Home/draw/away over {} matches: accuracy {:.3}  brier {:.4}  log-loss {:.4}",
            m.samples, m.accuracy, m.brier, m.log_loss
        );
    }
    Ok(())
}

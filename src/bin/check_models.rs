use std::path::PathBuf;

use wc26_predictor::cli::bootstrap;
use wc26_predictor::model::{AwardMetric, TrainedModel};

fn main() -> anyhow::Result<()> {
    let cfg = bootstrap()?;

    let mut paths: Vec<PathBuf> = vec![cfg.paths.match_model()];
    paths.extend(AwardMetric::ALL.into_iter().map(|m| cfg.paths.award_model(m)));

    let mut found = 0usize;
    for path in paths {
        if !path.exists() {
            println!("{}: missing", path.display());
            continue;
        }
        match TrainedModel::load(&path) {
            Ok(model) => {
                found += 1;
                println!(
                    "{}: {} for `{}` ({} features), probability output: {}",
                    path.display(),
                    model.kind_label(),
                    model.target(),
                    model.feature_names().len(),
                    if model.supports_probability() { "yes" } else { "no" }
                );
            }
            Err(err) => println!("{}: unreadable ({err})", path.display()),
        }
    }
    println!("{found} model(s) loaded");
    Ok(())
}

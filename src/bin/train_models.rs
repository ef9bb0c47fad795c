use anyhow::Context;

use wc26_predictor::cli::bootstrap;
use wc26_predictor::pipeline::run_train;

fn main() -> anyhow::Result<()> {
    let cfg = bootstrap()?;
    let report = run_train(&cfg).context("training failed (did build_matchups run?)")?;

    match (&report.match_model, &report.match_skipped) {
        (Some(m), _) => println!(
            "match model: {} examples, CV accuracy {:.3} ± {:.3}",
            m.train_samples, m.cv_accuracy_mean, m.cv_accuracy_std
        ),
        (None, Some(err)) => println!("match model: skipped ({err})"),
        (None, None) => println!("match model: skipped"),
    }
    for m in &report.awards.models {
        println!(
            "{:<8} {:<20} train={} test={} rmse={}",
            m.metric.as_str(),
            m.target,
            m.train_samples,
            m.test_samples,
            m.test_rmse
                .map(|v| format!("{v:.4}"))
                .unwrap_or_else(|| "-".to_string())
        );
    }
    for (metric, err) in &report.awards.skipped {
        println!("{:<8} skipped: {err}", metric.as_str());
    }
    Ok(())
}

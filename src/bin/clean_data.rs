use wc26_predictor::cli::bootstrap;
use wc26_predictor::pipeline::run_clean;

fn main() -> anyhow::Result<()> {
    let cfg = bootstrap()?;
    let done = run_clean(&cfg)?;

    for (path, s) in &done {
        println!(
            "{}: {} rows in, {} duplicates, {} missing key fields, {} rows out",
            path.display(),
            s.rows_in,
            s.duplicates_dropped,
            s.missing_key_dropped,
            s.rows_out
        );
    }
    println!("cleaned {} file(s) in {}", done.len(), cfg.paths.data_dir.display());
    Ok(())
}

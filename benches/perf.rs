use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use wc26_predictor::config::TrainingConfig;
use wc26_predictor::dataset::MatchRecord;
use wc26_predictor::match_predictor::MatchPredictor;
use wc26_predictor::matchup::build_matchups;
use wc26_predictor::team_features::compute_team_features;
use wc26_predictor::train::train_match_model;

const TEAMS: usize = 32;

fn synthetic_matches(n: usize) -> Vec<MatchRecord> {
    let mut rng = StdRng::seed_from_u64(11);
    let start = NaiveDate::from_ymd_opt(2022, 11, 20)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n)
        .map(|i| {
            let home = rng.gen_range(0..TEAMS);
            let away = (home + rng.gen_range(1..TEAMS)) % TEAMS;
            MatchRecord {
                home_team: format!("Team {home:02}"),
                away_team: format!("Team {away:02}"),
                home_goals: rng.gen_range(0..5),
                away_goals: rng.gen_range(0..4),
                kickoff: start + chrono::Duration::hours(i as i64 * 3),
            }
        })
        .collect()
}

fn bench_team_features(c: &mut Criterion) {
    let matches = synthetic_matches(2_000);
    c.bench_function("team_features_2k_matches", |b| {
        b.iter(|| {
            let rows = compute_team_features(black_box(&matches));
            black_box(rows.len());
        })
    });
}

fn bench_matchups(c: &mut Criterion) {
    let matches = synthetic_matches(2_000);
    let teams = compute_team_features(&matches);
    c.bench_function("matchups_2k_matches", |b| {
        b.iter(|| {
            let (examples, _) = build_matchups(black_box(&matches), black_box(&teams));
            black_box(examples.len());
        })
    });
}

fn bench_predict(c: &mut Criterion) {
    let matches = synthetic_matches(500);
    let teams = compute_team_features(&matches);
    let (examples, _) = build_matchups(&matches, &teams);
    let model = train_match_model(&examples, &TrainingConfig::default()).unwrap();
    let predictor = MatchPredictor::new(model, teams);

    c.bench_function("predict_symmetrized", |b| {
        b.iter(|| {
            let p = predictor
                .predict(black_box("Team 03"), black_box("team 17"))
                .unwrap();
            black_box(p.prob_a);
        })
    });
}

criterion_group!(benches, bench_team_features, bench_matchups, bench_predict);
criterion_main!(benches);

use std::fs;
use std::path::{Path, PathBuf};

use wc26_predictor::PipelineError;
use wc26_predictor::config::{ENV_DATA_DIR, ENV_MODELS_DIR, ENV_PROFILE, PipelineConfig};
use wc26_predictor::match_predictor::MatchPredictor;
use wc26_predictor::matchup::read_matchups;
use wc26_predictor::model::{AwardMetric, TrainedModel};
use wc26_predictor::pipeline::{
    load_award_predictor, load_match_predictor, run_clean, run_features, run_matchups, run_train,
};
use wc26_predictor::player_features::PlayerFeatureTable;
use wc26_predictor::simulation::{TournamentSetup, monte_carlo_tournament};
use wc26_predictor::team_features::read_team_features;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

/// Fresh scratch directory with the named fixtures copied into `data/`.
fn workspace(name: &str, fixtures: &[&str]) -> PathBuf {
    let root = std::env::temp_dir().join(format!("wc26_{name}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&root);
    let data = root.join("data");
    fs::create_dir_all(&data).expect("scratch dir should be creatable");
    for f in fixtures {
        fs::copy(fixture_path(f), data.join(f)).expect("fixture should copy");
    }
    root
}

fn config(root: &Path, profile: &str) -> PipelineConfig {
    let data = root.join("data").display().to_string();
    let models = root.join("models").display().to_string();
    PipelineConfig::from_sources(None, |key| match key {
        ENV_PROFILE => Some(profile.to_string()),
        ENV_DATA_DIR => Some(data.clone()),
        ENV_MODELS_DIR => Some(models.clone()),
        _ => None,
    })
    .expect("test config should be valid")
}

fn trained(name: &str) -> PipelineConfig {
    let root = workspace(
        name,
        &["WorldCupMatches.csv", "player_stats.csv", "groups.toml"],
    );
    let cfg = config(&root, "per90");
    run_clean(&cfg).unwrap();
    run_features(&cfg).unwrap();
    run_matchups(&cfg).unwrap();
    run_train(&cfg).unwrap();
    cfg
}

#[test]
fn stages_report_what_they_did() {
    let root = workspace("stages", &["WorldCupMatches.csv", "player_stats.csv"]);
    let cfg = config(&root, "per90");

    let cleaned = run_clean(&cfg).unwrap();
    let (_, matches) = cleaned
        .iter()
        .find(|(p, _)| p.ends_with("WorldCupMatches_cleaned.csv"))
        .expect("matches file cleaned");
    assert_eq!(matches.rows_in, 14);
    assert_eq!(matches.duplicates_dropped, 1);
    assert_eq!(matches.missing_key_dropped, 1);
    assert_eq!(matches.rows_out, 12);

    let features = run_features(&cfg).unwrap();
    assert_eq!(features.matches, 12);
    assert_eq!(features.teams, 8);
    assert_eq!(features.players, Some(14));

    let summary = run_matchups(&cfg).unwrap();
    assert_eq!(summary.matches_used, 12);
    assert_eq!(summary.matches_skipped, 0);
    assert_eq!(summary.examples, 24);

    let report = run_train(&cfg).unwrap();
    assert!(report.match_model.is_some());
    assert_eq!(report.awards.models.len(), 3);
    assert!(report.awards.model(AwardMetric::Saves).is_none());
    let (metric, err) = &report.awards.skipped[0];
    assert_eq!(*metric, AwardMetric::Saves);
    assert!(matches!(err, PipelineError::InsufficientData { samples: 3, required: 5, .. }));

    assert!(cfg.paths.match_model().exists());
    assert!(cfg.paths.award_model(AwardMetric::Goals).exists());
    assert!(!cfg.paths.award_model(AwardMetric::Saves).exists());
}

#[test]
fn matchup_pairs_mirror_each_other() {
    let cfg = trained("mirror");
    let examples = read_matchups(&cfg.paths.matchup_dataset()).unwrap();
    assert_eq!(examples.len() % 2, 0);
    for pair in examples.chunks(2) {
        let (fwd, rev) = (&pair[0], &pair[1]);
        assert_eq!(fwd.team_a, rev.team_b);
        assert_eq!(fwd.team_b, rev.team_a);
        for (a, b) in fwd.diff.iter().zip(&rev.diff) {
            assert_eq!(*a, -*b);
        }
        assert!(fwd.label + rev.label <= 1);
    }
}

#[test]
fn recent_form_covers_the_three_group_games() {
    let cfg = trained("form");
    let teams = read_team_features(&cfg.paths.team_features()).unwrap();
    let get = |name: &str| teams.iter().find(|t| t.team == name).unwrap();

    let england = get("England");
    assert_eq!(england.matches_played, 3);
    assert!((england.recent_form - 3.0).abs() < 1e-12);
    assert!((get("Netherlands").recent_form - 5.0 / 3.0).abs() < 1e-12);
    assert!((get("Qatar").loss_rate - 1.0).abs() < 1e-12);
    // Sorted by team name.
    assert_eq!(teams[0].team, "Ecuador");
}

#[test]
fn match_predictions_are_symmetric() {
    let cfg = trained("symmetric");
    let predictor = load_match_predictor(&cfg).unwrap();

    let ab = predictor.predict("England", "Qatar").unwrap();
    let ba = predictor.predict("Qatar", "England").unwrap();
    assert!((ab.prob_a + ab.prob_b - 1.0).abs() < 1e-9);
    assert!((ab.prob_a - ba.prob_b).abs() < 1e-2);

    let (pa, pb) = predictor.predict_pair("england", "QATAR").unwrap();
    assert_eq!((pa, pb), (ab.prob_a, ab.prob_b));

    let err = predictor.predict("England", "Narnia").unwrap_err();
    assert!(err.is_lookup());
    assert!(err.to_string().contains("Narnia"));
}

#[test]
fn regressor_artifact_cannot_drive_match_predictions() {
    let cfg = trained("capability");
    let model = TrainedModel::load(&cfg.paths.award_model(AwardMetric::Goals)).unwrap();
    assert!(!model.supports_probability());
    let teams = read_team_features(&cfg.paths.team_features()).unwrap();
    let err = MatchPredictor::from_model(model, teams).unwrap_err();
    assert!(matches!(err, PipelineError::Capability { .. }));

    let clf = TrainedModel::load(&cfg.paths.match_model()).unwrap();
    assert!(clf.supports_probability());
}

#[test]
fn award_rankings_follow_metric_direction() {
    let cfg = trained("awards");
    let predictor = load_award_predictor(&cfg).unwrap();

    let cards = predictor.get_top_players(AwardMetric::Cards, 5).unwrap();
    assert_eq!(cards.len(), 5);
    assert!(cards.windows(2).all(|w| w[0].value <= w[1].value));

    let goals = predictor.get_top_players(AwardMetric::Goals, 5).unwrap();
    assert!(goals.windows(2).all(|w| w[0].value >= w[1].value));

    assert!(matches!(
        predictor.get_top_players(AwardMetric::Saves, 5),
        Err(PipelineError::MissingModel { .. })
    ));

    let kane = predictor.predict_all_awards("harry kane").unwrap();
    assert_eq!(kane.player, "Harry Kane");
    assert_eq!(kane.team, "England");
    assert!(kane.goals.is_some());
    assert_eq!(kane.save_percentage, None);

    assert!(predictor.predict_all_awards("Nobody").unwrap_err().is_lookup());
}

#[test]
fn simulated_title_shares_sum_to_one() {
    let cfg = trained("simulate");
    let predictor = load_match_predictor(&cfg).unwrap();
    let setup = TournamentSetup::load(&cfg.paths.groups()).unwrap();

    let shares = monte_carlo_tournament(&setup, &predictor, setup.simulations).unwrap();
    assert_eq!(shares.len(), 8);
    let total: f64 = shares.iter().map(|(_, s)| s).sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!(shares.windows(2).all(|w| w[0].1 >= w[1].1));

    let again = monte_carlo_tournament(&setup, &predictor, setup.simulations).unwrap();
    assert_eq!(shares, again);
}

#[test]
fn minutes_profile_derives_rates() {
    let root = workspace("minutes", &["WorldCupMatches.csv", "WorldCupPlayers.csv"]);
    let cfg = config(&root, "minutes");
    run_clean(&cfg).unwrap();
    let summary = run_features(&cfg).unwrap();
    assert_eq!(summary.players, Some(7));

    let table = PlayerFeatureTable::read_csv(&cfg.paths.player_features()).unwrap();
    let saka = table.find_player("Bukayo Saka").unwrap();
    assert!((table.value(saka, "goals_per_90").unwrap() - 2.0).abs() < 1e-9);
    assert!((table.value(saka, "assists_per_90").unwrap() - 1.0).abs() < 1e-9);
    assert_eq!(table.value(saka, "save_percentage"), None);

    // The zero-minute appearance contributes nothing.
    let gakpo = table.find_player("Cody Gakpo").unwrap();
    assert!((table.value(gakpo, "goals_per_90").unwrap() - 1.0).abs() < 1e-9);

    let pickford = table.find_player("Jordan Pickford").unwrap();
    assert!((table.value(pickford, "save_percentage").unwrap() - 0.875).abs() < 1e-9);
}

#[test]
fn retrain_on_too_few_matches_drops_old_artifacts() {
    let cfg = trained("retrain");
    assert!(cfg.paths.match_model().exists());
    assert!(cfg.paths.player_features().exists());
    assert!(cfg.paths.award_model(AwardMetric::Goals).exists());

    let data = &cfg.paths.data_dir;
    for f in ["player_stats.csv", "player_stats_cleaned.csv"] {
        fs::remove_file(data.join(f)).unwrap();
    }
    fs::write(
        data.join("WorldCupMatches.csv"),
        "Year,Datetime,Stage,Home Team Name,Home Team Goals,Away Team Goals,Away Team Name\n\
         2026,11 Jun 2026 - 19:00,Group A,Mexico,2,0,Canada\n",
    )
    .unwrap();

    run_clean(&cfg).unwrap();
    let features = run_features(&cfg).unwrap();
    assert_eq!(features.teams, 2);
    assert_eq!(features.players, None);
    assert!(!cfg.paths.player_features().exists());

    assert_eq!(run_matchups(&cfg).unwrap().examples, 2);
    let report = run_train(&cfg).unwrap();
    assert!(report.match_model.is_none());
    assert!(matches!(
        report.match_skipped,
        Some(PipelineError::InsufficientData { samples: 2, .. })
    ));
    assert!(!cfg.paths.match_model().exists());
    for metric in AwardMetric::ALL {
        assert!(!cfg.paths.award_model(metric).exists());
    }
    assert!(load_match_predictor(&cfg).is_err());
}

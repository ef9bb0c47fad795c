// Monte Carlo tournament: round-robin groups feeding a single-elimination
// bracket, repeated `n` times from a seeded RNG.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::error::{PipelineError, Result};
use crate::evaluation::{Outcome, Prob3};
use crate::match_predictor::MatchPredictor;

/// Anything that can price a fixture as home / draw / away.
pub trait OutcomeModel {
    fn outcome_probs(&self, home: &str, away: &str) -> Result<Prob3>;
}

impl OutcomeModel for MatchPredictor {
    fn outcome_probs(&self, home: &str, away: &str) -> Result<Prob3> {
        self.outcome_probabilities(home, away)
    }
}

/// Fixed per-fixture probabilities. A missing pair falls back to the
/// reversed pair seen from the other side, then to uniform.
#[derive(Debug, Clone, Default)]
pub struct ProbabilityTable {
    probs: HashMap<(String, String), Prob3>,
}

impl ProbabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, home: &str, away: &str, prob: Prob3) {
        self.probs
            .insert((home.to_string(), away.to_string()), prob.normalized());
    }

    pub fn len(&self) -> usize {
        self.probs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }

    pub fn get(&self, home: &str, away: &str) -> Prob3 {
        if let Some(p) = self.probs.get(&(home.to_string(), away.to_string())) {
            return *p;
        }
        if let Some(p) = self.probs.get(&(away.to_string(), home.to_string())) {
            return p.swapped();
        }
        Prob3::uniform()
    }
}

impl OutcomeModel for ProbabilityTable {
    fn outcome_probs(&self, home: &str, away: &str) -> Result<Prob3> {
        Ok(self.get(home, away))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixedOdds {
    pub home: String,
    pub away: String,
    pub home_win: f64,
    pub draw: f64,
    pub away_win: f64,
}

fn default_advance() -> usize {
    2
}

fn default_simulations() -> usize {
    1000
}

fn default_seed() -> u64 {
    42
}

/// Contents of `groups.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct TournamentSetup {
    #[serde(default = "default_advance")]
    pub advance_per_group: usize,
    #[serde(default = "default_simulations")]
    pub simulations: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    pub groups: BTreeMap<String, Vec<String>>,
    /// When present, these replace the trained match model.
    #[serde(default)]
    pub probabilities: Vec<FixedOdds>,
}

impl TournamentSetup {
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let setup: TournamentSetup = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        setup.validate()?;
        Ok(setup)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, message: &str| ConfigError::Validation {
            field: field.to_string(),
            message: message.to_string(),
        };
        if self.groups.is_empty() {
            return Err(invalid("groups", "at least one group is required"));
        }
        if let Some((name, _)) = self.groups.iter().find(|(_, teams)| teams.is_empty()) {
            return Err(invalid(&format!("groups.{name}"), "group has no teams"));
        }
        if self.advance_per_group == 0 {
            return Err(invalid("advance_per_group", "must be at least 1"));
        }
        Ok(())
    }

    pub fn teams(&self) -> impl Iterator<Item = &String> {
        self.groups.values().flatten()
    }

    pub fn probability_table(&self) -> ProbabilityTable {
        let mut table = ProbabilityTable::new();
        for odds in &self.probabilities {
            table.insert(
                &odds.home,
                &odds.away,
                Prob3 {
                    home: odds.home_win,
                    draw: odds.draw,
                    away: odds.away_win,
                },
            );
        }
        table
    }
}

pub fn simulate_match<R: Rng>(prob: Prob3, rng: &mut R) -> Outcome {
    let p = prob.normalized();
    let r: f64 = rng.gen_range(0.0..1.0);
    if r < p.home {
        Outcome::Home
    } else if r < p.home + p.draw {
        Outcome::Draw
    } else {
        Outcome::Away
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub team: String,
    pub points: u32,
}

/// Round robin with 3/1/0 points; equal points are ordered at random.
pub fn simulate_group<M, R>(teams: &[String], model: &M, rng: &mut R) -> Result<Vec<Standing>>
where
    M: OutcomeModel + ?Sized,
    R: Rng,
{
    let mut points = vec![0u32; teams.len()];
    for i in 0..teams.len() {
        for j in (i + 1)..teams.len() {
            let prob = model.outcome_probs(&teams[i], &teams[j])?;
            match simulate_match(prob, rng) {
                Outcome::Home => points[i] += 3,
                Outcome::Away => points[j] += 3,
                Outcome::Draw => {
                    points[i] += 1;
                    points[j] += 1;
                }
            }
        }
    }

    let mut keyed: Vec<(u32, f64, &String)> = teams
        .iter()
        .zip(points)
        .map(|(team, pts)| (pts, rng.gen_range(0.0..1.0), team))
        .collect();
    keyed.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.total_cmp(&b.1)));

    Ok(keyed
        .into_iter()
        .map(|(points, _, team)| Standing {
            team: team.clone(),
            points,
        })
        .collect())
}

/// Qualifiers ordered by finishing place, then group name: all group
/// winners first, then all runners-up, and so on.
pub fn simulate_group_stage<M, R>(
    groups: &BTreeMap<String, Vec<String>>,
    advance_per_group: usize,
    model: &M,
    rng: &mut R,
) -> Result<Vec<String>>
where
    M: OutcomeModel + ?Sized,
    R: Rng,
{
    let mut tables = Vec::with_capacity(groups.len());
    for (name, teams) in groups {
        let table = simulate_group(teams, model, rng)?;
        debug!(
            "group {name}: {}",
            table
                .iter()
                .map(|s| format!("{} {}", s.team, s.points))
                .collect::<Vec<_>>()
                .join(", ")
        );
        tables.push(table);
    }

    let mut qualified = Vec::new();
    for place in 0..advance_per_group {
        for table in &tables {
            if let Some(s) = table.get(place) {
                qualified.push(s.team.clone());
            }
        }
    }
    Ok(qualified)
}

fn knockout_match<M, R>(home: &str, away: &str, model: &M, rng: &mut R) -> Result<bool>
where
    M: OutcomeModel + ?Sized,
    R: Rng,
{
    let prob = model.outcome_probs(home, away)?.normalized();
    Ok(match simulate_match(prob, rng) {
        Outcome::Home => true,
        Outcome::Away => false,
        Outcome::Draw => {
            let decisive = prob.home + prob.away;
            let p_home = if decisive > 0.0 { prob.home / decisive } else { 0.5 };
            rng.gen_bool(p_home.clamp(0.0, 1.0))
        }
    })
}

/// Single elimination, first against last each round. An odd field gives the
/// middle seed a bye into the next round.
pub fn simulate_knockout<M, R>(teams: &[String], model: &M, rng: &mut R) -> Result<String>
where
    M: OutcomeModel + ?Sized,
    R: Rng,
{
    if teams.is_empty() {
        return Err(PipelineError::EmptyInput {
            context: "knockout bracket",
        });
    }
    let mut round: Vec<String> = teams.to_vec();
    while round.len() > 1 {
        let n = round.len();
        let mut next = Vec::with_capacity(n.div_ceil(2));
        for i in 0..n / 2 {
            let (home, away) = (&round[i], &round[n - 1 - i]);
            let winner = if knockout_match(home, away, model, rng)? {
                home
            } else {
                away
            };
            next.push(winner.clone());
        }
        if n % 2 == 1 {
            next.push(round[n / 2].clone());
        }
        round = next;
    }
    Ok(round.swap_remove(0))
}

/// Share of `n` simulated tournaments won by each team, best first. Every
/// team in the draw is listed; the shares sum to one.
pub fn monte_carlo_tournament<M>(
    setup: &TournamentSetup,
    model: &M,
    n: usize,
) -> Result<Vec<(String, f64)>>
where
    M: OutcomeModel + ?Sized,
{
    if n == 0 {
        return Err(PipelineError::EmptyInput {
            context: "tournament simulations",
        });
    }
    let mut rng = StdRng::seed_from_u64(setup.seed);
    let mut titles: HashMap<String, usize> = setup.teams().map(|t| (t.clone(), 0)).collect();

    for _ in 0..n {
        let qualified =
            simulate_group_stage(&setup.groups, setup.advance_per_group, model, &mut rng)?;
        let champion = simulate_knockout(&qualified, model, &mut rng)?;
        *titles.entry(champion).or_default() += 1;
    }

    let mut shares: Vec<(String, f64)> = titles
        .into_iter()
        .map(|(team, wins)| (team, wins as f64 / n as f64))
        .collect();
    shares.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    info!(
        "simulated {n} tournaments; favourite {} ({:.1}%)",
        shares[0].0,
        shares[0].1 * 100.0
    );
    Ok(shares)
}

// Shared plumbing for the binaries: startup and the prompt loops.

use std::io::{self, BufRead, Write};

use anyhow::Context;

use crate::award_predictor::{AwardPrediction, AwardPredictor, RankedPlayer};
use crate::config::{PipelineConfig, load_config};
use crate::match_predictor::{MatchPredictor, WinProbability};
use crate::model::AwardMetric;
use crate::telemetry;

pub const DEFAULT_TOP_N: usize = 5;

/// `.env.local` / `.env`, then logging, then configuration.
pub fn bootstrap() -> anyhow::Result<PipelineConfig> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    telemetry::init();
    load_config().context("failed to load configuration")
}

/// Trimmed line, or `None` at end of input.
pub fn prompt<R: BufRead, W: Write>(input: &mut R, out: &mut W, label: &str) -> io::Result<Option<String>> {
    write!(out, "{label}: ")?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn non_empty(answer: Option<String>) -> Option<String> {
    answer.filter(|s| !s.is_empty())
}

fn fmt_value(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.3}")).unwrap_or_else(|| "-".to_string())
}

pub fn format_win(p: &WinProbability) -> String {
    format!(
        "{}: {:.1}%  |  {}: {:.1}%",
        p.team_a,
        p.prob_a * 100.0,
        p.team_b,
        p.prob_b * 100.0
    )
}

pub fn format_awards(p: &AwardPrediction) -> String {
    let mut out = format!(
        "{} ({}{})\n",
        p.player,
        p.team,
        p.position
            .as_deref()
            .map(|pos| format!(", {pos}"))
            .unwrap_or_default()
    );
    out.push_str(&format!("  goals:           {}\n", fmt_value(p.goals)));
    out.push_str(&format!("  assists:         {}\n", fmt_value(p.assists)));
    out.push_str(&format!("  cards:           {}\n", fmt_value(p.cards)));
    out.push_str(&format!("  save percentage: {}", fmt_value(p.save_percentage)));
    out
}

pub fn format_ranking(metric: AwardMetric, ranked: &[RankedPlayer]) -> String {
    let mut out = format!("Top {} by {metric}:", ranked.len());
    for (i, r) in ranked.iter().enumerate() {
        out.push_str(&format!("\n{:>3}. {:<28} {:<20} {:.3}", i + 1, r.player, r.team, r.value));
    }
    out
}

/// Prompts for pairs of teams until a blank team A or end of input. Lookup
/// failures are printed and the session carries on.
pub fn run_match_session<R: BufRead, W: Write>(
    predictor: &MatchPredictor,
    input: &mut R,
    out: &mut W,
) -> io::Result<()> {
    loop {
        let Some(team_a) = non_empty(prompt(input, out, "Team A (blank to finish)")?) else {
            return Ok(());
        };
        let Some(team_b) = non_empty(prompt(input, out, "Team B")?) else {
            return Ok(());
        };
        match predictor.predict(&team_a, &team_b) {
            Ok(p) => writeln!(out, "{}", format_win(&p))?,
            Err(err) => writeln!(out, "error: {err}")?,
        }
    }
}

/// Player lookups until a blank name, then metric rankings until a blank
/// metric.
pub fn run_award_session<R: BufRead, W: Write>(
    predictor: &AwardPredictor,
    input: &mut R,
    out: &mut W,
) -> io::Result<()> {
    while let Some(player) = non_empty(prompt(input, out, "Player (blank to skip)")?) {
        match predictor.predict_all_awards(&player) {
            Ok(p) => writeln!(out, "{}", format_awards(&p))?,
            Err(err) => writeln!(out, "error: {err}")?,
        }
    }

    loop {
        let Some(raw) = non_empty(prompt(input, out, "Rank by goals|assists|cards|saves (blank to finish)")?)
        else {
            return Ok(());
        };
        let metric = match raw.parse::<AwardMetric>() {
            Ok(m) => m,
            Err(err) => {
                writeln!(out, "error: {err}")?;
                continue;
            }
        };
        let n = non_empty(prompt(input, out, &format!("How many [{DEFAULT_TOP_N}]"))?)
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_TOP_N);
        match predictor.get_top_players(metric, n) {
            Ok(ranked) => writeln!(out, "{}", format_ranking(metric, &ranked))?,
            Err(err) => writeln!(out, "error: {err}")?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn prompt_returns_none_at_eof() {
        let mut input = Cursor::new("  Brazil \n");
        let mut out = Vec::new();
        assert_eq!(
            prompt(&mut input, &mut out, "Team").unwrap().as_deref(),
            Some("Brazil")
        );
        assert_eq!(prompt(&mut input, &mut out, "Team").unwrap(), None);
        assert_eq!(String::from_utf8(out).unwrap(), "Team: Team: ");
    }

    #[test]
    fn ranking_lists_in_order() {
        let ranked = vec![
            RankedPlayer {
                player: "Mbappe".into(),
                team: "France".into(),
                position: None,
                value: 0.91,
            },
            RankedPlayer {
                player: "Messi".into(),
                team: "Argentina".into(),
                position: None,
                value: 0.88,
            },
        ];
        let text = format_ranking(AwardMetric::Goals, &ranked);
        assert!(text.starts_with("Top 2 by goals:"));
        assert!(text.find("Mbappe").unwrap() < text.find("Messi").unwrap());
    }
}

//! Aggregates over finished games.
use serde::Serialize;

use crate::controller::{GameRecord, Outcome};

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ModeSummary {
    pub games: usize,
    pub average_score: f64,
    pub best_score: u64,
}

/// Totals, averages and bests over a set of game records, split by who played.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GameSummary {
    pub total_games: usize,
    pub total_score: u64,
    pub average_score: f64,
    pub best_score: u64,
    pub total_time_secs: f64,
    pub average_time_secs: f64,
    pub total_moves: u64,
    pub average_moves: f64,
    pub best_tile: u32,
    pub wins: usize,
    /// Percentage of games won.
    pub win_rate: f64,
    pub human: ModeSummary,
    pub ai: ModeSummary,
}

impl GameSummary {
    pub fn from_records(records: &[GameRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }
        let games = records.len();
        let total_score: u64 = records.iter().map(|r| r.score).sum();
        let total_time_secs = records.iter().map(|r| r.duration_ms).sum::<u64>() as f64 / 1000.0;
        let total_moves: u64 = records.iter().map(|r| u64::from(r.moves)).sum();
        let wins = records
            .iter()
            .filter(|r| r.outcome == Outcome::Won)
            .count();
        Self {
            total_games: games,
            total_score,
            average_score: total_score as f64 / games as f64,
            best_score: records.iter().map(|r| r.score).max().unwrap_or(0),
            total_time_secs,
            average_time_secs: total_time_secs / games as f64,
            total_moves,
            average_moves: total_moves as f64 / games as f64,
            best_tile: records.iter().map(|r| r.max_tile).max().unwrap_or(0),
            wins,
            win_rate: wins as f64 * 100.0 / games as f64,
            human: mode_summary(records.iter().filter(|r| r.mode == "Human")),
            ai: mode_summary(records.iter().filter(|r| r.mode.starts_with("AI"))),
        }
    }
}

fn mode_summary<'a>(records: impl Iterator<Item = &'a GameRecord>) -> ModeSummary {
    let scores: Vec<u64> = records.map(|r| r.score).collect();
    if scores.is_empty() {
        return ModeSummary::default();
    }
    ModeSummary {
        games: scores.len(),
        average_score: scores.iter().sum::<u64>() as f64 / scores.len() as f64,
        best_score: scores.iter().copied().max().unwrap_or(0),
    }
}

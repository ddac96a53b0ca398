use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::{GenerationOptions, PREFERRED_MODEL};
use crate::board::{DEFAULT_SIZE, DEFAULT_WIN_TARGET, MAX_SIZE, MIN_SIZE};
use crate::controller::Mode;
use crate::resolver::KeywordSet;
use crate::GameError;

pub const DELAY_RANGE: RangeInclusive<Duration> =
    Duration::from_millis(500)..=Duration::from_secs(10);
pub const TIMEOUT_RANGE: RangeInclusive<Duration> =
    Duration::from_millis(1)..=Duration::from_secs(600);
const WIN_TARGET_RANGE: RangeInclusive<u32> = 8..=(1 << 30);
const MAX_UNDO_DEPTH: usize = 1024;
const FAILURE_RANGE: RangeInclusive<u32> = 1..=100;

/// What the controller does once the model has failed too many turns in a row.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Drop the turn and ask the model again on the next cycle.
    SkipTurn,
    /// Play a uniformly random move that changes the board.
    RandomLegalMove,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub board_size: usize,
    pub win_target: u32,
    /// Undo snapshots kept; 0 disables undo.
    pub undo_depth: usize,
    /// Pause between AI moves so play stays watchable.
    pub move_delay: Duration,
    pub ai_timeout: Duration,
    pub max_consecutive_failures: u32,
    pub fallback: Fallback,
    pub initial_mode: Mode,
    pub model: String,
    pub keywords: KeywordSet,
    pub generation: GenerationOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            board_size: DEFAULT_SIZE,
            win_target: DEFAULT_WIN_TARGET,
            undo_depth: 1,
            move_delay: Duration::from_millis(2000),
            ai_timeout: Duration::from_secs(30),
            max_consecutive_failures: 3,
            fallback: Fallback::RandomLegalMove,
            initial_mode: Mode::Human,
            model: PREFERRED_MODEL.to_string(),
            keywords: KeywordSet::default(),
            generation: GenerationOptions::default(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), GameError> {
        if !(MIN_SIZE..=MAX_SIZE).contains(&self.board_size) {
            return Err(GameError::config(
                "board_size",
                format!("{} is outside {MIN_SIZE}-{MAX_SIZE}", self.board_size),
            ));
        }
        if !self.win_target.is_power_of_two() || !WIN_TARGET_RANGE.contains(&self.win_target) {
            return Err(GameError::config(
                "win_target",
                format!("{} must be a power of two from 8 to 2^30", self.win_target),
            ));
        }
        if self.undo_depth > MAX_UNDO_DEPTH {
            return Err(GameError::config(
                "undo_depth",
                format!("{} exceeds {MAX_UNDO_DEPTH}", self.undo_depth),
            ));
        }
        if !DELAY_RANGE.contains(&self.move_delay) {
            return Err(GameError::config(
                "move_delay",
                format!("{:?} is outside 500ms-10s", self.move_delay),
            ));
        }
        if !TIMEOUT_RANGE.contains(&self.ai_timeout) {
            return Err(GameError::config(
                "ai_timeout",
                format!("{:?} is outside 1ms-600s", self.ai_timeout),
            ));
        }
        if !FAILURE_RANGE.contains(&self.max_consecutive_failures) {
            return Err(GameError::config(
                "max_consecutive_failures",
                format!("{} is outside 1-100", self.max_consecutive_failures),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(GameError::config("model", "model id is empty"));
        }
        if let Some(temperature) = self.generation.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(GameError::config(
                    "temperature",
                    format!("{temperature} is outside 0-2"),
                ));
            }
        }
        self.keywords.validate()
    }
}

//! 2048 engine with an LLM-driven autoplay controller.
//! The board engine is pure: callers pass the random source in, so a seeded
//! RNG replays a game exactly. The controller owns every mutation and asks a
//! text-generation backend for moves when it is in AI mode.
use std::time::Duration;

use thiserror::Error;

pub mod backend;
pub mod board;
pub mod config;
pub mod controller;
pub mod history;
pub mod resolver;
pub mod stats;

pub use backend::{
    preferred_model, Backend, BackendError, Completion, CompletionRequest, GenerationOptions,
    ModelInfo, OllamaClient,
};
pub use board::{apply_move, new_game, Board, GameState, Move, MoveOutcome, Spawn, Status};
pub use config::{Fallback, SessionConfig};
pub use controller::{
    Command, Controller, DecisionView, GameRecord, GameView, Input, InputSender, Mode, Outcome,
    Phase, SessionChannels, TurnOutcome,
};
pub use history::History;
pub use resolver::{build_prompt, AiDecision, KeywordSet, Resolver};
pub use stats::{GameSummary, ModeSummary};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum GameError {
    #[error("move {0} does not change the board")]
    IllegalMoveNoop(Move),
    #[error("inference backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("inference backend timed out after {0:?}")]
    BackendTimeout(Duration),
    #[error("model response contains no recognised move")]
    UnparsableResponse,
    #[error("nothing to undo")]
    HistoryEmpty,
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfiguration { field: &'static str, reason: String },
    #[error("unknown move {0:?}")]
    UnknownMove(String),
    #[error("invalid board: {0}")]
    InvalidBoard(String),
    #[error("the game is over")]
    GameOver,
    #[error("input not accepted while {0:?}")]
    WrongPhase(Phase),
    #[error("the game session has ended")]
    SessionClosed,
}

impl GameError {
    /// Resolver-side failures that count towards the retry bound.
    pub fn is_resolver_failure(&self) -> bool {
        matches!(
            self,
            GameError::IllegalMoveNoop(_)
                | GameError::BackendUnavailable(_)
                | GameError::BackendTimeout(_)
                | GameError::UnparsableResponse
        )
    }

    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        GameError::InvalidConfiguration {
            field,
            reason: reason.into(),
        }
    }
}

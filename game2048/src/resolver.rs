//! Turns a game state into a prompt and a model reply back into a move.
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::backend::{Backend, BackendError, CompletionRequest, GenerationOptions};
use crate::{GameError, GameState, Move};

static DEFAULT_KEYWORDS: Lazy<KeywordSet> = Lazy::new(|| KeywordSet {
    up: words(&["up", "upward", "upwards", "north", "w"]),
    down: words(&["down", "downward", "downwards", "south", "s"]),
    left: words(&["left", "leftward", "west", "a"]),
    right: words(&["right", "rightward", "east", "d"]),
});

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

/// Words accepted as a direction in a model reply.
///
/// Keywords are single lower-case tokens. One-letter keywords (the WASD
/// keys) only count when the whole reply is that one token, so ordinary
/// words such as "a" inside a sentence are never read as moves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSet {
    #[serde(default)]
    pub up: Vec<String>,
    #[serde(default)]
    pub down: Vec<String>,
    #[serde(default)]
    pub left: Vec<String>,
    #[serde(default)]
    pub right: Vec<String>,
}

impl Default for KeywordSet {
    fn default() -> Self {
        DEFAULT_KEYWORDS.clone()
    }
}

impl KeywordSet {
    /// Only the four direction names.
    pub fn strict() -> Self {
        Self {
            up: words(&["up"]),
            down: words(&["down"]),
            left: words(&["left"]),
            right: words(&["right"]),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, GameError> {
        let set: KeywordSet = serde_json::from_str(text)
            .map_err(|err| GameError::config("keywords", err.to_string()))?;
        set.validate()?;
        Ok(set)
    }

    pub fn validate(&self) -> Result<(), GameError> {
        if self.entries().next().is_none() {
            return Err(GameError::config("keywords", "keyword set is empty"));
        }
        let mut seen: Vec<(&str, Move)> = Vec::new();
        for (word, mv) in self.entries() {
            let lower = word.to_lowercase();
            if lower != word || tokens(word) != [word] {
                return Err(GameError::config(
                    "keywords",
                    format!("{word:?} is not a single lower-case token"),
                ));
            }
            if let Some((_, other)) = seen.iter().find(|(w, m)| *w == word && *m != mv) {
                return Err(GameError::config(
                    "keywords",
                    format!("{word:?} maps to both {other} and {mv}"),
                ));
            }
            seen.push((word, mv));
        }
        Ok(())
    }

    fn entries(&self) -> impl Iterator<Item = (&str, Move)> {
        [
            (&self.up, Move::Up),
            (&self.down, Move::Down),
            (&self.left, Move::Left),
            (&self.right, Move::Right),
        ]
        .into_iter()
        .flat_map(|(list, mv)| list.iter().map(move |w| (w.as_str(), mv)))
    }

    fn lookup(&self, token: &str, allow_single_letter: bool) -> Option<Move> {
        self.entries()
            .filter(|(word, _)| allow_single_letter || word.chars().count() > 1)
            .find(|(word, _)| *word == token)
            .map(|(_, mv)| mv)
    }

    /// First recognised direction in `reply`, scanning left to right after
    /// dropping any `<think>` sections.
    pub fn find_move(&self, reply: &str) -> Option<Move> {
        let visible = strip_reasoning(reply).to_lowercase();
        let tokens = tokens(&visible);
        let lone = tokens.len() == 1;
        tokens.iter().find_map(|token| self.lookup(token, lone))
    }
}

fn tokens(text: &str) -> Vec<&str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Remove `<think>...</think>` blocks; an unclosed block hides the rest.
fn strip_reasoning(reply: &str) -> String {
    let mut out = String::with_capacity(reply.len());
    let mut rest = reply;
    while let Some(start) = rest.find("<think>") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</think>") {
            Some(end) => rest = &rest[start + end + "</think>".len()..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Describe the board, score and legal moves, and ask for one direction.
pub fn build_prompt(state: &GameState) -> String {
    let board = state.board();
    let legal: Vec<String> = state
        .legal_moves()
        .iter()
        .map(|mv| mv.as_str().to_uppercase())
        .collect();
    format!(
        "You are playing the 2048 game on a {size}x{size} board. Your goal is to reach the tile {target} by combining tiles.\n\
         \n\
         Current board state (0 means an empty cell):\n\
         {board}\n\
         \n\
         Current score: {score}\n\
         \n\
         Game rules:\n\
         - A move slides every tile as far as possible UP, DOWN, LEFT or RIGHT\n\
         - When two tiles with the same number touch, they merge into one\n\
         - Each move adds a new tile (usually 2) to the board\n\
         - The game ends when no more moves are possible\n\
         \n\
         Moves that change the board right now: {legal}\n\
         \n\
         Consider keeping the largest numbers in a corner, keeping open space and setting up future merges.\n\
         Respond with exactly one word: up, down, left, or right.",
        size = board.size(),
        target = state.win_target(),
        score = state.score(),
        legal = legal.join(", "),
    )
}

/// Outcome of one request to the model.
#[derive(Clone, Debug, PartialEq)]
pub struct AiDecision {
    /// Direction read from the reply, if any. Present but unsuccessful when
    /// the model picked a move that would not change the board.
    pub mv: Option<Move>,
    pub raw: String,
    pub latency: Duration,
    pub success: bool,
    pub error: Option<GameError>,
}

impl AiDecision {
    fn failed(mv: Option<Move>, raw: String, latency: Duration, error: GameError) -> Self {
        Self {
            mv,
            raw,
            latency,
            success: false,
            error: Some(error),
        }
    }

    /// The move to apply, only when the decision succeeded.
    pub fn chosen(&self) -> Option<Move> {
        self.mv.filter(|_| self.success)
    }
}

#[derive(Clone, Debug)]
pub struct Resolver {
    model: String,
    keywords: KeywordSet,
    timeout: Duration,
    options: GenerationOptions,
}

impl Resolver {
    pub fn new(
        model: impl Into<String>,
        keywords: KeywordSet,
        timeout: Duration,
        options: GenerationOptions,
    ) -> Self {
        Self {
            model: model.into(),
            keywords,
            timeout,
            options,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the backend for a move. Never guesses: a slow, unreachable or
    /// unparsable answer, or a move that would not change the board, comes
    /// back as an unsuccessful decision.
    #[instrument(skip_all, fields(model = %self.model))]
    pub async fn resolve<B: Backend>(&self, state: &GameState, backend: &B) -> AiDecision {
        let request = CompletionRequest {
            model: self.model.clone(),
            prompt: build_prompt(state),
            options: self.options.clone(),
        };
        debug!(moves = state.moves(), "requesting move");
        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, backend.complete(request)).await;
        let latency = started.elapsed();

        let completion = match result {
            Err(_) | Ok(Err(BackendError::Timeout)) => {
                warn!(?latency, "backend timed out");
                let err = GameError::BackendTimeout(self.timeout);
                return AiDecision::failed(None, String::new(), latency, err);
            }
            Ok(Err(err)) => {
                warn!(%err, "backend request failed");
                let err = GameError::BackendUnavailable(err.to_string());
                return AiDecision::failed(None, String::new(), latency, err);
            }
            Ok(Ok(completion)) => completion,
        };

        match self.keywords.find_move(&completion.text) {
            None => {
                warn!(reply = %completion.text, "no move in reply");
                AiDecision::failed(None, completion.text, latency, GameError::UnparsableResponse)
            }
            Some(mv) if !state.is_legal(mv) => {
                warn!(%mv, "model chose a move that changes nothing");
                AiDecision::failed(
                    Some(mv),
                    completion.text,
                    latency,
                    GameError::IllegalMoveNoop(mv),
                )
            }
            Some(mv) => {
                debug!(%mv, ?latency, "model chose move");
                AiDecision {
                    mv: Some(mv),
                    raw: completion.text,
                    latency,
                    success: true,
                    error: None,
                }
            }
        }
    }
}

//! The autoplay state machine. It owns the game state, applies moves from
//! a human or from the model, and publishes a read-only view after every
//! transition.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::board::{apply_move, new_game, GameState, Move, Status};
use crate::config::{Fallback, SessionConfig};
use crate::history::History;
use crate::resolver::{AiDecision, Resolver};
use crate::GameError;

const HELP: &str =
    "Moves: up, down, left, right | undo (human only) | restart | mode human|ai | quit";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    HumanTurn,
    AiWaiting,
    Applying,
    Terminal,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Human,
    Ai,
}

impl Mode {
    fn turn(self) -> Phase {
        match self {
            Mode::Human => Phase::HumanTurn,
            Mode::Ai => Phase::AiWaiting,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    Undo,
    Restart,
    Quit,
    /// Change mode. `model` and `delay` replace the configured model and
    /// the pause between AI moves from this switch on.
    SwitchMode {
        mode: Mode,
        model: Option<String>,
        delay: Option<Duration>,
    },
    Help,
}

impl Command {
    /// Mode switch that keeps the current model and pace.
    pub fn switch(mode: Mode) -> Self {
        Command::SwitchMode {
            mode,
            model: None,
            delay: None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Input {
    Move(Move),
    Command(Command),
}

#[derive(Debug)]
struct Queued {
    input: Input,
    epoch: u64,
}

/// Queue handle for the input layer. Every input is stamped with the mode
/// epoch current when it was queued; a mode-switch request opens a new epoch,
/// so moves queued before it are recognised as stale.
#[derive(Clone, Debug)]
pub struct InputSender {
    tx: mpsc::UnboundedSender<Queued>,
    epoch: Arc<AtomicU64>,
}

impl InputSender {
    pub fn submit(&self, input: Input) -> Result<(), GameError> {
        let epoch = match &input {
            Input::Command(Command::SwitchMode { .. }) => {
                self.epoch.fetch_add(1, Ordering::SeqCst) + 1
            }
            _ => self.epoch.load(Ordering::SeqCst),
        };
        self.tx
            .send(Queued { input, epoch })
            .map_err(|_| GameError::SessionClosed)
    }

    pub fn submit_move(&self, mv: Move) -> Result<(), GameError> {
        self.submit(Input::Move(mv))
    }

    pub fn submit_command(&self, command: Command) -> Result<(), GameError> {
        self.submit(Input::Command(command))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DecisionView {
    #[serde(rename = "move")]
    pub mv: Option<Move>,
    pub raw: String,
    pub latency_ms: u64,
    pub success: bool,
    pub error: Option<String>,
}

impl From<&AiDecision> for DecisionView {
    fn from(decision: &AiDecision) -> Self {
        Self {
            mv: decision.mv,
            raw: decision.raw.clone(),
            latency_ms: decision.latency.as_millis() as u64,
            success: decision.success,
            error: decision.error.as_ref().map(|e| e.to_string()),
        }
    }
}

/// Snapshot handed to renderers after each transition.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GameView {
    pub grid: Vec<Vec<u32>>,
    pub score: u64,
    pub moves: u32,
    pub max_tile: u32,
    pub win_target: u32,
    pub status: Status,
    pub phase: Phase,
    pub mode: Mode,
    pub model: Option<String>,
    pub elapsed_ms: u64,
    pub undo_available: bool,
    pub consecutive_failures: u32,
    pub last_decision: Option<DecisionView>,
    pub message: String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Won,
    Lost,
    /// Restarted or quit before reaching a terminal state.
    Abandoned,
}

/// Finished game, for whoever keeps statistics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub score: u64,
    pub max_tile: u32,
    pub moves: u32,
    pub duration_ms: u64,
    pub outcome: Outcome,
    pub mode: String,
    pub finished_at: u64,
}

pub struct SessionChannels {
    pub inputs: InputSender,
    pub views: watch::Receiver<GameView>,
    pub records: mpsc::UnboundedReceiver<GameRecord>,
}

/// Result of one AI cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Applied { mv: Move, by_fallback: bool },
    Retrying { failures: u32 },
    Skipped,
    NotAiTurn,
}

pub struct Controller<B, R> {
    config: SessionConfig,
    backend: B,
    rng: R,
    resolver: Resolver,
    state: GameState,
    history: History,
    phase: Phase,
    mode: Mode,
    ai_played: bool,
    failures: u32,
    fallbacks: u32,
    last_decision: Option<AiDecision>,
    message: String,
    started: Instant,
    quit: bool,
    epoch: Arc<AtomicU64>,
    /// Epoch of the most recent mode switch handled.
    applied_epoch: u64,
    inputs: mpsc::UnboundedReceiver<Queued>,
    views: watch::Sender<GameView>,
    records: mpsc::UnboundedSender<GameRecord>,
}

impl<B: Backend, R: Rng + Send> Controller<B, R> {
    /// Validate the configuration and start an idle session. This is the
    /// only place a configuration error surfaces.
    pub fn new(
        config: SessionConfig,
        backend: B,
        mut rng: R,
    ) -> Result<(Self, SessionChannels), GameError> {
        config.validate()?;
        let state = new_game(config.board_size, config.win_target, &mut rng)?;
        let resolver = Resolver::new(
            config.model.clone(),
            config.keywords.clone(),
            config.ai_timeout,
            config.generation.clone(),
        );
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (record_tx, record_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(placeholder_view());
        let epoch = Arc::new(AtomicU64::new(0));
        let mode = config.initial_mode;
        let history = History::new(config.undo_depth);

        let controller = Self {
            config,
            backend,
            rng,
            resolver,
            state,
            history,
            phase: Phase::Idle,
            mode,
            ai_played: false,
            failures: 0,
            fallbacks: 0,
            last_decision: None,
            message: "New game - choose a mode to start".to_string(),
            started: Instant::now(),
            quit: false,
            epoch: epoch.clone(),
            applied_epoch: 0,
            inputs: input_rx,
            views: view_tx,
            records: record_tx,
        };
        controller.publish();
        let channels = SessionChannels {
            inputs: InputSender { tx: input_tx, epoch },
            views: view_rx,
            records: record_rx,
        };
        Ok((controller, channels))
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn fallback_count(&self) -> u32 {
        self.fallbacks
    }

    pub fn last_decision(&self) -> Option<&AiDecision> {
        self.last_decision.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn view(&self) -> GameView {
        let board = self.state.board();
        GameView {
            grid: board.rows(),
            score: self.state.score(),
            moves: self.state.moves(),
            max_tile: board.max_tile(),
            win_target: self.state.win_target(),
            status: self.state.status(),
            phase: self.phase,
            mode: self.mode,
            model: (self.mode == Mode::Ai).then(|| self.resolver.model().to_string()),
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            undo_available: !self.history.is_empty(),
            consecutive_failures: self.failures,
            last_decision: self.last_decision.as_ref().map(DecisionView::from),
            message: self.message.clone(),
        }
    }

    /// Pick or change the mode. The board is kept, except that a finished
    /// game is replaced by a fresh one. Moves still queued from before the
    /// switch are dropped when they come up.
    pub fn select_mode(&mut self, mode: Mode) {
        let epoch = self.next_epoch();
        self.switch_mode(mode, epoch);
    }

    /// [`select_mode`](Self::select_mode) that can also pick another model
    /// or pace. Out-of-range values leave mode and settings untouched.
    pub fn select_mode_with(
        &mut self,
        mode: Mode,
        model: Option<String>,
        delay: Option<Duration>,
    ) -> Result<(), GameError> {
        let epoch = self.next_epoch();
        self.retune(model, delay)?;
        self.switch_mode(mode, epoch);
        Ok(())
    }

    fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn retune(&mut self, model: Option<String>, delay: Option<Duration>) -> Result<(), GameError> {
        if model.is_none() && delay.is_none() {
            return Ok(());
        }
        let mut next = self.config.clone();
        if let Some(model) = model {
            next.model = model;
        }
        if let Some(delay) = delay {
            next.move_delay = delay;
        }
        if let Err(err) = next.validate() {
            self.message = err.to_string();
            self.publish();
            return Err(err);
        }
        if next.model != self.config.model {
            info!(model = %next.model, "model changed");
            self.resolver = Resolver::new(
                next.model.clone(),
                next.keywords.clone(),
                next.ai_timeout,
                next.generation.clone(),
            );
        }
        self.config = next;
        Ok(())
    }

    fn switch_mode(&mut self, mode: Mode, epoch: u64) {
        self.applied_epoch = self.applied_epoch.max(epoch);
        if mode != self.mode {
            info!(?mode, "mode switched");
        }
        self.mode = mode;
        self.failures = 0;
        match self.phase {
            Phase::Terminal => self.start_new_game(),
            _ => {
                self.phase = mode.turn();
                self.message = match mode {
                    Mode::Human => "Human control".to_string(),
                    Mode::Ai => format!("AI ({}) is playing", self.resolver.model()),
                };
            }
        }
        self.publish();
    }

    /// Continue from a given position, e.g. a saved game. History is cleared.
    pub fn resume_from(&mut self, state: GameState) {
        self.state = state;
        self.history.clear();
        self.failures = 0;
        self.ai_played = false;
        self.started = Instant::now();
        if self.state.status().is_terminal() {
            self.phase = Phase::Terminal;
        } else if self.phase != Phase::Idle {
            self.phase = self.mode.turn();
        }
        self.publish();
    }

    pub fn submit_move(&mut self, mv: Move) -> Result<(), GameError> {
        let result = match self.phase {
            Phase::HumanTurn => self.apply(mv, false),
            Phase::Terminal => Err(GameError::GameOver),
            phase => Err(GameError::WrongPhase(phase)),
        };
        if let Err(err) = &result {
            self.message = match err {
                GameError::GameOver => "Game over - start a new game".to_string(),
                other => other.to_string(),
            };
            self.publish();
        }
        result
    }

    pub fn undo(&mut self) -> Result<(), GameError> {
        if self.phase != Phase::HumanTurn {
            return Err(GameError::WrongPhase(self.phase));
        }
        let result = self.history.undo().map(|previous| {
            self.state = previous;
        });
        self.message = match &result {
            Ok(()) => "Undid last move".to_string(),
            Err(_) => "Nothing to undo".to_string(),
        };
        self.publish();
        result
    }

    pub fn submit_command(&mut self, command: Command) -> Result<(), GameError> {
        match command {
            Command::Undo => return self.undo(),
            Command::Restart => {
                self.finish_unfinished();
                self.start_new_game();
                self.publish();
            }
            Command::Quit => {
                self.finish_unfinished();
                self.quit = true;
                self.message = "Session ended".to_string();
                self.publish();
            }
            Command::SwitchMode { mode, model, delay } => {
                return self.select_mode_with(mode, model, delay)
            }
            Command::Help => {
                self.message = HELP.to_string();
                self.publish();
            }
        }
        Ok(())
    }

    /// Handle every input already queued, without waiting for more.
    pub fn process_pending(&mut self) {
        while let Ok(queued) = self.inputs.try_recv() {
            self.handle(queued);
        }
    }

    fn handle(&mut self, queued: Queued) {
        let stale = queued.epoch < self.applied_epoch;
        let result = match queued.input {
            Input::Move(mv) if stale => {
                debug!(%mv, "discarding move queued before a mode switch");
                return;
            }
            Input::Command(Command::Undo) if stale => {
                debug!("discarding undo queued before a mode switch");
                return;
            }
            Input::Command(Command::Restart) if stale => {
                debug!("discarding restart queued before a mode switch");
                return;
            }
            Input::Move(mv) if self.phase == Phase::AiWaiting => {
                debug!(%mv, "ignoring human move while the AI plays");
                return;
            }
            Input::Move(mv) => self.submit_move(mv),
            Input::Command(Command::SwitchMode { mode, model, delay }) => {
                let result = self.retune(model, delay);
                if result.is_ok() {
                    self.switch_mode(mode, queued.epoch);
                }
                result
            }
            Input::Command(command) => self.submit_command(command),
        };
        if let Err(err) = result {
            debug!(%err, "input rejected");
        }
    }

    /// One AI cycle: ask the model, apply its move, or count a failure and
    /// fall back once the bound is reached.
    pub async fn ai_turn(&mut self) -> TurnOutcome {
        if self.phase != Phase::AiWaiting {
            return TurnOutcome::NotAiTurn;
        }
        let decision = self.resolver.resolve(&self.state, &self.backend).await;
        let chosen = decision.chosen();
        let latency = decision.latency;
        self.last_decision = Some(decision);

        if let Some(mv) = chosen {
            self.failures = 0;
            self.message = format!("AI moved {mv} ({} ms)", latency.as_millis());
            return match self.apply(mv, true) {
                Ok(()) => TurnOutcome::Applied {
                    mv,
                    by_fallback: false,
                },
                Err(_) => self.record_failure(),
            };
        }
        self.record_failure()
    }

    fn record_failure(&mut self) -> TurnOutcome {
        self.failures += 1;
        let limit = self.config.max_consecutive_failures;
        if self.failures < limit {
            self.message = format!("AI move failed, retrying ({}/{limit})...", self.failures);
            self.publish();
            return TurnOutcome::Retrying {
                failures: self.failures,
            };
        }

        self.failures = 0;
        self.fallbacks += 1;
        match self.config.fallback {
            Fallback::SkipTurn => {
                warn!(limit, "AI failed repeatedly, skipping turn");
                self.message = format!("AI failed {limit} times in a row, skipping turn");
                self.publish();
                TurnOutcome::Skipped
            }
            Fallback::RandomLegalMove => {
                let legal = self.state.legal_moves();
                let Some(&mv) = legal.choose(&mut self.rng) else {
                    self.publish();
                    return TurnOutcome::Skipped;
                };
                warn!(limit, %mv, "AI failed repeatedly, playing random move");
                self.message = format!("AI failed {limit} times in a row, played random move {mv}");
                match self.apply(mv, true) {
                    Ok(()) => TurnOutcome::Applied {
                        mv,
                        by_fallback: true,
                    },
                    Err(_) => TurnOutcome::Skipped,
                }
            }
        }
    }

    fn apply(&mut self, mv: Move, by_ai: bool) -> Result<(), GameError> {
        let resume = self.phase;
        self.phase = Phase::Applying;
        let outcome = apply_move(&self.state, mv, &mut self.rng);
        if !outcome.changed {
            self.phase = resume;
            return Err(GameError::IllegalMoveNoop(mv));
        }
        let previous = std::mem::replace(&mut self.state, outcome.state);
        self.history.push(previous);
        self.ai_played |= by_ai;
        if !by_ai {
            self.message = format!("Moved {mv}");
        }
        debug!(%mv, score = self.state.score(), moves = self.state.moves(), "move applied");

        match self.state.status() {
            Status::InProgress => self.phase = self.mode.turn(),
            Status::Won => {
                self.phase = Phase::Terminal;
                self.message = format!("You reached {}!", self.state.win_target());
                self.emit_record(Outcome::Won);
            }
            Status::Lost => {
                self.phase = Phase::Terminal;
                self.message = "Game over - no moves left".to_string();
                self.emit_record(Outcome::Lost);
            }
        }
        self.publish();
        Ok(())
    }

    fn start_new_game(&mut self) {
        match new_game(
            self.config.board_size,
            self.config.win_target,
            &mut self.rng,
        ) {
            Ok(state) => self.state = state,
            Err(err) => {
                // The configuration was validated at construction.
                warn!(%err, "could not start a new game");
                return;
            }
        }
        self.history.clear();
        self.failures = 0;
        self.ai_played = false;
        self.started = Instant::now();
        if self.phase != Phase::Idle {
            self.phase = self.mode.turn();
        }
        self.message = "New game started".to_string();
        info!(mode = ?self.mode, "new game");
    }

    fn finish_unfinished(&mut self) {
        if self.phase != Phase::Terminal && self.state.moves() > 0 {
            self.emit_record(Outcome::Abandoned);
        }
    }

    fn emit_record(&mut self, outcome: Outcome) {
        let mode = if self.ai_played {
            format!("AI ({})", self.resolver.model())
        } else {
            "Human".to_string()
        };
        let record = GameRecord {
            score: self.state.score(),
            max_tile: self.state.board().max_tile(),
            moves: self.state.moves(),
            duration_ms: self.started.elapsed().as_millis() as u64,
            outcome,
            mode,
            finished_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };
        info!(?outcome, score = record.score, moves = record.moves, "game finished");
        if self.records.send(record).is_err() {
            debug!("no statistics listener");
        }
    }

    fn publish(&self) {
        self.views.send_replace(self.view());
    }

    /// Drive the session until `Quit` arrives or every input handle is gone.
    /// Human input is handled as it arrives; in AI mode the model is asked
    /// once per cycle and the configured delay paces the moves. Input queued
    /// meanwhile is handled between cycles and during the pause.
    pub async fn run(mut self) {
        self.publish();
        while !self.quit {
            if self.phase != Phase::AiWaiting {
                match self.inputs.recv().await {
                    Some(queued) => self.handle(queued),
                    None => break,
                }
                continue;
            }

            self.process_pending();
            if self.quit || self.phase != Phase::AiWaiting {
                continue;
            }
            self.ai_turn().await;

            let pause = tokio::time::sleep(self.config.move_delay);
            tokio::pin!(pause);
            loop {
                let received = tokio::select! {
                    _ = &mut pause => None,
                    queued = self.inputs.recv() => Some(queued),
                };
                match received {
                    None => break,
                    Some(Some(queued)) => {
                        self.handle(queued);
                        if self.quit || self.phase != Phase::AiWaiting {
                            break;
                        }
                    }
                    Some(None) => {
                        (&mut pause).await;
                        break;
                    }
                }
            }
        }
        info!("session ended");
    }
}

fn placeholder_view() -> GameView {
    GameView {
        grid: Vec::new(),
        score: 0,
        moves: 0,
        max_tile: 0,
        win_target: 0,
        status: Status::InProgress,
        phase: Phase::Idle,
        mode: Mode::Human,
        model: None,
        elapsed_ms: 0,
        undo_available: false,
        consecutive_failures: 0,
        last_decision: None,
        message: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, Completion, CompletionRequest};
    use crate::Board;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Offline;

    impl Backend for Offline {
        async fn complete(&self, _request: CompletionRequest) -> Result<Completion, BackendError> {
            Err(BackendError::Unavailable("offline".into()))
        }
    }

    fn controller() -> (Controller<Offline, StdRng>, SessionChannels) {
        Controller::new(SessionConfig::default(), Offline, StdRng::seed_from_u64(5)).unwrap()
    }

    fn state(rows: &[[u32; 4]]) -> GameState {
        GameState::from_board(Board::from_rows(rows).unwrap(), 0, 2048)
    }

    #[test]
    fn invalid_configuration_fails_construction() {
        let config = SessionConfig {
            board_size: 1,
            ..SessionConfig::default()
        };
        let err = Controller::new(config, Offline, StdRng::seed_from_u64(1)).err();
        assert!(matches!(err, Some(GameError::InvalidConfiguration { .. })));
    }

    #[test]
    fn starts_idle_and_accepts_no_moves() {
        let (mut c, _channels) = controller();
        assert_eq!(c.phase(), Phase::Idle);
        assert_eq!(c.submit_move(Move::Left), Err(GameError::WrongPhase(Phase::Idle)));
        c.select_mode(Mode::Human);
        assert_eq!(c.phase(), Phase::HumanTurn);
    }

    #[test]
    fn human_move_then_undo_round_trips() {
        let (mut c, channels) = controller();
        c.select_mode(Mode::Human);
        c.resume_from(state(&[[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]));
        let before = c.state().clone();
        c.submit_move(Move::Left).unwrap();
        assert_eq!(c.state().score(), 4);
        assert_eq!(c.state().board().get(0, 0), 4);
        assert_eq!(c.history_len(), 1);
        assert!(channels.views.borrow().undo_available);
        c.undo().unwrap();
        assert_eq!(c.state(), &before);
        assert_eq!(c.undo(), Err(GameError::HistoryEmpty));
        assert_eq!(c.message(), "Nothing to undo");
    }

    #[test]
    fn noop_move_is_soft_and_not_recorded() {
        let (mut c, _channels) = controller();
        c.select_mode(Mode::Human);
        c.resume_from(state(&[[2, 4, 0, 0], [0; 4], [0; 4], [0; 4]]));
        assert_eq!(c.submit_move(Move::Left), Err(GameError::IllegalMoveNoop(Move::Left)));
        assert_eq!(c.history_len(), 0);
        assert_eq!(c.phase(), Phase::HumanTurn);
        assert_eq!(c.state().moves(), 0);
    }

    #[test]
    fn undo_is_refused_while_ai_plays() {
        let (mut c, _channels) = controller();
        c.select_mode(Mode::Ai);
        assert_eq!(c.undo(), Err(GameError::WrongPhase(Phase::AiWaiting)));
    }

    #[test]
    fn view_reflects_mode_and_model() {
        let (mut c, channels) = controller();
        c.select_mode(Mode::Ai);
        let view = channels.views.borrow().clone();
        assert_eq!(view.mode, Mode::Ai);
        assert_eq!(view.phase, Phase::AiWaiting);
        assert_eq!(view.model.as_deref(), Some("qwen3:0.6b"));
        assert_eq!(view.grid.len(), 4);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["phase"], "ai_waiting");
        assert_eq!(json["status"], "in_progress");
    }

    #[test]
    fn out_of_range_switch_changes_nothing() {
        let (mut c, channels) = controller();
        c.select_mode(Mode::Human);
        let err = c
            .select_mode_with(Mode::Ai, None, Some(Duration::from_millis(100)))
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidConfiguration { field: "move_delay", .. }));
        let err = c.select_mode_with(Mode::Ai, Some(" ".into()), None).unwrap_err();
        assert!(matches!(err, GameError::InvalidConfiguration { field: "model", .. }));
        assert_eq!(c.mode(), Mode::Human);
        assert_eq!(c.phase(), Phase::HumanTurn);
        assert!(channels.views.borrow().message.contains("model"));

        c.select_mode_with(Mode::Ai, Some("llama2".into()), Some(Duration::from_secs(1)))
            .unwrap();
        assert_eq!(channels.views.borrow().model.as_deref(), Some("llama2"));
    }

    #[test]
    fn help_sets_message() {
        let (mut c, _channels) = controller();
        c.submit_command(Command::Help).unwrap();
        assert!(c.message().starts_with("Moves:"));
    }
}

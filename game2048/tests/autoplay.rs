use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use game2048::{
    Backend, BackendError, Board, Command, Completion, CompletionRequest, Controller, Fallback,
    GameError, GameState, Mode, Move, Outcome, Phase, SessionConfig, Status, TurnOutcome,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Replays canned replies in order; `None` stands for an unreachable server.
/// Once the script runs out every call fails.
struct Scripted {
    replies: Mutex<VecDeque<Option<&'static str>>>,
    calls: AtomicUsize,
    models: Mutex<Vec<String>>,
}

impl Scripted {
    fn new(replies: &[Option<&'static str>]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().copied().collect()),
            calls: AtomicUsize::new(0),
            models: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Backend for Scripted {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.models.lock().unwrap().push(request.model);
        let next = self.replies.lock().unwrap().pop_front().flatten();
        match next {
            Some(text) => Ok(Completion {
                text: text.to_string(),
            }),
            None => Err(BackendError::Unavailable("connection refused".into())),
        }
    }
}

/// Rotates through the four directions, wrapped in a sentence.
struct Cycle {
    step: AtomicUsize,
}

impl Cycle {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            step: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.step.load(Ordering::SeqCst)
    }
}

impl Backend for Cycle {
    async fn complete(&self, _request: CompletionRequest) -> Result<Completion, BackendError> {
        let step = self.step.fetch_add(1, Ordering::SeqCst);
        let word = ["left", "down", "right", "up"][step % 4];
        Ok(Completion {
            text: format!("I would move {word}."),
        })
    }
}

struct Hang;

impl Backend for Hang {
    async fn complete(&self, _request: CompletionRequest) -> Result<Completion, BackendError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Completion { text: "up".into() })
    }
}

fn position(rows: &[[u32; 4]]) -> GameState {
    GameState::from_board(Board::from_rows(rows).unwrap(), 0, 2048)
}

fn ai_config(max_failures: u32, fallback: Fallback) -> SessionConfig {
    SessionConfig {
        max_consecutive_failures: max_failures,
        fallback,
        move_delay: Duration::from_millis(500),
        ..SessionConfig::default()
    }
}

#[tokio::test]
async fn chatty_reply_moves_left() {
    let backend = Scripted::new(&[Some("I think you should go LEFT now")]);
    let (mut c, _channels) = Controller::new(
        ai_config(3, Fallback::RandomLegalMove),
        backend.clone(),
        StdRng::seed_from_u64(1),
    )
    .unwrap();
    c.select_mode(Mode::Ai);
    c.resume_from(position(&[[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]));

    let outcome = c.ai_turn().await;
    assert_eq!(
        outcome,
        TurnOutcome::Applied {
            mv: Move::Left,
            by_fallback: false
        }
    );
    assert_eq!(c.state().board().get(0, 0), 4);
    assert_eq!(c.state().score(), 4);
    let decision = c.last_decision().unwrap();
    assert!(decision.success);
    assert_eq!(decision.mv, Some(Move::Left));
    assert_eq!(c.phase(), Phase::AiWaiting);
}

#[tokio::test]
async fn three_failures_invoke_fallback_once() {
    // Unreachable, unparsable, then a move that changes nothing.
    let backend = Scripted::new(&[None, Some("no idea"), Some("UP"), Some("right")]);
    let (mut c, channels) = Controller::new(
        ai_config(3, Fallback::RandomLegalMove),
        backend.clone(),
        StdRng::seed_from_u64(2),
    )
    .unwrap();
    c.select_mode(Mode::Ai);
    c.resume_from(position(&[[2, 4, 0, 0], [0; 4], [0; 4], [0; 4]]));

    assert_eq!(c.ai_turn().await, TurnOutcome::Retrying { failures: 1 });
    assert!(channels.views.borrow().message.starts_with("AI move failed, retrying"));
    assert_eq!(c.ai_turn().await, TurnOutcome::Retrying { failures: 2 });
    assert_eq!(c.state().moves(), 0);

    match c.ai_turn().await {
        TurnOutcome::Applied {
            mv,
            by_fallback: true,
        } => assert!(mv == Move::Down || mv == Move::Right),
        other => panic!("expected fallback move, got {other:?}"),
    }
    assert_eq!(backend.calls(), 3);
    assert_eq!(c.fallback_count(), 1);
    assert_eq!(c.state().moves(), 1);
    assert_eq!(
        c.last_decision().unwrap().error,
        Some(GameError::IllegalMoveNoop(Move::Up))
    );

    // The failure counter starts over after the fallback.
    let next = c.ai_turn().await;
    assert_eq!(backend.calls(), 4);
    assert_eq!(c.fallback_count(), 1);
    assert!(matches!(
        next,
        TurnOutcome::Applied { by_fallback: false, .. } | TurnOutcome::Retrying { failures: 1 }
    ));
}

#[tokio::test]
async fn skip_turn_fallback_keeps_waiting() {
    let backend = Scripted::new(&[]);
    let (mut c, _channels) = Controller::new(
        ai_config(2, Fallback::SkipTurn),
        backend.clone(),
        StdRng::seed_from_u64(3),
    )
    .unwrap();
    c.select_mode(Mode::Ai);
    let before = c.state().clone();

    assert_eq!(c.ai_turn().await, TurnOutcome::Retrying { failures: 1 });
    assert_eq!(c.ai_turn().await, TurnOutcome::Skipped);
    assert_eq!(c.phase(), Phase::AiWaiting);
    assert_eq!(c.state(), &before);
    assert_eq!(c.fallback_count(), 1);
    assert_eq!(c.ai_turn().await, TurnOutcome::Retrying { failures: 1 });
    assert_eq!(backend.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn hung_backend_counts_as_failure() {
    let config = SessionConfig {
        ai_timeout: Duration::from_millis(100),
        ..ai_config(1, Fallback::RandomLegalMove)
    };
    let (mut c, _channels) = Controller::new(config, Hang, StdRng::seed_from_u64(4)).unwrap();
    c.select_mode(Mode::Ai);

    let outcome = c.ai_turn().await;
    assert!(matches!(outcome, TurnOutcome::Applied { by_fallback: true, .. }));
    assert_eq!(
        c.last_decision().unwrap().error,
        Some(GameError::BackendTimeout(Duration::from_millis(100)))
    );
}

#[tokio::test]
async fn human_moves_are_ignored_while_ai_plays() {
    let (mut c, channels) = Controller::new(
        ai_config(3, Fallback::RandomLegalMove),
        Scripted::new(&[]),
        StdRng::seed_from_u64(5),
    )
    .unwrap();
    c.select_mode(Mode::Ai);
    channels.inputs.submit_move(Move::Left).unwrap();
    channels.inputs.submit_move(Move::Right).unwrap();
    c.process_pending();
    assert_eq!(c.state().moves(), 0);
    assert_eq!(c.ai_turn().await, TurnOutcome::Retrying { failures: 1 });
}

#[test]
fn moves_queued_before_a_switch_are_stale() {
    let (mut c, channels) = Controller::new(
        SessionConfig::default(),
        Scripted::new(&[]),
        StdRng::seed_from_u64(6),
    )
    .unwrap();
    c.select_mode(Mode::Human);
    c.resume_from(position(&[[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]));

    channels.inputs.submit_move(Move::Left).unwrap();
    c.select_mode(Mode::Ai);
    c.select_mode(Mode::Human);
    c.process_pending();
    assert_eq!(c.state().moves(), 0, "stale move must be dropped");

    channels.inputs.submit_move(Move::Left).unwrap();
    c.process_pending();
    assert_eq!(c.state().moves(), 1);
    assert_eq!(c.state().board().get(0, 0), 4);
}

#[test]
fn queued_switch_keeps_later_moves() {
    let (mut c, channels) = Controller::new(
        SessionConfig::default(),
        Scripted::new(&[]),
        StdRng::seed_from_u64(7),
    )
    .unwrap();
    c.select_mode(Mode::Ai);
    c.resume_from(position(&[[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]));

    channels
        .inputs
        .submit_command(Command::switch(Mode::Human))
        .unwrap();
    channels.inputs.submit_move(Move::Left).unwrap();
    c.process_pending();
    assert_eq!(c.mode(), Mode::Human);
    assert_eq!(c.state().moves(), 1);
}

#[test]
fn winning_move_ends_game_and_emits_record() {
    let (mut c, mut channels) = Controller::new(
        SessionConfig::default(),
        Scripted::new(&[]),
        StdRng::seed_from_u64(8),
    )
    .unwrap();
    c.select_mode(Mode::Human);
    c.resume_from(position(&[[1024, 1024, 0, 0], [0; 4], [0; 4], [0; 4]]));

    c.submit_move(Move::Left).unwrap();
    assert_eq!(c.state().status(), Status::Won);
    assert_eq!(c.phase(), Phase::Terminal);
    assert_eq!(c.submit_move(Move::Right), Err(GameError::GameOver));

    let record = channels.records.try_recv().unwrap();
    assert_eq!(record.outcome, Outcome::Won);
    assert_eq!(record.score, 2048);
    assert_eq!(record.max_tile, 2048);
    assert_eq!(record.moves, 1);
    assert_eq!(record.mode, "Human");

    c.submit_command(Command::Restart).unwrap();
    assert_eq!(c.phase(), Phase::HumanTurn);
    assert_eq!(c.state().moves(), 0);
    assert_eq!(c.state().board().tile_count(), 2);
    assert!(channels.records.try_recv().is_err(), "finished game is recorded once");
}

#[test]
fn losing_move_is_terminal() {
    let (mut c, mut channels) = Controller::new(
        SessionConfig::default(),
        Scripted::new(&[]),
        StdRng::seed_from_u64(9),
    )
    .unwrap();
    c.select_mode(Mode::Human);
    // Any spawn into the single gap leaves no pair behind.
    c.resume_from(position(&[
        [0, 32, 64, 128],
        [8, 16, 8, 16],
        [16, 8, 16, 8],
        [8, 16, 8, 16],
    ]));
    c.submit_move(Move::Left).unwrap();
    assert_eq!(c.state().status(), Status::Lost);
    assert_eq!(c.phase(), Phase::Terminal);
    assert_eq!(channels.records.try_recv().unwrap().outcome, Outcome::Lost);

    c.select_mode(Mode::Ai);
    assert_eq!(c.phase(), Phase::AiWaiting);
    assert_eq!(c.state().status(), Status::InProgress);
}

#[test]
fn restart_mid_game_records_abandoned_game() {
    let (mut c, mut channels) = Controller::new(
        SessionConfig::default(),
        Scripted::new(&[]),
        StdRng::seed_from_u64(10),
    )
    .unwrap();
    c.select_mode(Mode::Human);
    c.resume_from(position(&[[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]));
    c.submit_move(Move::Left).unwrap();
    c.select_mode(Mode::Ai);
    assert_eq!(c.state().moves(), 1, "mode switch keeps the board");

    c.submit_command(Command::Restart).unwrap();
    let record = channels.records.try_recv().unwrap();
    assert_eq!(record.outcome, Outcome::Abandoned);
    assert_eq!(record.moves, 1);
    assert_eq!(c.phase(), Phase::AiWaiting);
}

#[tokio::test(start_paused = true)]
async fn run_loop_plays_until_quit() {
    let (mut c, mut channels) = Controller::new(
        ai_config(3, Fallback::RandomLegalMove),
        Cycle::new(),
        StdRng::seed_from_u64(11),
    )
    .unwrap();
    c.select_mode(Mode::Ai);
    let session = tokio::spawn(c.run());

    channels
        .views
        .wait_for(|view| view.moves >= 3)
        .await
        .unwrap();
    channels.inputs.submit_command(Command::Quit).unwrap();
    session.await.unwrap();

    let record = channels.records.recv().await.unwrap();
    assert_eq!(record.outcome, Outcome::Abandoned);
    assert!(record.moves >= 3);
    assert_eq!(record.mode, "AI (qwen3:0.6b)");
    assert!(channels.inputs.submit_move(Move::Up).is_err());
}

#[test]
fn restart_queued_before_a_switch_is_stale() {
    let (mut c, mut channels) = Controller::new(
        SessionConfig::default(),
        Scripted::new(&[]),
        StdRng::seed_from_u64(12),
    )
    .unwrap();
    c.select_mode(Mode::Human);
    c.resume_from(position(&[[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]));
    c.submit_move(Move::Left).unwrap();

    channels.inputs.submit_command(Command::Restart).unwrap();
    c.select_mode(Mode::Ai);
    c.process_pending();
    assert_eq!(c.state().moves(), 1);
    assert!(channels.records.try_recv().is_err());
}

#[test]
fn game_restarted_under_ai_but_played_by_hand_is_human() {
    let (mut c, mut channels) = Controller::new(
        SessionConfig::default(),
        Scripted::new(&[]),
        StdRng::seed_from_u64(13),
    )
    .unwrap();
    c.select_mode(Mode::Ai);
    c.submit_command(Command::Restart).unwrap();
    c.select_mode(Mode::Human);

    let mv = c.state().legal_moves()[0];
    c.submit_move(mv).unwrap();
    c.submit_command(Command::Quit).unwrap();
    let record = channels.records.try_recv().unwrap();
    assert_eq!(record.outcome, Outcome::Abandoned);
    assert_eq!(record.mode, "Human");
}

#[tokio::test]
async fn switch_to_named_model_updates_view_and_record() {
    let backend = Scripted::new(&[Some("left")]);
    let (mut c, mut channels) = Controller::new(
        ai_config(3, Fallback::RandomLegalMove),
        backend.clone(),
        StdRng::seed_from_u64(14),
    )
    .unwrap();
    c.select_mode(Mode::Human);
    c.resume_from(position(&[[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]));

    channels
        .inputs
        .submit_command(Command::SwitchMode {
            mode: Mode::Ai,
            model: Some("llama2".into()),
            delay: Some(Duration::from_secs(1)),
        })
        .unwrap();
    c.process_pending();
    let view = channels.views.borrow().clone();
    assert_eq!(view.mode, Mode::Ai);
    assert_eq!(view.model.as_deref(), Some("llama2"));

    assert_eq!(
        c.ai_turn().await,
        TurnOutcome::Applied {
            mv: Move::Left,
            by_fallback: false
        }
    );
    assert_eq!(*backend.models.lock().unwrap(), vec!["llama2".to_string()]);

    c.submit_command(Command::Quit).unwrap();
    assert_eq!(channels.records.try_recv().unwrap().mode, "AI (llama2)");
}

#[tokio::test(start_paused = true)]
async fn ai_moves_wait_for_the_delay() {
    let backend = Cycle::new();
    let config = SessionConfig {
        move_delay: Duration::from_secs(1),
        ..ai_config(3, Fallback::RandomLegalMove)
    };
    let (mut c, channels) =
        Controller::new(config, backend.clone(), StdRng::seed_from_u64(15)).unwrap();
    c.select_mode(Mode::Ai);
    let session = tokio::spawn(c.run());

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(backend.calls(), 1);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(backend.calls(), 2);

    channels.inputs.submit_command(Command::Quit).unwrap();
    session.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn mode_switch_cuts_the_pause_short() {
    let backend = Cycle::new();
    let config = SessionConfig {
        move_delay: Duration::from_secs(10),
        ..ai_config(3, Fallback::RandomLegalMove)
    };
    let (mut c, mut channels) =
        Controller::new(config, backend.clone(), StdRng::seed_from_u64(16)).unwrap();
    c.select_mode(Mode::Ai);
    let session = tokio::spawn(c.run());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.calls(), 1);
    let paused_at = tokio::time::Instant::now();

    channels.inputs.submit_command(Command::switch(Mode::Human)).unwrap();
    channels
        .views
        .wait_for(|view| view.mode == Mode::Human)
        .await
        .unwrap();
    channels.inputs.submit_command(Command::switch(Mode::Ai)).unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(backend.calls(), 2);
    assert!(paused_at.elapsed() < Duration::from_secs(1));

    channels.inputs.submit_command(Command::Quit).unwrap();
    session.await.unwrap();
}

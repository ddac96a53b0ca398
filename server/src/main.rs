use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::{Parser, ValueEnum};
use game2048::backend::{DEFAULT_OLLAMA_URL, PREFERRED_MODEL};
use game2048::config::DELAY_RANGE;
use game2048::{
    Command, Controller, Fallback, GameRecord, GameSummary, GameView, GenerationOptions,
    InputSender, KeywordSet, Mode, ModelInfo, Move, OllamaClient, SessionConfig,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Play 2048 over HTTP, by hand or with a local Ollama model at the controls.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = "127.0.0.1:3000")]
    listen: String,
    #[arg(long, env = "OLLAMA_HOST", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,
    #[arg(long, default_value = PREFERRED_MODEL)]
    model: String,
    #[arg(long, default_value_t = 4)]
    size: usize,
    #[arg(long, default_value_t = 2048)]
    win_target: u32,
    /// Undo snapshots kept; 0 disables undo.
    #[arg(long, default_value_t = 1)]
    undo_depth: usize,
    /// Pause between AI moves.
    #[arg(long, default_value_t = 2000)]
    delay_ms: u64,
    /// Per-request model timeout.
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,
    #[arg(long, default_value_t = 3)]
    max_failures: u32,
    #[arg(long, value_enum, default_value_t = FallbackArg::Random)]
    fallback: FallbackArg,
    #[arg(long, value_enum, default_value_t = ModeArg::Human)]
    mode: ModeArg,
    /// Seed for tile spawns and random fallback moves.
    #[arg(long)]
    seed: Option<u64>,
    /// JSON file with {"up": [...], "down": [...], "left": [...], "right": [...]}.
    #[arg(long)]
    keywords: Option<PathBuf>,
    #[arg(long)]
    temperature: Option<f32>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FallbackArg {
    Random,
    Skip,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Human,
    Ai,
}

impl Args {
    fn session_config(&self) -> anyhow::Result<SessionConfig> {
        let keywords = match &self.keywords {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading keywords from {}", path.display()))?;
                KeywordSet::from_json(&text)?
            }
            None => KeywordSet::default(),
        };
        let config = SessionConfig {
            board_size: self.size,
            win_target: self.win_target,
            undo_depth: self.undo_depth,
            move_delay: Duration::from_millis(self.delay_ms),
            ai_timeout: Duration::from_millis(self.timeout_ms),
            max_consecutive_failures: self.max_failures,
            fallback: match self.fallback {
                FallbackArg::Random => Fallback::RandomLegalMove,
                FallbackArg::Skip => Fallback::SkipTurn,
            },
            initial_mode: match self.mode {
                ModeArg::Human => Mode::Human,
                ModeArg::Ai => Mode::Ai,
            },
            model: self.model.clone(),
            keywords,
            generation: GenerationOptions {
                temperature: self.temperature,
                ..GenerationOptions::default()
            },
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Clone)]
struct AppState {
    inputs: InputSender,
    views: watch::Receiver<GameView>,
    records: Arc<Mutex<Vec<GameRecord>>>,
    ollama: OllamaClient,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = args.session_config()?;
    let ollama = OllamaClient::new(args.ollama_url.as_str());
    if config.initial_mode == Mode::Ai {
        check_model(&ollama, &config.model).await;
    }

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let initial_mode = config.initial_mode;
    let (mut controller, channels) = Controller::new(config, ollama.clone(), rng)?;
    controller.select_mode(initial_mode);
    tokio::spawn(controller.run());

    let state = AppState {
        inputs: channels.inputs,
        views: channels.views,
        records: collect_records(channels.records),
        ollama,
    };
    let listener = TcpListener::bind(&args.listen).await?;
    info!("Listening on http://{}", args.listen);
    axum::serve(listener, app_router(state)).await?;
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=debug"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Warn early when autoplay is requested but the model is not installed.
async fn check_model(ollama: &OllamaClient, model: &str) {
    match ollama.list_models().await {
        Ok(models) if is_installed(&models, model) => {}
        Ok(models) => {
            let installed: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(model, ?installed, "model not installed; AI turns will fail over");
        }
        Err(err) => warn!(url = ollama.base_url(), %err, "cannot reach Ollama"),
    }
}

/// Ollama lists models without their `:latest` tag.
fn is_installed(models: &[ModelInfo], model: &str) -> bool {
    let wanted = model.strip_suffix(":latest").unwrap_or(model);
    models.iter().any(|m| m.name == wanted)
}

fn collect_records(mut rx: mpsc::UnboundedReceiver<GameRecord>) -> Arc<Mutex<Vec<GameRecord>>> {
    let records = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&records);
    tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            info!(
                score = record.score,
                max_tile = record.max_tile,
                moves = record.moves,
                outcome = ?record.outcome,
                mode = %record.mode,
                "game finished"
            );
            if let Ok(mut all) = sink.lock() {
                all.push(record);
            }
        }
    });
    records
}

fn app_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/state", get(handle_state))
        .route("/move", post(handle_move))
        .route("/command", post(handle_command))
        .route("/records", get(handle_records))
        .route("/stats", get(handle_stats))
        .route("/models", get(handle_models));
    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_origin(axum::http::HeaderValue::from_static("*"))
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(TraceLayer::new_for_http())
}

async fn handle_state(State(state): State<AppState>) -> impl IntoResponse {
    let view = state.views.borrow().clone();
    let headers = [(header::CACHE_CONTROL, "no-store")];
    (headers, Json(view))
}

#[derive(Debug, serde::Deserialize)]
struct MoveBody {
    direction: String,
}

async fn handle_move(
    State(state): State<AppState>,
    Json(body): Json<MoveBody>,
) -> Result<StatusCode, ApiError> {
    let mv: Move = body.direction.parse()?;
    state.inputs.submit_move(mv)?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, serde::Deserialize)]
struct CommandBody {
    command: String,
    #[serde(default)]
    mode: Option<Mode>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    delay_ms: Option<u64>,
}

impl CommandBody {
    fn parse(&self) -> anyhow::Result<Command> {
        Ok(match self.command.trim().to_lowercase().as_str() {
            "undo" => Command::Undo,
            "restart" | "new" => Command::Restart,
            "quit" => Command::Quit,
            "help" => Command::Help,
            "mode" => {
                let mode = self.mode.ok_or_else(|| anyhow!("mode command needs a mode"))?;
                let delay = self.delay_ms.map(Duration::from_millis);
                if let Some(delay) = delay.filter(|d| !DELAY_RANGE.contains(d)) {
                    return Err(anyhow!("delay {delay:?} is outside 500ms-10s"));
                }
                if self.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
                    return Err(anyhow!("model id is empty"));
                }
                Command::SwitchMode {
                    mode,
                    model: self.model.clone(),
                    delay,
                }
            }
            other => return Err(anyhow!("unknown command {other:?}")),
        })
    }
}

async fn handle_command(
    State(state): State<AppState>,
    Json(body): Json<CommandBody>,
) -> Result<StatusCode, ApiError> {
    let command = body.parse()?;
    state.inputs.submit_command(command)?;
    Ok(StatusCode::ACCEPTED)
}

fn finished_games(state: &AppState) -> Result<Vec<GameRecord>, ApiError> {
    let records = state
        .records
        .lock()
        .map_err(|_| anyhow!("record store poisoned"))?;
    Ok(records.clone())
}

async fn handle_records(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let records = finished_games(&state)?;
    let headers = [(header::CACHE_CONTROL, "no-store")];
    Ok((headers, Json(records)))
}

async fn handle_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let summary = GameSummary::from_records(&finished_games(&state)?);
    let headers = [(header::CACHE_CONTROL, "no-store")];
    Ok((headers, Json(summary)))
}

async fn handle_models(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let models = state
        .ollama
        .list_models()
        .await
        .map_err(|err| ApiError::new(StatusCode::BAD_GATEWAY, err))?;
    Ok(Json(models))
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    error: anyhow::Error,
}

impl ApiError {
    fn new(status: StatusCode, err: impl Into<anyhow::Error>) -> Self {
        Self {
            status,
            error: err.into(),
        }
    }
}

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self::new(StatusCode::BAD_REQUEST, err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = format!("{}", self.error);
        (self.status, body).into_response()
    }
}

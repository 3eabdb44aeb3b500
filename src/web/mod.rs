mod assets;

use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::broadcast, time::MissedTickBehavior};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{error, info, warn};

use crate::{
    buildings::BuildingKind,
    config::Rules,
    engine::{Engine, EngineBuilder, EngineSettings},
    error::{GameError, GameResult},
    events::GameEvent,
    snapshot::GameSnapshot,
    workers::JobKind,
};

/// What every SSE message and action response carries.
#[derive(Clone, Serialize)]
pub struct UiFrame {
    pub snapshot: GameSnapshot,
    pub events: Vec<GameEvent>,
}

#[derive(Serialize)]
pub struct StateEnvelope {
    pub started_at: DateTime<Utc>,
    pub seed: u64,
    pub snapshot: GameSnapshot,
}

#[derive(Serialize)]
pub struct ActionResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub frame: UiFrame,
}

#[derive(Deserialize)]
pub struct WorkerRequest {
    pub job: String,
    pub delta: i32,
}

#[derive(Deserialize)]
pub struct CommandRequest {
    pub text: String,
}

struct AppState {
    engine: Arc<Mutex<Engine>>,
    broadcaster: broadcast::Sender<String>,
    started_at: DateTime<Utc>,
    seed: u64,
}

pub struct WebServerConfig {
    pub rules: Rules,
    pub seed: u64,
    pub host: String,
    pub port: u16,
    /// Real time between two clock advances.
    pub frame_ms: u64,
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        rules,
        seed,
        host,
        port,
        frame_ms,
    } = config;

    let engine = EngineBuilder::new(EngineSettings { seed, rules })
        .with_default_systems()
        .build();
    let engine = Arc::new(Mutex::new(engine));
    let (tx, _) = broadcast::channel::<String>(512);

    let state = Arc::new(AppState {
        engine: engine.clone(),
        broadcaster: tx.clone(),
        started_at: Utc::now(),
        seed,
    });

    let frame = Duration::from_millis(frame_ms.max(1));
    tokio::spawn(drive_clock(engine, tx, frame));

    let router = Router::new()
        .route("/", get(index))
        .route("/styles.css", get(styles))
        .route("/app.js", get(script))
        .route("/api/state", get(latest_state))
        .route("/api/events", get(stream_events))
        .route("/api/harvest/:node", post(harvest))
        .route("/api/extinguish/:node", post(extinguish))
        .route("/api/build/:kind", post(build))
        .route("/api/upgrade/:kind", post(upgrade))
        .route("/api/workers", post(assign_worker))
        .route("/api/command", post(command))
        .with_state(state);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid listen address {host}:{port}"))?;
    info!(%addr, "hamlet UI live at http://{addr} (Ctrl+C to stop)");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down web UI");
}

/// Advances the shared engine by real elapsed time and broadcasts a frame
/// whenever something happened.
async fn drive_clock(engine: Arc<Mutex<Engine>>, tx: broadcast::Sender<String>, frame: Duration) {
    let mut interval = tokio::time::interval(frame);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = tokio::time::Instant::now();
    loop {
        let now = interval.tick().await;
        let elapsed = now.duration_since(last);
        last = now;

        let frame = {
            let mut engine = engine.lock().expect("engine lock poisoned");
            if let Err(err) = engine.advance_time(elapsed) {
                error!(?err, "clock advance failed");
            }
            let events = engine.drain_events();
            if events.is_empty() {
                continue;
            }
            UiFrame {
                snapshot: engine.snapshot(),
                events,
            }
        };
        broadcast(&tx, &frame);
    }
}

fn broadcast(tx: &broadcast::Sender<String>, frame: &UiFrame) {
    match serde_json::to_string(frame) {
        Ok(payload) => {
            // No subscribers is fine.
            let _ = tx.send(payload);
        }
        Err(err) => warn!(%err, "failed to encode frame"),
    }
}

/// Runs one player action under the engine lock and publishes the result.
fn act<T>(
    state: &AppState,
    action: impl FnOnce(&mut Engine) -> GameResult<T>,
) -> (StatusCode, Json<ActionResponse>) {
    let (result, frame) = {
        let mut engine = state.engine.lock().expect("engine lock poisoned");
        let result = action(&mut engine);
        let frame = UiFrame {
            events: engine.drain_events(),
            snapshot: engine.snapshot(),
        };
        (result, frame)
    };
    if !frame.events.is_empty() {
        broadcast(&state.broadcaster, &frame);
    }
    let (status, error) = match result {
        Ok(_) => (StatusCode::OK, None),
        Err(err) => (status_for(&err), Some(err.to_string())),
    };
    (
        status,
        Json(ActionResponse {
            ok: error.is_none(),
            error,
            frame,
        }),
    )
}

fn status_for(err: &GameError) -> StatusCode {
    match err {
        GameError::UnknownResource(_)
        | GameError::UnknownDisaster(_)
        | GameError::UnknownBuilding(_)
        | GameError::UnknownJob(_)
        | GameError::UnknownNode(_)
        | GameError::InvalidCommand(_) => StatusCode::BAD_REQUEST,
        GameError::GameFinished => StatusCode::GONE,
        _ => StatusCode::CONFLICT,
    }
}

async fn index() -> Html<&'static str> {
    Html(assets::INDEX_HTML)
}

async fn styles() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], assets::STYLES_CSS)
}

async fn script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        assets::APP_JS,
    )
}

async fn latest_state(State(state): State<Arc<AppState>>) -> Json<StateEnvelope> {
    let snapshot = state.engine.lock().expect("engine lock poisoned").snapshot();
    Json(StateEnvelope {
        started_at: state.started_at,
        seed: state.seed,
        snapshot,
    })
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}

async fn harvest(
    State(state): State<Arc<AppState>>,
    Path(node): Path<usize>,
) -> impl IntoResponse {
    act(&state, |engine| engine.harvest(node))
}

async fn extinguish(
    State(state): State<Arc<AppState>>,
    Path(node): Path<usize>,
) -> impl IntoResponse {
    act(&state, |engine| engine.extinguish_fire(node))
}

async fn build(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> impl IntoResponse {
    act(&state, |engine| {
        let kind: BuildingKind = kind.parse()?;
        engine.build(kind)
    })
}

async fn upgrade(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> impl IntoResponse {
    act(&state, |engine| {
        let kind: BuildingKind = kind.parse()?;
        engine.upgrade(kind)
    })
}

async fn assign_worker(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WorkerRequest>,
) -> impl IntoResponse {
    act(&state, |engine| {
        let job: JobKind = request.job.to_lowercase().parse()?;
        engine.assign_worker(job, request.delta)
    })
}

async fn command(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> impl IntoResponse {
    act(&state, |engine| engine.execute_command(&request.text))
}

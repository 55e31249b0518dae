use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use cribbage_scoreboard::constants::{COMMIT_DELAY_MS, DEFAULT_STATE_PATH, TICK_MS};
use cribbage_scoreboard::engine::{GameEngine, GameEngineOptions, MonotonicClock};
use cribbage_scoreboard::error::CommandRejected;
use cribbage_scoreboard::game_store::FileGameStore;
use cribbage_scoreboard::server_protocol::{parse_client_message, ParsedClientMessage};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, info, warn};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
    #[arg(long, env = "SCOREBOARD_STATE_PATH", default_value = DEFAULT_STATE_PATH)]
    state_path: PathBuf,
    /// Keep the game in memory only.
    #[arg(long)]
    ephemeral: bool,
    #[arg(long, default_value_t = COMMIT_DELAY_MS)]
    commit_delay_ms: u64,
    #[arg(long, env = "STATIC_DIR")]
    static_dir: Option<PathBuf>,
}

struct ServerState {
    clients: HashMap<String, mpsc::Sender<String>>,
    engine: GameEngine,
    store: Option<FileGameStore>,
    clock: MonotonicClock,
}

impl ServerState {
    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn persist(&self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        if let Err(error) = store.save(&self.engine.to_record()) {
            warn!(%error, "failed to save game state, keeping it in memory");
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum CommandReply {
    Broadcast,
    Pong(f64),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let options = GameEngineOptions {
        commit_delay_ms: cli.commit_delay_ms,
        ..GameEngineOptions::default()
    };
    let store = if cli.ephemeral {
        None
    } else {
        Some(FileGameStore::new(cli.state_path.clone()))
    };
    let saved = store.as_ref().and_then(FileGameStore::load);
    let state = Arc::new(Mutex::new(ServerState {
        clients: HashMap::new(),
        engine: GameEngine::restore(saved, options),
        store,
        clock: MonotonicClock::new(),
    }));
    start_tick_loop(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/state", get(state_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) = resolve_static_dir(cli.static_dir.as_deref()) {
        let index_file = static_dir.join("index.html");
        info!(root = %static_dir.display(), "serving static files");
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        info!("no static file root found, serving api only");
        app
    };

    let bind_addr = format!("0.0.0.0:{}", cli.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind server socket");

    info!(port = cli.port, "scoreboard listening");
    axum::serve(listener, app)
        .await
        .expect("server runtime failed");
}

fn resolve_static_dir(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.join("index.html").is_file() {
            return Some(path.to_path_buf());
        }
        warn!(root = %path.display(), "static dir has no index.html");
    }

    let candidates = [PathBuf::from("dist"), PathBuf::from("static")];
    candidates
        .into_iter()
        .find(|path| path.join("index.html").is_file())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn state_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let mut guard = state.lock().await;
    let now_ms = guard.now_ms();
    Json(guard.engine.build_snapshot(now_ms, false))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<String>(64);

    {
        let mut guard = state.lock().await;
        guard.clients.insert(client_id.clone(), tx.clone());
        let now_ms = guard.now_ms();
        let snapshot = guard.engine.build_snapshot(now_ms, false);
        send_to_client(
            &mut guard,
            &client_id,
            &json!({
                "type": "state",
                "snapshot": snapshot,
            }),
        );
    }
    debug!(client_id, "client connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(&state, &client_id, raw.as_str()).await;
            }
            Message::Binary(raw) => match std::str::from_utf8(&raw) {
                Ok(text) => handle_client_message(&state, &client_id, text).await,
                Err(_) => {
                    let mut guard = state.lock().await;
                    send_error(&mut guard, &client_id, "invalid utf8 message");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.lock().await.clients.remove(&client_id);
    debug!(client_id, "client disconnected");
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: &SharedState, client_id: &str, raw: &str) {
    let mut guard = state.lock().await;
    let message = match parse_client_message(raw) {
        Ok(message) => message,
        Err(error) => {
            debug!(client_id, %error, "invalid client message");
            send_error(&mut guard, client_id, &error.to_string());
            return;
        }
    };

    let now_ms = guard.now_ms();
    match apply_command(&mut guard.engine, message, now_ms) {
        Ok(CommandReply::Broadcast) => {
            guard.persist();
            broadcast_state(&mut guard, now_ms);
        }
        Ok(CommandReply::Pong(t)) => {
            send_to_client(&mut guard, client_id, &json!({ "type": "pong", "t": t }));
        }
        Err(rejected) => {
            debug!(client_id, %rejected, "command ignored");
            send_error(&mut guard, client_id, &rejected.to_string());
        }
    }
}

fn apply_command(
    engine: &mut GameEngine,
    message: ParsedClientMessage,
    now_ms: u64,
) -> Result<CommandReply, CommandRejected> {
    match message {
        ParsedClientMessage::Advance { player, value } => engine.advance(player, value, now_ms)?,
        ParsedClientMessage::Undo { player } => engine.undo(player)?,
        ParsedClientMessage::Commit { player } => engine.commit_now(player)?,
        ParsedClientMessage::SetPlayerCount { count } => engine.set_player_count(count)?,
        ParsedClientMessage::Reset => {
            engine.reset();
        }
        ParsedClientMessage::Ping { t } => return Ok(CommandReply::Pong(t)),
    }
    Ok(CommandReply::Broadcast)
}

fn start_tick_loop(state: SharedState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_MS));
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            tick_game(&mut guard);
        }
    });
}

fn tick_game(state: &mut ServerState) {
    let now_ms = state.now_ms();
    let committed = state.engine.step(now_ms);
    if committed.is_empty() {
        return;
    }
    debug!(?committed, "countdown commits");
    state.persist();
    broadcast_state(state, now_ms);
}

fn broadcast_state(state: &mut ServerState, now_ms: u64) {
    let snapshot = state.engine.build_snapshot(now_ms, true);
    let payload = json!({
        "type": "state",
        "snapshot": snapshot,
    })
    .to_string();

    let mut closed_clients = Vec::new();
    for (client_id, tx) in &state.clients {
        match tx.try_send(payload.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!(client_id, "client queue full, dropping state");
            }
            Err(TrySendError::Closed(_)) => closed_clients.push(client_id.clone()),
        }
    }
    for client_id in closed_clients {
        state.clients.remove(&client_id);
    }
}

fn send_to_client(state: &mut ServerState, client_id: &str, message: &Value) {
    let closed = state
        .clients
        .get(client_id)
        .is_some_and(|tx| matches!(tx.try_send(message.to_string()), Err(TrySendError::Closed(_))));
    if closed {
        state.clients.remove(client_id);
    }
}

fn send_error(state: &mut ServerState, client_id: &str, message: &str) {
    send_to_client(
        state,
        client_id,
        &json!({
            "type": "error",
            "message": message,
        }),
    );
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted stand-in for the agent daemon.
//!
//! Speaks the same surface the engine drives: `POST /session`,
//! `GET /event` (SSE), `POST /session/{id}/prompt_async`, and
//! `GET /config/providers`. Behaviour is selected on the command line so
//! specs can script happy paths, stalls, session errors, and
//! model-not-found rejections. Cross-attempt state (stall-once) lives in
//! marker files in the working directory, which the engine reuses across
//! retries of the same eval.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::{Parser, ValueEnum};
use futures_util::stream::Stream;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

const SESSION_ID: &str = "sess_1";
const MARKER_FILE: &str = "attempt.marker";
const PROMPT_LOG: &str = "prompt.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Behavior {
    /// Accept the prompt and reach idle after a short delay.
    Idle,
    /// Accept the prompt and never reach idle.
    Stall,
    /// Stall on the first prompt in this folder, idle afterwards.
    StallOnce,
    /// Accept the prompt, then emit a terminal session error.
    Error,
    /// Reject prompts for models outside `--models`.
    Reject,
}

#[derive(Debug, Parser)]
#[command(name = "fake-agent", about = "Scripted agent daemon for specs.")]
struct Args {
    /// Port to serve on (appended by the engine).
    #[arg(long)]
    port: u16,

    /// Scripted behaviour.
    #[arg(long, value_enum, default_value_t = Behavior::Idle)]
    behavior: Behavior,

    /// Known model ids for `reject` and the provider catalog.
    #[arg(long, value_delimiter = ',', default_value = "glm-5")]
    models: Vec<String>,

    /// Delay before the idle event.
    #[arg(long, default_value_t = 50)]
    idle_delay_ms: u64,

    /// Wrap responses in a `{"data": ...}` envelope.
    #[arg(long, default_value_t = false)]
    wrap: bool,
}

#[derive(Clone)]
struct AppState {
    behavior: Behavior,
    models: Vec<String>,
    idle_delay: Duration,
    wrap: bool,
    events: broadcast::Sender<String>,
}

impl AppState {
    fn envelope(&self, value: serde_json::Value) -> serde_json::Value {
        if self.wrap {
            serde_json::json!({ "data": value })
        } else {
            value
        }
    }

    fn emit(&self, event: serde_json::Value) {
        let _ = self.events.send(event.to_string());
    }

    fn emit_idle_after(&self, delay: Duration) {
        let state = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state.emit(serde_json::json!({
                "type": "session.status",
                "properties": { "sessionID": SESSION_ID, "status": { "type": "busy" } },
            }));
            state.emit(serde_json::json!({
                "type": "session.idle",
                "properties": { "sessionID": SESSION_ID },
            }));
        });
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let (events, _) = broadcast::channel(256);
    let state = AppState {
        behavior: args.behavior,
        models: args.models,
        idle_delay: Duration::from_millis(args.idle_delay_ms),
        wrap: args.wrap,
        events,
    };

    // Heartbeats flow continuously; the engine must not treat them as
    // agent activity.
    let heartbeat = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(200));
        loop {
            interval.tick().await;
            heartbeat.emit(serde_json::json!({ "type": "server.heartbeat" }));
        }
    });

    let app = Router::new()
        .route("/session", post(create_session))
        .route("/event", get(events_stream))
        .route("/session/{id}/prompt_async", post(prompt_async))
        .route("/config/providers", get(providers))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", args.port)).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn create_session(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.envelope(serde_json::json!({
        "id": SESSION_ID,
        "title": "fake session",
        "slug": "fake-session",
    })))
}

async fn events_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx)
        .filter_map(|msg| async move { msg.ok().map(|data| Ok(Event::default().data(data))) });
    Sse::new(stream)
}

async fn prompt_async(
    State(state): State<AppState>,
    Path(_id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    log_prompt();

    match state.behavior {
        Behavior::Idle => {
            state.emit_idle_after(state.idle_delay);
            StatusCode::NO_CONTENT.into_response()
        }
        Behavior::Stall => StatusCode::NO_CONTENT.into_response(),
        Behavior::StallOnce => {
            if std::path::Path::new(MARKER_FILE).exists() {
                state.emit_idle_after(state.idle_delay);
            } else {
                let _ = std::fs::write(MARKER_FILE, "1");
            }
            StatusCode::NO_CONTENT.into_response()
        }
        Behavior::Error => {
            let state = state.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                state.emit(serde_json::json!({
                    "type": "session.error",
                    "properties": {
                        "sessionID": SESSION_ID,
                        "error": { "data": { "message": "boom" } },
                    },
                }));
            });
            StatusCode::NO_CONTENT.into_response()
        }
        Behavior::Reject => {
            let model = body
                .pointer("/model/modelID")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_owned();
            if state.models.iter().any(|m| m == &model) {
                state.emit_idle_after(state.idle_delay);
                return StatusCode::NO_CONTENT.into_response();
            }
            let suggestions = state.models.join(", ");
            let message = format!("Model not found: {model}. Did you mean: {suggestions}?");
            (StatusCode::NOT_FOUND, message).into_response()
        }
    }
}

async fn providers(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut models = serde_json::Map::new();
    for model in &state.models {
        models.insert(model.clone(), serde_json::json!({}));
    }
    let default = state.models.first().cloned().unwrap_or_default();
    Json(state.envelope(serde_json::json!({
        "providers": [{
            "id": "openrouter",
            "name": "OpenRouter",
            "models": models,
        }],
        "default": { "openrouter": default },
    })))
}

/// Append one line per received prompt so specs can count attempts.
fn log_prompt() {
    use std::io::Write;

    let Ok(mut file) =
        std::fs::OpenOptions::new().create(true).append(true).open(PROMPT_LOG)
    else {
        return;
    };
    let _ = file.write_all(b"prompt\n");
}

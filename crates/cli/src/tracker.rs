// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSE completion tracker: consumes the daemon's event stream and decides
//! how an eval ended.
//!
//! Two parties share the tracker state: the stream reader and a 1 s
//! timeout watcher. They coordinate through a cancellation token that is
//! cancelled exactly once; both release on every exit path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::io::AsyncRead;
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Maximum accepted size of a single event line. Large tool-output events
/// can get close to this.
pub const MAX_EVENT_LINE: usize = 8 * 1024 * 1024;

/// Terminal verdict for one eval session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub completed: bool,
    pub error: String,
}

struct TrackerState {
    last_activity: Instant,
    completed: bool,
    error: String,
}

impl TrackerState {
    fn is_terminal(&self) -> bool {
        self.completed || !self.error.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct SseEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    properties: serde_json::Value,
}

/// Consume the event stream until a terminal state, the inactivity
/// timeout, or end of stream.
pub async fn track<R>(reader: R, session_id: &str, inactivity_timeout: Duration) -> Verdict
where
    R: AsyncRead + Unpin,
{
    let state = Arc::new(Mutex::new(TrackerState {
        last_activity: Instant::now(),
        completed: false,
        error: String::new(),
    }));
    let done = CancellationToken::new();

    let watcher = tokio::spawn(watch_inactivity(
        Arc::clone(&state),
        done.clone(),
        inactivity_timeout,
    ));

    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_EVENT_LINE));
    loop {
        tokio::select! {
            _ = done.cancelled() => break,
            item = lines.next() => match item {
                None => break,
                Some(Err(e)) => {
                    let mut s = state.lock().await;
                    if !s.is_terminal() {
                        s.error = format!("event stream error: {e}");
                    }
                    break;
                }
                Some(Ok(line)) => {
                    let mut s = state.lock().await;
                    handle_line(&mut s, &line, session_id);
                    if s.is_terminal() {
                        break;
                    }
                }
            },
        }
    }

    // Exactly-once release for the watcher; cancel() is idempotent so the
    // timeout path reaching here first is fine.
    done.cancel();
    let _ = watcher.await;

    let s = state.lock().await;
    Verdict { completed: s.completed, error: s.error.clone() }
}

async fn watch_inactivity(
    state: Arc<Mutex<TrackerState>>,
    done: CancellationToken,
    timeout: Duration,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = done.cancelled() => return,
            _ = interval.tick() => {}
        }
        let mut s = state.lock().await;
        if s.is_terminal() {
            return;
        }
        if s.last_activity.elapsed() > timeout {
            s.error = format!("no agent activity for {}s", timeout.as_secs());
            done.cancel();
            return;
        }
    }
}

/// Apply one raw stream line to the tracker state.
fn handle_line(state: &mut TrackerState, line: &str, session_id: &str) {
    if line.trim().is_empty() {
        return;
    }
    let event = line
        .strip_prefix("data: ")
        .and_then(|payload| serde_json::from_str::<SseEvent>(payload).ok());
    let Some(event) = event else {
        // Non-event lines (other SSE fields, unparseable payloads) still
        // prove the daemon is alive.
        state.last_activity = Instant::now();
        return;
    };

    // Heartbeats must not defer the inactivity timeout.
    if event.kind.starts_with("server.") {
        return;
    }
    state.last_activity = Instant::now();

    if let Some(sid) = event.properties.get("sessionID").and_then(|v| v.as_str()) {
        if sid != session_id {
            return;
        }
    }

    match event.kind.as_str() {
        "session.idle" => state.completed = true,
        "session.status" => {
            let status = &event.properties["status"];
            match status.get("type").and_then(|v| v.as_str()) {
                Some("idle") => state.completed = true,
                Some("busy") => debug!("agent busy"),
                Some("retry") => {
                    let msg = status.get("message").and_then(|v| v.as_str()).unwrap_or("");
                    debug!(message = msg, "agent retrying");
                }
                _ => {}
            }
        }
        "session.error" => {
            let msg = extract_session_error(&event.properties);
            state.error = if msg.is_empty() { "unknown session error".to_owned() } else { msg };
        }
        "message.updated" | "message.part.updated" => {}
        other => debug!(event = other, "stream event"),
    }
}

/// Pull a human-readable message out of a `session.error` payload.
fn extract_session_error(properties: &serde_json::Value) -> String {
    let Some(error) = properties.get("error") else {
        return "unknown session error".to_owned();
    };
    if let Some(msg) = error.pointer("/data/message").and_then(|v| v.as_str()) {
        return msg.to_owned();
    }
    if let Some(msg) = error.get("message").and_then(|v| v.as_str()) {
        return msg.to_owned();
    }
    if let Some(name) = error.get("name").and_then(|v| v.as_str()) {
        return name.to_owned();
    }
    if let Some(s) = error.as_str() {
        return s.to_owned();
    }
    error.to_string()
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;

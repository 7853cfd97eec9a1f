// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session protocol driver: runs a single eval from folder setup to a
//! terminal result.
//!
//! The protocol is create-session, subscribe to events, post the prompt,
//! then watch the stream. The subscription must be open before the prompt
//! is posted or terminal events can be lost.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;
use futures_util::{StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use crate::artifact::{self, ResultFile};
use crate::catalog::{self, Envelope};
use crate::config::EngineConfig;
use crate::daemon::AgentDaemon;
use crate::tracker;

/// Total window for the daemon readiness probe.
const READINESS_WINDOW: Duration = Duration::from_secs(15);

/// Delay between readiness probe attempts.
const READINESS_POLL: Duration = Duration::from_millis(500);

/// Per-request timeout for control calls (session create, prompt post).
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Cap on response bodies embedded into error messages or parsed as
/// session metadata.
const MAX_BODY: usize = 8 * 1024;

/// Inputs for a single eval run.
#[derive(Debug, Clone)]
pub struct EvalTask {
    pub prompt_text: String,
    /// 1-based position in the prompt library, 0 when unknown.
    pub prompt_number: usize,
    /// Normalized `provider/model` identifier.
    pub model_id: String,
    /// Existing folder to reuse; `None` creates a fresh one.
    pub folder: Option<PathBuf>,
    /// Determines the daemon port (`base_port + index`).
    pub index: usize,
}

/// Outcome of a single eval run.
#[derive(Debug, Clone)]
pub struct EvalResult {
    pub prompt: String,
    pub prompt_number: usize,
    pub folder: PathBuf,
    pub success: bool,
    pub error: String,
    pub duration: Duration,
}

/// The daemon also returns `title` and `slug`; only the id matters here.
#[derive(Debug, serde::Deserialize)]
struct SessionInfo {
    id: String,
}

/// Run one eval to a terminal result. Never fails outright: every error
/// becomes a failed result, and `result.json` is written whenever the
/// folder made it to disk. Setup can fail between creating the folder
/// and writing its scaffolding; the record still lands in that case.
pub async fn run_eval(config: &EngineConfig, task: &EvalTask) -> EvalResult {
    let start = Instant::now();

    let folder = match &task.folder {
        Some(folder) => folder.clone(),
        None => artifact::folder_path(
            &config.evals_dir,
            task.prompt_number,
            task.index,
            &task.model_id,
        ),
    };
    let setup = match &task.folder {
        Some(_) => Ok(()),
        None => artifact::create_folder(&folder, &task.prompt_text),
    };

    let (success, error) = match setup {
        Ok(()) => match drive(config, task, &folder).await {
            Ok(verdict) => {
                if verdict.completed && verdict.error.is_empty() {
                    (true, String::new())
                } else if verdict.error.is_empty() {
                    (false, "agent did not reach idle state".to_owned())
                } else {
                    (false, verdict.error)
                }
            }
            Err(e) => (false, format!("{e:#}")),
        },
        Err(e) => (false, format!("{e:#}")),
    };
    let duration = start.elapsed();

    let on_disk = folder.exists();
    if on_disk {
        let record = ResultFile {
            prompt: task.prompt_text.clone(),
            prompt_number: task.prompt_number,
            model: task.model_id.clone(),
            success,
            error: error.clone(),
            duration_seconds: duration.as_secs(),
            completed_at: Utc::now(),
            cost_usd: None,
        };
        if let Err(e) = artifact::write_result(&folder, &record) {
            warn!(folder = %folder.display(), err = %format!("{e:#}"), "failed to write result.json");
        }
    }

    EvalResult {
        prompt: task.prompt_text.clone(),
        prompt_number: task.prompt_number,
        folder: if on_disk { folder } else { PathBuf::new() },
        success,
        error,
        duration,
    }
}

/// Own the daemon for the duration of the session; every exit path goes
/// through `shutdown`.
async fn drive(
    config: &EngineConfig,
    task: &EvalTask,
    folder: &std::path::Path,
) -> anyhow::Result<tracker::Verdict> {
    let port = config
        .base_port
        .checked_add(u16::try_from(task.index).unwrap_or(u16::MAX))
        .context("task index overflows the port range")?;
    let daemon = AgentDaemon::spawn(&config.agent_cmd, folder, port)?;
    let outcome = drive_session(config, &daemon.base_url(), task).await;
    daemon.shutdown().await;
    outcome
}

async fn drive_session(
    config: &EngineConfig,
    base_url: &str,
    task: &EvalTask,
) -> anyhow::Result<tracker::Verdict> {
    let control = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("build http client")?;
    // The event stream outlives any sane request timeout; only bound the
    // connect phase.
    let events = reqwest::Client::builder()
        .connect_timeout(HTTP_TIMEOUT)
        .build()
        .context("build event stream client")?;

    let session_id = wait_for_session(&control, base_url).await?;
    debug!(session = %session_id, "session created");

    // Ordering invariant: subscribe before the prompt goes out.
    let stream_resp = events
        .get(format!("{base_url}/event"))
        .send()
        .await
        .context("open event stream")?;
    if !stream_resp.status().is_success() {
        anyhow::bail!("event stream rejected: {}", stream_resp.status());
    }

    post_prompt(&control, base_url, &session_id, task).await?;
    info!(session = %session_id, model = %task.model_id, "prompt submitted");

    let reader = tokio_util::io::StreamReader::new(Box::pin(
        stream_resp.bytes_stream().map_err(std::io::Error::other),
    ));
    Ok(tracker::track(reader, &session_id, config.inactivity_timeout).await)
}

/// Poll session-create until the daemon answers, up to the readiness
/// window. The successful response's session id is adopted.
async fn wait_for_session(client: &reqwest::Client, base_url: &str) -> anyhow::Result<String> {
    let deadline = Instant::now() + READINESS_WINDOW;
    loop {
        match create_session(client, base_url).await {
            Ok(id) => return Ok(id),
            Err(e) => {
                if Instant::now() + READINESS_POLL >= deadline {
                    return Err(e.context(format!(
                        "agent daemon not ready after {}s",
                        READINESS_WINDOW.as_secs()
                    )));
                }
                tokio::time::sleep(READINESS_POLL).await;
            }
        }
    }
}

async fn create_session(client: &reqwest::Client, base_url: &str) -> anyhow::Result<String> {
    let resp = client
        .post(format!("{base_url}/session"))
        .send()
        .await
        .context("session create request")?;
    let status = resp.status();
    let body = read_capped(resp, MAX_BODY).await;
    if !status.is_success() {
        anyhow::bail!("session create failed: {status}: {body}");
    }
    let info: Envelope<SessionInfo> =
        serde_json::from_str(&body).context("parse session create response")?;
    let id = info.into_inner().id;
    if id.is_empty() {
        anyhow::bail!("session create returned an empty id");
    }
    Ok(id)
}

async fn post_prompt(
    client: &reqwest::Client,
    base_url: &str,
    session_id: &str,
    task: &EvalTask,
) -> anyhow::Result<()> {
    let (provider, model) = catalog::parse_model_id(&task.model_id);
    let body = serde_json::json!({
        "model": { "providerID": provider, "modelID": model },
        "parts": [{ "type": "text", "text": task.prompt_text }],
    });
    let resp = client
        .post(format!("{base_url}/session/{session_id}/prompt_async"))
        .json(&body)
        .send()
        .await
        .context("post prompt")?;
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = read_capped(resp, MAX_BODY).await;
    if body.trim().is_empty() {
        anyhow::bail!("prompt rejected: {status}");
    }
    anyhow::bail!("{}", body.trim());
}

/// Read at most `cap` bytes of a response body.
async fn read_capped(resp: reqwest::Response, cap: usize) -> String {
    let mut stream = Box::pin(resp.bytes_stream());
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        let room = cap.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if buf.len() >= cap {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;

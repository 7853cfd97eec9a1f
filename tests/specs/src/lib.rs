// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Harness for end-to-end eval specs.
//!
//! The specs drive the real engine against the `fake-agent` binary, a
//! scripted stand-in for the agent daemon that speaks the same HTTP+SSE
//! protocol.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use hieval::config::EngineConfig;
use hieval::scheduler::ModelPicker;

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Engine config pointed at the fake agent, with spec-friendly timeouts.
pub fn engine_config(
    agent_bin: &str,
    agent_args: &[&str],
    evals_dir: PathBuf,
    base_port: u16,
) -> EngineConfig {
    let mut agent_cmd = vec![agent_bin.to_owned()];
    agent_cmd.extend(agent_args.iter().map(|a| (*a).to_owned()));
    EngineConfig {
        inactivity_timeout: Duration::from_secs(10),
        transient_retries: 0,
        base_port,
        agent_cmd,
        evals_dir,
    }
}

/// Picker that always offers the same replacement, recording what it saw.
pub struct ScriptedPicker {
    pub replacement: String,
    pub calls: AtomicUsize,
    pub seen_suggestions: Mutex<Vec<String>>,
}

impl ScriptedPicker {
    pub fn new(replacement: &str) -> Self {
        Self {
            replacement: replacement.to_owned(),
            calls: AtomicUsize::new(0),
            seen_suggestions: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModelPicker for ScriptedPicker {
    fn pick_model(&self, _failed: &str, suggestions: &[String], _saved: &[String]) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen_suggestions.lock() {
            seen.extend(suggestions.iter().cloned());
        }
        Some(self.replacement.clone())
    }
}

/// Picker that declines every correction, recording the attempts.
pub struct DecliningPicker {
    pub calls: AtomicUsize,
}

impl DecliningPicker {
    pub fn new() -> Self {
        Self { calls: AtomicUsize::new(0) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for DecliningPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelPicker for DecliningPicker {
    fn pick_model(&self, _: &str, _: &[String], _: &[String]) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        None
    }
}

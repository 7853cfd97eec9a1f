// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

/// Default port assigned to the first eval task; the task index is added.
pub const DEFAULT_BASE_PORT: u16 = 4096;

/// Default seconds of event-stream silence before an eval times out.
pub const DEFAULT_INACTIVITY_TIMEOUT_SECS: u64 = 180;

/// Default extra attempts allowed after a transient failure.
pub const DEFAULT_TRANSIENT_RETRIES: u32 = 1;

/// Immutable engine tunables, built once from CLI flags and handed to the
/// scheduler at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long the event stream may stay silent before the eval is failed.
    pub inactivity_timeout: Duration,
    /// Extra attempts allowed when a failure classifies as transient.
    pub transient_retries: u32,
    /// First daemon port; the task index is added per eval.
    pub base_port: u16,
    /// Agent daemon argv; `--port <n>` is appended per eval.
    pub agent_cmd: Vec<String>,
    /// Directory eval folders are created under.
    pub evals_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(DEFAULT_INACTIVITY_TIMEOUT_SECS),
            transient_retries: DEFAULT_TRANSIENT_RETRIES,
            base_port: DEFAULT_BASE_PORT,
            agent_cmd: vec!["opencode".to_owned(), "serve".to_owned()],
            evals_dir: PathBuf::from("evals"),
        }
    }
}

/// Engine flags shared by `run` and `resume`.
#[derive(Debug, Args)]
pub struct EngineArgs {
    /// Seconds of event-stream silence before an eval is timed out.
    #[arg(long, env = "HIEVAL_INACTIVITY_TIMEOUT", default_value_t = DEFAULT_INACTIVITY_TIMEOUT_SECS)]
    pub inactivity_timeout: u64,

    /// Extra attempts allowed for transient failures.
    #[arg(long = "retries", env = "HIEVAL_RETRIES", default_value_t = DEFAULT_TRANSIENT_RETRIES)]
    pub retries: u32,

    /// First port assigned to agent daemons; the task index is added.
    #[arg(long, env = "HIEVAL_BASE_PORT", default_value_t = DEFAULT_BASE_PORT)]
    pub base_port: u16,

    /// Agent daemon command; `--port <n>` is appended per eval.
    #[arg(
        long,
        env = "HIEVAL_AGENT_CMD",
        default_value = "opencode serve",
        value_delimiter = ' '
    )]
    pub agent_cmd: Vec<String>,
}

impl EngineArgs {
    /// Build the immutable engine config, applying floors.
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let agent_cmd: Vec<String> =
            self.agent_cmd.iter().filter(|a| !a.is_empty()).cloned().collect();
        if agent_cmd.is_empty() {
            anyhow::bail!("--agent-cmd must name a program");
        }
        Ok(EngineConfig {
            inactivity_timeout: Duration::from_secs(self.inactivity_timeout.max(1)),
            transient_retries: self.retries,
            base_port: self.base_port,
            agent_cmd,
            evals_dir: PathBuf::from("evals"),
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hieval run`: evaluate one model against selected prompts.

use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use tracing::debug;

use crate::catalog;
use crate::config::EngineArgs;
use crate::driver::EvalTask;
use crate::scheduler::{self, Mode, NoCorrection};
use crate::store::Store;

/// Longest accepted prompt text.
pub const MAX_PROMPT_LEN: usize = 2000;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Model to evaluate, as `provider/model` (bare ids default to
    /// openrouter).
    #[arg(short = 'm', long = "model", env = "HIEVAL_MODEL")]
    pub model: String,

    /// Comma-separated 1-based prompt numbers to run.
    #[arg(short = 'p', long = "prompts")]
    pub prompts: String,

    /// Whether tasks run all at once or in list order.
    #[arg(long, value_enum, default_value = "parallel")]
    pub mode: Mode,

    #[command(flatten)]
    pub engine: EngineArgs,
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = Arc::new(args.engine.engine_config()?);
    let model = catalog::normalize_model_id(&args.model)?;

    let store = Store::new(".");
    let prompts = store.load_prompts()?;
    if prompts.is_empty() {
        anyhow::bail!("no prompts saved yet");
    }
    for (i, prompt) in prompts.iter().enumerate() {
        if prompt.is_empty() || prompt.chars().count() > MAX_PROMPT_LEN {
            anyhow::bail!("prompt {} is empty or longer than {MAX_PROMPT_LEN} characters", i + 1);
        }
    }

    let numbers = parse_prompt_selection(&args.prompts, prompts.len())?;
    let tasks: Vec<EvalTask> = numbers
        .iter()
        .enumerate()
        .map(|(index, &n)| EvalTask {
            prompt_text: prompts[n - 1].clone(),
            prompt_number: n,
            model_id: model.clone(),
            folder: None,
            index,
        })
        .collect();
    debug!(count = tasks.len(), model = %model, mode = ?args.mode, "starting batch");

    let saved = store.load_saved_models().unwrap_or_default();
    let results = scheduler::run_batch(config, tasks, args.mode, saved, &NoCorrection).await;
    scheduler::report(&results);
    Ok(())
}

/// Parse a CSV of 1-based prompt numbers, validating against the library
/// size.
pub fn parse_prompt_selection(csv: &str, prompt_count: usize) -> anyhow::Result<Vec<usize>> {
    let mut numbers = Vec::new();
    for part in csv.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let n: usize = part.parse().with_context(|| format!("invalid prompt number {part:?}"))?;
        if n == 0 || n > prompt_count {
            anyhow::bail!("prompt number {n} is out of range (1-{prompt_count})");
        }
        numbers.push(n);
    }
    if numbers.is_empty() {
        anyhow::bail!("no prompt numbers selected");
    }
    Ok(numbers)
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

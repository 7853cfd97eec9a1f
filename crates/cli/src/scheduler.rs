// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch scheduler: runs eval tasks in parallel or sequentially, retries
//! transient failures in place, and (sequentially) repairs
//! model-not-found errors through the interactive collaborator.

use std::sync::Arc;

use clap::ValueEnum;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::classify::{self, ErrorKind};
use crate::config::EngineConfig;
use crate::driver::{self, EvalResult, EvalTask};

/// Batch execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// All tasks at once, one daemon port per task index.
    Parallel,
    /// Tasks in list order, with mid-run model correction.
    Sequential,
}

/// Interactive model selection, provided by the terminal forms outside
/// the engine. The scheduler consults it when a sequential task fails
/// with a model-not-found error.
pub trait ModelPicker: Send + Sync {
    /// Offer replacement candidates for a model the daemon rejected.
    /// `None` abandons the rest of the batch.
    fn pick_model(&self, failed: &str, suggestions: &[String], saved: &[String]) -> Option<String>;
}

/// Picker used in non-interactive runs: never corrects.
pub struct NoCorrection;

impl ModelPicker for NoCorrection {
    fn pick_model(&self, _: &str, _: &[String], _: &[String]) -> Option<String> {
        None
    }
}

/// Run a batch of tasks and return one result per executed task.
///
/// In parallel mode the results vector always matches the task list; in
/// sequential mode a declined model correction abandons the remaining
/// tasks, preserving the results gathered so far.
pub async fn run_batch(
    config: Arc<EngineConfig>,
    tasks: Vec<EvalTask>,
    mode: Mode,
    saved_models: Vec<String>,
    picker: &dyn ModelPicker,
) -> Vec<EvalResult> {
    match mode {
        Mode::Parallel => run_parallel(config, tasks).await,
        Mode::Sequential => run_sequential(config, tasks, saved_models, picker).await,
    }
}

async fn run_parallel(config: Arc<EngineConfig>, tasks: Vec<EvalTask>) -> Vec<EvalResult> {
    let slots: Arc<Mutex<Vec<Option<EvalResult>>>> = Arc::new(Mutex::new(vec![None; tasks.len()]));

    let mut handles = Vec::with_capacity(tasks.len());
    for (slot, task) in tasks.into_iter().enumerate() {
        let config = Arc::clone(&config);
        let slots = Arc::clone(&slots);
        handles.push(tokio::spawn(async move {
            let result = run_with_retries(&config, task).await;
            // The mutex is held only for the single-slot assignment.
            slots.lock().await[slot] = Some(result);
        }));
    }
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(err = %e, "eval task aborted");
        }
    }

    let mut slots = slots.lock().await;
    slots
        .iter_mut()
        .map(|slot| {
            slot.take().unwrap_or_else(|| EvalResult {
                prompt: String::new(),
                prompt_number: 0,
                folder: Default::default(),
                success: false,
                error: "eval task aborted".to_owned(),
                duration: Default::default(),
            })
        })
        .collect()
}

async fn run_sequential(
    config: Arc<EngineConfig>,
    tasks: Vec<EvalTask>,
    saved_models: Vec<String>,
    picker: &dyn ModelPicker,
) -> Vec<EvalResult> {
    let mut results = Vec::with_capacity(tasks.len());
    // A corrected model applies to the current retry and every later task.
    let mut model_override: Option<String> = None;

    for mut task in tasks {
        if let Some(ref model) = model_override {
            task.model_id = model.clone();
        }
        let mut result = run_with_retries(&config, task.clone()).await;

        while !result.success {
            let ErrorKind::ModelNotFound { suggestions } = classify::classify(&result.error)
            else {
                break;
            };
            let Some(new_model) =
                picker.pick_model(&task.model_id, &suggestions, &saved_models)
            else {
                info!("model correction declined, abandoning remaining tasks");
                results.push(result);
                return results;
            };
            info!(model = %new_model, "retrying with corrected model");
            model_override = Some(new_model.clone());
            task.model_id = new_model;
            reuse_folder(&mut task, &result);
            result = run_with_retries(&config, task.clone()).await;
        }

        results.push(result);
    }
    results
}

/// Run one task up to `1 + transient_retries` times, reusing the folder
/// across attempts.
async fn run_with_retries(config: &EngineConfig, mut task: EvalTask) -> EvalResult {
    let mut result = driver::run_eval(config, &task).await;
    for attempt in 0..config.transient_retries {
        if result.success || !classify::is_transient(&result.error) {
            break;
        }
        info!(
            attempt = attempt + 2,
            error = %result.error,
            folder = %result.folder.display(),
            "transient failure, retrying"
        );
        reuse_folder(&mut task, &result);
        result = driver::run_eval(config, &task).await;
    }
    result
}

fn reuse_folder(task: &mut EvalTask, result: &EvalResult) {
    if !result.folder.as_os_str().is_empty() {
        task.folder = Some(result.folder.clone());
    }
}

/// Print the per-task summary and the success tally.
pub fn report(results: &[EvalResult]) {
    for result in results {
        let mark = if result.success { "✓" } else { "✗" };
        let secs = result.duration.as_secs();
        if result.success {
            println!("{mark} p{} {}s {}", result.prompt_number, secs, result.folder.display());
        } else {
            println!(
                "{mark} p{} {}s {}: {}",
                result.prompt_number,
                secs,
                result.folder.display(),
                result.error
            );
        }
    }
    let ok = results.iter().filter(|r| r.success).count();
    println!("{ok}/{} evals succeeded", results.len());
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

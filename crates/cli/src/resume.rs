// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hieval resume`: re-run existing eval folders in place.

use std::path::Path;
use std::sync::Arc;

use clap::Args;
use tracing::warn;

use crate::artifact;
use crate::config::EngineArgs;
use crate::driver::EvalTask;
use crate::scheduler::{self, Mode, NoCorrection};
use crate::store::{EvalFolder, Store};

#[derive(Debug, Args)]
pub struct ResumeArgs {
    /// Folders to re-run (names under `evals/` or paths). Defaults to
    /// every folder whose result is missing or unsuccessful.
    pub folders: Vec<String>,

    /// Whether tasks run all at once or in list order.
    #[arg(long, value_enum, default_value = "parallel")]
    pub mode: Mode,

    #[command(flatten)]
    pub engine: EngineArgs,
}

pub async fn run(args: ResumeArgs) -> anyhow::Result<()> {
    let config = Arc::new(args.engine.engine_config()?);
    let store = Store::new(".");

    let all = store.scan_evals()?;
    if all.is_empty() {
        anyhow::bail!("no eval folders found under {}", store.evals_dir().display());
    }
    let selected = select_folders(all, &args.folders)?;
    let prompts = store.load_prompts().unwrap_or_default();

    let mut tasks = Vec::new();
    for folder in selected {
        let Some(task) = task_from_folder(&folder, tasks.len(), &prompts) else {
            warn!(folder = %folder.path.display(), "skipping folder without a usable result.json (model unknown)");
            continue;
        };
        tasks.push(task);
    }
    if tasks.is_empty() {
        anyhow::bail!("nothing to resume");
    }

    let saved = store.load_saved_models().unwrap_or_default();
    let results = scheduler::run_batch(config, tasks, args.mode, saved, &NoCorrection).await;
    scheduler::report(&results);
    Ok(())
}

/// Filter scanned folders down to the requested set; with no request,
/// keep folders lacking a successful result.
fn select_folders(all: Vec<EvalFolder>, requested: &[String]) -> anyhow::Result<Vec<EvalFolder>> {
    if requested.is_empty() {
        return Ok(all
            .into_iter()
            .filter(|f| !matches!(f.result, Some(ref r) if r.success))
            .collect());
    }
    let mut selected = Vec::new();
    for name in requested {
        let wanted = Path::new(name);
        let found = all.iter().find(|f| {
            f.path == wanted || f.path.file_name().map(|n| n == wanted.as_os_str()).unwrap_or(false)
        });
        match found {
            Some(folder) => selected.push(folder.clone()),
            None => anyhow::bail!("eval folder {name:?} not found"),
        }
    }
    Ok(selected)
}

/// Rebuild an eval task from an existing folder. The model comes from the
/// stored result; without one the folder cannot be re-run.
fn task_from_folder(folder: &EvalFolder, index: usize, prompts: &[String]) -> Option<EvalTask> {
    let result = folder.result.as_ref()?;
    let prompt_number = artifact::recover_prompt_number(
        result.prompt_number,
        &folder.path,
        &folder.prompt,
        prompts,
    );
    Some(EvalTask {
        prompt_text: folder.prompt.clone(),
        prompt_number,
        model_id: result.model.clone(),
        folder: Some(folder.path.clone()),
        index,
    })
}

#[cfg(test)]
#[path = "resume_tests.rs"]
mod tests;

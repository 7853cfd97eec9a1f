// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk eval artifacts: folder layout, `prompt.txt`, `package.json`,
//! `result.json`, and the naming/recovery rules that make `resume` work.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of the sanitized model fragment in a folder name.
const MODEL_FRAGMENT_MAX: usize = 64;

/// Durable record of one eval outcome, stored as `result.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultFile {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub prompt_number: usize,
    pub model: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    pub duration_seconds: u64,
    pub completed_at: DateTime<Utc>,
    /// Populated by external tooling only; the engine accepts but never
    /// writes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// Turn a model identifier into a filesystem-safe folder fragment.
///
/// Lowercases, keeps `[a-z0-9._-]`, coalesces any run of other characters
/// into a single `-`, trims leading/trailing `-_.`, truncates to 64
/// characters and retrims. An empty result becomes `unknown-model`.
pub fn sanitize_model(model: &str) -> String {
    let mut out = String::with_capacity(model.len());
    let mut pending_dash = false;
    for c in model.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-') {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }
    let mut trimmed = out.trim_matches(|c| matches!(c, '-' | '_' | '.')).to_owned();
    if trimmed.len() > MODEL_FRAGMENT_MAX {
        trimmed.truncate(MODEL_FRAGMENT_MAX);
        trimmed = trimmed.trim_matches(|c| matches!(c, '-' | '_' | '.')).to_owned();
    }
    if trimmed.is_empty() {
        return "unknown-model".to_owned();
    }
    trimmed
}

/// Compute a timestamped folder name for a new eval.
///
/// Timestamp plus index keep names unique within one invocation.
pub fn folder_name(prompt_number: usize, index: usize, model: &str) -> String {
    let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    format!("{stamp}_p{prompt_number}_{index}_{}", sanitize_model(model))
}

/// Create the eval folder with its `prompt.txt` and `package.json`
/// scaffolding.
pub fn create_folder(path: &Path, prompt: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("create eval folder {}", path.display()))?;
    std::fs::write(path.join("prompt.txt"), prompt)
        .with_context(|| format!("write prompt.txt in {}", path.display()))?;
    let name = path.to_string_lossy().replace(['/', '\\'], "-");
    let scaffold = serde_json::json!({
        "name": name,
        "type": "module",
        "private": true,
    });
    let body = serde_json::to_string_pretty(&scaffold).context("serialize package.json")?;
    std::fs::write(path.join("package.json"), body)
        .with_context(|| format!("write package.json in {}", path.display()))?;
    Ok(())
}

/// Write (or overwrite) `result.json` in the given folder.
pub fn write_result(folder: &Path, result: &ResultFile) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(result).context("serialize result.json")?;
    let path = folder.join("result.json");
    std::fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Read `result.json` from an eval folder.
pub fn read_result(folder: &Path) -> anyhow::Result<ResultFile> {
    let path = folder.join("result.json");
    let body =
        std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&body).with_context(|| format!("parse {}", path.display()))
}

/// Recover a 1-based prompt number for an existing eval folder.
///
/// Resolution order: the stored field, a `_p<N>_` fragment in the folder
/// name, then an exact-prompt-text lookup in the current prompts list.
/// Returns 0 when nothing matches.
pub fn recover_prompt_number(
    stored: usize,
    folder: &Path,
    prompt: &str,
    prompts: &[String],
) -> usize {
    if stored > 0 {
        return stored;
    }
    if let Some(name) = folder.file_name().and_then(|n| n.to_str()) {
        if let Some(n) = number_from_folder_name(name) {
            return n;
        }
    }
    prompts.iter().position(|p| p == prompt).map(|i| i + 1).unwrap_or(0)
}

/// Extract a positive prompt number from a `_p<N>_` folder-name fragment.
pub fn number_from_folder_name(name: &str) -> Option<usize> {
    static PATTERN: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // the pattern is a literal
        regex::Regex::new(r"_p(\d+)_").unwrap()
    });
    let n: usize = re.captures(name)?.get(1)?.as_str().parse().ok()?;
    (n > 0).then_some(n)
}

/// Absolute-ish path of a new eval folder under the evals directory.
pub fn folder_path(evals_dir: &Path, prompt_number: usize, index: usize, model: &str) -> PathBuf {
    evals_dir.join(folder_name(prompt_number, index, model))
}

#[cfg(test)]
#[path = "artifact_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flat-file persistence: the prompt library, saved model favourites, and
//! the scan over existing eval folders.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use tracing::debug;

use crate::artifact::{self, ResultFile};

/// File name of the prompt library.
pub const PROMPTS_FILE: &str = "prompts.json";

/// File name of the saved model favourites.
pub const SAVED_MODELS_FILE: &str = "saved-models.json";

/// Directory eval folders live under.
pub const EVALS_DIR: &str = "evals";

/// An existing eval folder discovered by [`Store::scan_evals`].
#[derive(Debug, Clone)]
pub struct EvalFolder {
    pub path: PathBuf,
    pub prompt: String,
    /// `None` when `result.json` is absent or unparseable.
    pub result: Option<ResultFile>,
}

/// Root-relative access to the data files.
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn prompts_path(&self) -> PathBuf {
        self.root.join(PROMPTS_FILE)
    }

    pub fn saved_models_path(&self) -> PathBuf {
        self.root.join(SAVED_MODELS_FILE)
    }

    pub fn evals_dir(&self) -> PathBuf {
        self.root.join(EVALS_DIR)
    }

    /// Load the prompt library. An absent or empty file is an empty list;
    /// a parse error is fatal.
    pub fn load_prompts(&self) -> anyhow::Result<Vec<String>> {
        read_string_list(&self.prompts_path())
    }

    /// Persist the prompt library as pretty two-space JSON.
    pub fn save_prompts(&self, prompts: &[String]) -> anyhow::Result<()> {
        write_pretty(&self.prompts_path(), &prompts, false)
    }

    /// Load the saved model favourites.
    pub fn load_saved_models(&self) -> anyhow::Result<Vec<String>> {
        read_string_list(&self.saved_models_path())
    }

    /// Persist the saved model favourites, sorted, with a trailing newline.
    pub fn save_saved_models(&self, models: &[String]) -> anyhow::Result<()> {
        let mut sorted = models.to_vec();
        sorted.sort();
        sorted.dedup();
        write_pretty(&self.saved_models_path(), &sorted, true)
    }

    /// Scan the evals directory for eval folders.
    ///
    /// Every immediate subdirectory with a readable `prompt.txt` yields a
    /// record; a broken `result.json` demotes the record to "no result" but
    /// keeps it. Returns folders sorted by name.
    pub fn scan_evals(&self) -> anyhow::Result<Vec<EvalFolder>> {
        let dir = self.evals_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&dir)
            .with_context(|| format!("read evals directory {}", dir.display()))?;
        let mut folders = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Ok(prompt) = std::fs::read_to_string(path.join("prompt.txt")) else {
                debug!(folder = %path.display(), "skipping folder without prompt.txt");
                continue;
            };
            let result = match artifact::read_result(&path) {
                Ok(r) => Some(r),
                Err(e) => {
                    debug!(folder = %path.display(), err = %format!("{e:#}"), "no usable result.json");
                    None
                }
            };
            folders.push(EvalFolder { path, prompt, result });
        }
        folders.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(folders)
    }
}

fn read_string_list(path: &Path) -> anyhow::Result<Vec<String>> {
    let body = match std::fs::read_to_string(path) {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
    };
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&body).with_context(|| format!("parse {}", path.display()))
}

fn write_pretty<T: Serialize>(path: &Path, value: &T, trailing_newline: bool) -> anyhow::Result<()> {
    let mut body = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize {}", path.display()))?;
    if trailing_newline {
        body.push('\n');
    }
    std::fs::write(path, body).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

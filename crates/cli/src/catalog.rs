// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-invocation snapshot of the agent daemon's provider/model catalog.

use std::collections::BTreeMap;

use anyhow::Context;
use serde::Deserialize;

/// Provider a model id is assumed to belong to when none is given.
pub const DEFAULT_PROVIDER: &str = "openrouter";

/// Daemon responses arrive either bare or wrapped in a `data` envelope;
/// accept both with a single untagged parse (direct first).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Direct(T),
    Wrapped { data: T },
}

impl<T> Envelope<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Direct(v) => v,
            Self::Wrapped { data } => data,
        }
    }
}

/// One provider in the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct Provider {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Keyed by model id; the daemon attaches metadata we ignore.
    #[serde(default)]
    pub models: BTreeMap<String, serde_json::Value>,
}

impl Provider {
    /// Sorted model ids offered by this provider.
    pub fn model_ids(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }
}

/// Snapshot of the daemon's catalog. Ephemeral; never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub providers: Vec<Provider>,
    /// Default model id per provider id.
    #[serde(default)]
    pub default: BTreeMap<String, String>,
}

impl Catalog {
    /// All fully-qualified `provider/model` identifiers, sorted.
    pub fn qualified_model_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .providers
            .iter()
            .flat_map(|p| p.models.keys().map(move |m| format!("{}/{m}", p.id)))
            .collect();
        ids.sort();
        ids
    }

    /// Default model for a provider, fully qualified.
    pub fn default_for(&self, provider: &str) -> Option<String> {
        self.default.get(provider).map(|m| format!("{provider}/{m}"))
    }
}

/// Fetch the provider catalog from a running agent daemon.
pub async fn fetch_providers(client: &reqwest::Client, base_url: &str) -> anyhow::Result<Catalog> {
    let resp = client
        .get(format!("{base_url}/config/providers"))
        .send()
        .await
        .context("fetch provider catalog")?;
    let resp = resp.error_for_status().context("provider catalog request")?;
    let envelope: Envelope<Catalog> =
        resp.json().await.context("parse provider catalog response")?;
    Ok(envelope.into_inner())
}

/// Normalize a user-supplied model id to `provider/model`.
///
/// Empty input is rejected; an id without a `/` is assumed to live on the
/// default provider.
pub fn normalize_model_id(model: &str) -> anyhow::Result<String> {
    let model = model.trim();
    if model.is_empty() {
        anyhow::bail!("model id must not be empty");
    }
    if model.contains('/') {
        return Ok(model.to_owned());
    }
    Ok(format!("{DEFAULT_PROVIDER}/{model}"))
}

/// Split a normalized id into `(provider, model)` on the first `/`.
///
/// An id without a `/` belongs to the default provider.
pub fn parse_model_id(model_id: &str) -> (&str, &str) {
    match model_id.split_once('/') {
        Some((provider, model)) => (provider, model),
        None => (DEFAULT_PROVIDER, model_id),
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maps raw eval error strings to a retry decision.

/// Error messages containing one of these fragments may be retried in
/// place; everything else is final.
const TRANSIENT_MARKERS: &[&str] = &[
    "no agent activity for ",
    "event stream error: ",
    "agent did not reach idle state",
];

const MODEL_NOT_FOUND_MARKER: &str = "Model not found";
const SUGGESTION_MARKER: &str = "Did you mean:";

/// How the scheduler should react to a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Retry eligible, same folder.
    Transient,
    /// No retry.
    Fatal,
    /// Fatal for this attempt, but correctable by picking another model.
    ModelNotFound { suggestions: Vec<String> },
}

/// Classify a raw error message.
pub fn classify(error: &str) -> ErrorKind {
    if error.contains(MODEL_NOT_FOUND_MARKER) {
        return ErrorKind::ModelNotFound { suggestions: parse_suggestions(error) };
    }
    if is_transient(error) {
        return ErrorKind::Transient;
    }
    ErrorKind::Fatal
}

/// Whether an error message is retry eligible.
pub fn is_transient(error: &str) -> bool {
    TRANSIENT_MARKERS.iter().any(|m| error.contains(m))
}

/// Extract `Did you mean: a, b, c?` suggestions from a model-not-found
/// message. The trailing question mark is stripped; entries are
/// comma-split and trimmed.
fn parse_suggestions(error: &str) -> Vec<String> {
    let Some(idx) = error.find(SUGGESTION_MARKER) else {
        return Vec::new();
    };
    let tail = error[idx + SUGGESTION_MARKER.len()..].trim().trim_end_matches('?');
    tail.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;

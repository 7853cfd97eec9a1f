// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fuzzy model-match ranking used when repairing model-not-found failures
//! and when pinning saved favourites to the top of selection lists.

/// A candidate that matched the query, with its accumulated score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMatch {
    pub id: String,
    pub score: i32,
}

/// Rank `provider/model` candidates against a fuzzy query.
///
/// Only candidates that match at all are returned, best first; ties break
/// by candidate id ascending.
pub fn rank_models(query: &str, candidates: &[String]) -> Vec<ModelMatch> {
    let lower_query = query.to_lowercase();
    let normalized_query = normalize(query);
    let tokens = tokenize(query);

    let mut matches: Vec<ModelMatch> = candidates
        .iter()
        .filter_map(|id| {
            score_candidate(id, &lower_query, &normalized_query, &tokens)
                .map(|score| ModelMatch { id: id.clone(), score })
        })
        .collect();
    matches.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    matches
}

/// Move every saved candidate to the front, preserving relative order
/// within both partitions.
pub fn pin_saved(list: Vec<String>, saved: &[String]) -> Vec<String> {
    let (pinned, rest): (Vec<String>, Vec<String>) =
        list.into_iter().partition(|id| saved.iter().any(|s| s == id));
    let mut out = pinned;
    out.extend(rest);
    out
}

/// Score one candidate; `None` when no matching rule fired.
fn score_candidate(
    candidate: &str,
    lower_query: &str,
    normalized_query: &str,
    tokens: &[String],
) -> Option<i32> {
    let lower_model = candidate.to_lowercase();
    let normalized_model = normalize(candidate);

    let mut score = 0;
    let mut matched = false;

    if lower_model.contains(lower_query) {
        score += 140;
        matched = true;
    }
    if normalized_model.contains(normalized_query) {
        score += 120;
        matched = true;
    }
    if normalized_model.starts_with(normalized_query) {
        score += 30;
    }
    if is_subsequence(normalized_query, &normalized_model) {
        score += 50;
        matched = true;
    }

    let mut all_tokens_hit = !tokens.is_empty();
    let mut in_order = true;
    let mut cursor = 0;
    for token in tokens {
        if lower_model.contains(token.as_str()) {
            score += 20;
        } else {
            all_tokens_hit = false;
        }
        // In-order walk: each token must appear after the previous one,
        // without overlap.
        match lower_model[cursor..].find(token.as_str()) {
            Some(pos) => cursor += pos + token.len(),
            None => in_order = false,
        }
    }
    if all_tokens_hit {
        score += 40;
        if in_order && tokens.len() >= 2 {
            score += 20;
        }
    }

    matched.then_some(score)
}

/// Lowercase, letters and digits only.
fn normalize(s: &str) -> String {
    s.chars().filter(|c| c.is_alphanumeric()).flat_map(char::to_lowercase).collect()
}

/// Lowercased query fragments split on non-alphanumeric characters.
fn tokenize(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn is_subsequence(needle: &str, haystack: &str) -> bool {
    let mut chars = haystack.chars();
    needle.chars().all(|n| chars.any(|h| h == n))
}

#[cfg(test)]
#[path = "rank_tests.rs"]
mod tests;

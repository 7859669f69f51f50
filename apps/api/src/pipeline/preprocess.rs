//! Record preprocessing — renders each posting into a bounded text block and
//! prices it in tokens.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::models::Record;
use crate::pipeline::error::PipelineError;
use crate::tokens::TokenEstimator;

pub const TRUNCATION_MARKER: &str = "...";
const UNKNOWN: &str = "Unknown";

/// A record rendered for the prompt, with its token cost.
#[derive(Debug, Clone)]
pub struct PreparedItem {
    pub key: String,
    pub text: String,
    pub tokens: usize,
    pub record: Record,
}

/// Renders one record. `index` is the record's position in the input and is
/// only used for error reporting.
pub fn prepare(
    index: usize,
    record: Record,
    description_char_limit: usize,
    estimator: &dyn TokenEstimator,
) -> Result<PreparedItem, PipelineError> {
    let key = record.key().ok_or_else(|| PipelineError::InvalidRecord {
        index,
        reason: "missing job_url".to_string(),
    })?;

    let description = bound_description(
        &record.description().unwrap_or_default(),
        description_char_limit,
    );

    let text = format!(
        "Title: {}\nCompany: {}\nLocation: {}\nURL: {}\nDescription: {}",
        record.text_or("title", UNKNOWN),
        record.text_or("company", UNKNOWN),
        record.text_or("location", UNKNOWN),
        key,
        description,
    );
    let tokens = estimator.estimate(&text);
    debug!("Prepared {} ({} tokens)", key, tokens);

    Ok(PreparedItem {
        key,
        text,
        tokens,
        record,
    })
}

/// Collapses whitespace and truncates to `limit` characters, appending the
/// truncation marker when anything was cut.
pub fn bound_description(description: &str, limit: usize) -> String {
    let normalized = description.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().count() <= limit {
        return normalized;
    }
    let mut truncated: String = normalized.chars().take(limit).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// Drops records whose key was already seen, keeping the first occurrence.
/// Returns the surviving records (with their original input index) and the
/// number dropped.
pub fn dedupe_by_key(records: Vec<Record>) -> (Vec<(usize, Record)>, usize) {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(records.len());
    let mut dropped = 0;

    for (index, record) in records.into_iter().enumerate() {
        match record.key() {
            Some(key) if !seen.insert(key.clone()) => {
                warn!("Skipping duplicate posting {}", key);
                dropped += 1;
            }
            _ => unique.push((index, record)),
        }
    }

    (unique, dropped)
}

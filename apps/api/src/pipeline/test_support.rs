//! Shared fixtures for pipeline tests: a deterministic estimator and a
//! scripted completion service.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm_client::{CompletionService, LlmError};
use crate::models::Record;
use crate::tokens::TokenEstimator;

/// One token per whitespace-separated word.
pub struct WordEstimator;

impl TokenEstimator for WordEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn model_id(&self) -> &str {
        "words"
    }
}

/// Replays canned responses in order; once the script is empty, answers
/// every prompt with one result per posting URL found in it.
pub struct ScriptedService {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedService {
    pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always echoes a full, correctly keyed result set.
    pub fn echo() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    async fn complete(&self, _system: &str, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        let urls: Vec<&str> = prompt
            .lines()
            .filter_map(|line| line.strip_prefix("URL: "))
            .collect();
        Ok(results_json(&urls))
    }
}

pub fn result_value(url: &str) -> Value {
    json!({
        "title": format!("Role at {url}"),
        "company": "Acme",
        "description": "Builds things",
        "location": "Remote",
        "match_score": 70,
        "key_matches": ["Rust"],
        "missing_qualifications": [],
        "resume_suggestions": ["Lead with impact"],
        "application_priority": "Medium",
        "reason": "Solid overlap",
        "job_url": url
    })
}

pub fn results_json(urls: &[&str]) -> String {
    let results: Vec<Value> = urls.iter().map(|u| result_value(u)).collect();
    json!({ "results": results }).to_string()
}

pub fn record(url: &str, description: &str) -> Record {
    Record::from(json!({
        "title": "Rust Engineer",
        "company": "Acme",
        "location": "Remote",
        "description": description,
        "job_url": url
    }))
}

pub fn records(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| record(&format!("https://jobs.example.com/{i}"), "short"))
        .collect()
}

pub mod aggregator;
pub mod analytics;
pub mod batcher;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod preprocess;
pub mod prompts;
pub mod reconcile;
pub mod reference;
pub mod retry;
pub mod runner;

#[cfg(test)]
pub mod test_support;

use std::time::Duration;

use crate::pipeline::batcher::BatchLimits;
use crate::pipeline::error::PipelineError;
use crate::pipeline::retry::RetryPolicy;

pub use runner::{AssessmentPipeline, RunControl, RunReport};

/// Tunables for one assessment run. Loaded once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model whose tokenizer prices prompts.
    pub tokenizer_model: String,
    pub batch_max_tokens: usize,
    pub input_max_tokens: usize,
    pub max_items_per_batch: usize,
    pub retry: RetryPolicy,
    /// Pause between consecutive batch requests.
    pub inter_batch_delay: Duration,
    pub description_char_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tokenizer_model: "gpt-4".to_string(),
            batch_max_tokens: 100_000,
            input_max_tokens: 1_000_000,
            max_items_per_batch: 20,
            retry: RetryPolicy::default(),
            inter_batch_delay: Duration::from_millis(5000),
            description_char_limit: 2000,
        }
    }
}

impl PipelineConfig {
    pub fn limits(&self) -> BatchLimits {
        BatchLimits {
            batch_max_tokens: self.batch_max_tokens,
            max_items_per_batch: self.max_items_per_batch,
            input_max_tokens: self.input_max_tokens,
        }
    }

    /// Rejects settings under which no batch could ever be sent.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let zero = [
            ("BATCH_MAX_TOKENS", self.batch_max_tokens),
            ("INPUT_MAX_TOKENS", self.input_max_tokens),
            ("MAX_ITEMS_PER_BATCH", self.max_items_per_batch),
            ("MAX_RETRIES", self.retry.max_attempts as usize),
            ("DESCRIPTION_CHAR_LIMIT", self.description_char_limit),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);

        match zero {
            Some((name, _)) => Err(PipelineError::Configuration(format!(
                "{name} must be greater than zero"
            ))),
            None => Ok(()),
        }
    }
}

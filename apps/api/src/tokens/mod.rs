//! Token estimation — thin adapter over tiktoken-rs.
//!
//! Every budget decision in the pipeline (per-batch ceiling, global ceiling)
//! is made against these counts. The tokenizer is resolved once per process
//! from `TOKENIZER_MODEL`; an unknown model is a configuration error and
//! aborts startup.

use thiserror::Error;
use tiktoken_rs::{get_bpe_from_model, CoreBPE};

#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("Unsupported tokenizer model '{model}': {reason}")]
    UnsupportedModel { model: String, reason: String },
}

/// Counts tokens for budget accounting. Implementations must be deterministic
/// for a fixed model.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;

    fn model_id(&self) -> &str;
}

/// BPE-backed estimator. The encoder is loaded once and reused.
pub struct TiktokenEstimator {
    model: String,
    bpe: CoreBPE,
}

impl TiktokenEstimator {
    pub fn for_model(model: &str) -> Result<Self, TokenizerError> {
        let bpe = get_bpe_from_model(model).map_err(|e| TokenizerError::UnsupportedModel {
            model: model.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            model: model.to_string(),
            bpe,
        })
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_with_special_tokens(text).len()
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

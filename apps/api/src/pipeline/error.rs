use thiserror::Error;

use crate::llm_client::LlmError;
use crate::tokens::TokenizerError;

/// Run-fatal failures. Any of these aborts the run before (or between)
/// batches; nothing partial is reported.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    UnsupportedModel(#[from] TokenizerError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Reference document is empty")]
    EmptyReference,

    #[error("Reference document is unreadable: {0}")]
    UnreadableReference(String),

    #[error("Record {index} is invalid: {reason}")]
    InvalidRecord { index: usize, reason: String },
}

/// Failure of one batch request. Only `Configuration` escalates to the run.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("transient request failure: {0}")]
    Transient(LlmError),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("request rejected: {0}")]
    Rejected(LlmError),

    #[error("configuration error: {0}")]
    Configuration(LlmError),
}

impl BatchError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BatchError::Transient(_) | BatchError::MalformedResponse(_)
        )
    }
}

impl From<LlmError> for BatchError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Unauthorized { .. } => BatchError::Configuration(err),
            LlmError::Parse(_) | LlmError::EmptyContent => {
                BatchError::MalformedResponse(err.to_string())
            }
            _ if err.is_transient() => BatchError::Transient(err),
            _ => BatchError::Rejected(err),
        }
    }
}

use crate::pipeline::error::PipelineError;
use crate::tokens::TokenEstimator;

/// The résumé every posting is assessed against. Built once per run and
/// shared read-only by every batch.
#[derive(Debug, Clone)]
pub struct ReferenceDocument {
    text: String,
    tokens: usize,
}

impl ReferenceDocument {
    pub fn new(text: &str, estimator: &dyn TokenEstimator) -> Result<Self, PipelineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::EmptyReference);
        }
        Ok(Self {
            tokens: estimator.estimate(text),
            text: text.to_string(),
        })
    }

    /// Extracts the text layer of a PDF résumé.
    pub fn from_pdf(bytes: &[u8], estimator: &dyn TokenEstimator) -> Result<Self, PipelineError> {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| PipelineError::UnreadableReference(e.to_string()))?;
        Self::new(&text, estimator)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> usize {
        self.tokens
    }
}

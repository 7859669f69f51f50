//! Request Executor — delivers one batch to the completion service.
//!
//! Flow per batch: build prompt → call with retry/backoff → parse the
//! structured result array.
//!
//! Requests are strictly sequential. The inter-batch delay is the only
//! throughput control. The driver calls `pace` between every pair of batches,
//! whether or not the previous one succeeded, and checks for cancellation
//! after the wait.

use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{strip_json_fences, CompletionService};
use crate::models::AssessmentResult;
use crate::pipeline::batcher::Batch;
use crate::pipeline::error::{BatchError, PipelineError};
use crate::pipeline::prompts::{ASSESSMENT_PROMPT_TEMPLATE, ASSESSMENT_SYSTEM_ROLE, JOB_SEPARATOR};
use crate::pipeline::reference::ReferenceDocument;
use crate::pipeline::retry::{retry_with_backoff, RetryPolicy};

/// What one batch produced. Results are unvalidated against the batch's
/// item count; that is the reconciler's job.
#[derive(Debug)]
pub enum BatchOutcome {
    Succeeded {
        results: Vec<AssessmentResult>,
        attempts: u32,
    },
    Failed {
        error: BatchError,
        attempts: u32,
    },
}

/// Accepts both `{"results": [...]}` and a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ResultsPayload {
    Envelope { results: Vec<AssessmentResult> },
    Bare(Vec<AssessmentResult>),
}

pub fn system_prompt() -> String {
    format!("{ASSESSMENT_SYSTEM_ROLE} {JSON_ONLY_SYSTEM}")
}

/// Fills the assessment template in a single pass so that placeholder-like
/// text inside the résumé or postings is never substituted.
pub fn build_prompt(resume_text: &str, jobs_text: &str) -> String {
    let mut prompt = String::with_capacity(
        ASSESSMENT_PROMPT_TEMPLATE.len() + resume_text.len() + jobs_text.len(),
    );
    let mut rest = ASSESSMENT_PROMPT_TEMPLATE;
    loop {
        let next = [("{resume_text}", resume_text), ("{jobs_text}", jobs_text)]
            .into_iter()
            .filter_map(|(placeholder, value)| rest.find(placeholder).map(|at| (at, placeholder, value)))
            .min_by_key(|(at, _, _)| *at);

        match next {
            Some((at, placeholder, value)) => {
                prompt.push_str(&rest[..at]);
                prompt.push_str(value);
                rest = &rest[at + placeholder.len()..];
            }
            None => {
                prompt.push_str(rest);
                return prompt;
            }
        }
    }
}

pub fn build_batch_prompt(batch: &Batch, reference: &ReferenceDocument) -> String {
    let jobs_text = batch
        .items
        .iter()
        .map(|item| item.text.as_str())
        .collect::<Vec<_>>()
        .join(JOB_SEPARATOR);
    build_prompt(reference.text(), &jobs_text)
}

/// Parses the service's text into results. Non-JSON, wrong shape and
/// out-of-range fields are all `MalformedResponse`.
pub fn parse_results(text: &str) -> Result<Vec<AssessmentResult>, BatchError> {
    let payload: ResultsPayload = serde_json::from_str(strip_json_fences(text))
        .map_err(|e| BatchError::MalformedResponse(e.to_string()))?;

    let results = match payload {
        ResultsPayload::Envelope { results } => results,
        ResultsPayload::Bare(results) => results,
    };

    if let Some(violation) = results.iter().find_map(AssessmentResult::schema_violation) {
        return Err(BatchError::MalformedResponse(violation));
    }

    Ok(results)
}

pub struct RequestExecutor<'a> {
    service: &'a dyn CompletionService,
    retry: RetryPolicy,
    inter_batch_delay: Duration,
    system: String,
    dispatched: u32,
}

impl<'a> RequestExecutor<'a> {
    pub fn new(
        service: &'a dyn CompletionService,
        retry: RetryPolicy,
        inter_batch_delay: Duration,
    ) -> Self {
        Self {
            service,
            retry,
            inter_batch_delay,
            system: system_prompt(),
            dispatched: 0,
        }
    }

    /// Waits out the inter-batch delay. Returns immediately until the first
    /// batch of the run has been sent, so the delay only ever falls between
    /// two batches.
    pub async fn pace(&self) {
        if self.dispatched == 0 || self.inter_batch_delay.is_zero() {
            return;
        }
        info!(
            "Pacing: waiting {}ms before the next batch",
            self.inter_batch_delay.as_millis()
        );
        tokio::time::sleep(self.inter_batch_delay).await;
    }

    /// Sends one batch. Only a credential/configuration failure is returned as
    /// `Err`; every other failure is reported as `BatchOutcome::Failed`.
    pub async fn execute(
        &mut self,
        batch: &Batch,
        reference: &ReferenceDocument,
    ) -> Result<BatchOutcome, PipelineError> {
        self.dispatched += 1;

        let prompt = build_batch_prompt(batch, reference);
        info!(
            "Dispatching batch {} ({} postings, ~{} tokens, {} of them fixed overhead)",
            batch.index,
            batch.len(),
            batch.token_count,
            batch.overhead_tokens
        );

        let service = self.service;
        let system = self.system.as_str();
        let prompt = prompt.as_str();
        let mut attempts = 0;
        let outcome = retry_with_backoff(&self.retry, BatchError::is_retryable, |attempt| {
            attempts = attempt;
            async move {
                let text = service
                    .complete(system, prompt)
                    .await
                    .map_err(BatchError::from)?;
                parse_results(&text)
            }
        })
        .await;

        match outcome {
            Ok(results) => Ok(BatchOutcome::Succeeded { results, attempts }),
            Err(failure) => match failure.error {
                BatchError::Configuration(err) => {
                    Err(PipelineError::Configuration(err.to_string()))
                }
                error => Ok(BatchOutcome::Failed {
                    error,
                    attempts: failure.attempts,
                }),
            },
        }
    }
}

//! Run driver — the single-task loop that owns every piece of run state.
//!
//! dedupe → prepare → { build batch → pace → (cancel check) → execute → reconcile/aggregate }* → report
//!
//! Nothing here is shared across runs: `RunState`, the batch builder and the
//! executor's pacing clock are created fresh for each call to `run`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::vec;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::llm_client::CompletionService;
use crate::models::{AssessmentResult, Record};
use crate::pipeline::aggregator::{RunAggregator, RunCounts, RunOutcome};
use crate::pipeline::analytics::RunAnalytics;
use crate::pipeline::batcher::{Admission, Batch, BatchBuilder, SAFETY_BUFFER_TOKENS};
use crate::pipeline::error::PipelineError;
use crate::pipeline::executor::{build_prompt, system_prompt, BatchOutcome, RequestExecutor};
use crate::pipeline::preprocess::{dedupe_by_key, prepare, PreparedItem};
use crate::pipeline::prompts::JOB_SEPARATOR;
use crate::pipeline::reference::ReferenceDocument;
use crate::pipeline::PipelineConfig;
use crate::tokens::TokenEstimator;

/// Intake-side counters for one run. Created at run start, dropped at the end.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunState {
    pub items_offered: usize,
    pub duplicates_skipped: usize,
    pub items_admitted: usize,
    /// Overhead of every opened batch plus every admitted item. Never decreases.
    pub tokens_consumed: usize,
    pub skipped_by_budget: usize,
}

/// Cooperative stop signal, checked before each batch is dispatched.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancelled: Arc<AtomicBool>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub assessments: Vec<AssessmentResult>,
    pub counts: RunCounts,
    pub analytics: RunAnalytics,
}

pub struct AssessmentPipeline<'a> {
    config: &'a PipelineConfig,
    estimator: &'a dyn TokenEstimator,
    service: &'a dyn CompletionService,
    control: RunControl,
}

impl<'a> AssessmentPipeline<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        estimator: &'a dyn TokenEstimator,
        service: &'a dyn CompletionService,
        control: RunControl,
    ) -> Self {
        Self {
            config,
            estimator,
            service,
            control,
        }
    }

    /// Tokens every batch carries before its first posting: the résumé, the
    /// instruction text, the system prompt and a safety buffer.
    pub fn fixed_overhead(&self, reference: &ReferenceDocument) -> usize {
        reference.tokens()
            + self.estimator.estimate(&build_prompt("", ""))
            + self.estimator.estimate(&system_prompt())
            + SAFETY_BUFFER_TOKENS
    }

    /// Assesses `records` against `reference`.
    ///
    /// Returns `Err` only for run-fatal conditions; batch failures and
    /// reconciliation losses are reported through `RunReport::counts`.
    pub async fn run(
        &self,
        records: Vec<Record>,
        reference: &ReferenceDocument,
    ) -> Result<RunReport, PipelineError> {
        let run_id = Uuid::new_v4();
        self.run_inner(run_id, records, reference)
            .instrument(info_span!("run", %run_id))
            .await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        records: Vec<Record>,
        reference: &ReferenceDocument,
    ) -> Result<RunReport, PipelineError> {
        let started_at = Utc::now();
        self.control.reset();

        let mut state = RunState {
            items_offered: records.len(),
            ..Default::default()
        };
        info!(
            "Run started: {} postings, résumé {} tokens",
            records.len(),
            reference.tokens()
        );

        let (unique, duplicates) = dedupe_by_key(records);
        state.duplicates_skipped = duplicates;

        let offered: Vec<Record> = unique.iter().map(|(_, record)| record.clone()).collect();
        let prepared = unique
            .into_iter()
            .map(|(index, record)| {
                prepare(index, record, self.config.description_char_limit, self.estimator)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let overhead = self.fixed_overhead(reference);
        let separator = self.estimator.estimate(JOB_SEPARATOR);
        debug!(
            "Fixed per-batch overhead: {} tokens, {} per separator",
            overhead, separator
        );

        let mut builder = BatchBuilder::new(self.config.limits(), overhead, separator);
        let mut executor = RequestExecutor::new(
            self.service,
            self.config.retry.clone(),
            self.config.inter_batch_delay,
        );
        let mut aggregator = RunAggregator::new();
        let mut items = prepared.into_iter();
        let mut cancelled = false;

        while let Some(batch) = next_batch(&mut builder, &mut items, &mut state) {
            // A cancel that arrives during the wait still stops this batch.
            executor.pace().await;
            if self.control.is_cancelled() {
                warn!("Run cancelled before batch {}", batch.index);
                cancelled = true;
                break;
            }

            match executor.execute(&batch, reference).await? {
                BatchOutcome::Succeeded { results, attempts } => {
                    debug!(
                        "Batch {} returned {} results after {} attempt(s)",
                        batch.index,
                        results.len(),
                        attempts
                    );
                    aggregator.record_success(&batch, results);
                }
                BatchOutcome::Failed { error, attempts } => {
                    warn!(
                        "Batch {} failed after {} attempt(s), {} postings lost: {}",
                        batch.index,
                        attempts,
                        batch.len(),
                        error
                    );
                    aggregator.record_failure(&batch);
                }
            }
        }

        let (outcome, assessments, counts) = aggregator.finish(&state, cancelled);
        let analytics = RunAnalytics::compute(&offered, &assessments);

        info!(
            "Run finished ({:?}): offered={} resolved={} lost_by_batch_failure={} lost_by_reconciliation={} batches={}/{} failed",
            outcome,
            counts.offered,
            counts.resolved,
            counts.lost_by_batch_failure,
            counts.lost_by_reconciliation,
            counts.batches_failed,
            counts.batches_attempted
        );

        Ok(RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            outcome,
            assessments,
            counts,
            analytics,
        })
    }
}

/// Feeds items to the builder until it hands back a closed batch, or the
/// stream ends and the terminal flush runs.
fn next_batch(
    builder: &mut BatchBuilder,
    items: &mut vec::IntoIter<PreparedItem>,
    state: &mut RunState,
) -> Option<Batch> {
    for item in items.by_ref() {
        match builder.push(item, state) {
            Admission::Admitted { flushed: Some(batch) } => {
                debug!("Batch {} closed ({:?})", batch.index, builder.state());
                return Some(batch);
            }
            Admission::Admitted { flushed: None } => {}
            Admission::Refused(item) => {
                debug!("Over global budget, skipping {}", item.key);
                state.skipped_by_budget += 1;
            }
        }
    }
    if builder.is_exhausted() {
        debug!("Intake closed by the global budget; flushing the open batch");
    }
    builder.finish()
}

//! Run Aggregator — append-only result collection plus the run's loss ledger.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{info, warn};

use crate::models::AssessmentResult;
use crate::pipeline::batcher::Batch;
use crate::pipeline::reconcile::reconcile;
use crate::pipeline::runner::RunState;

/// How the run ended. Fatal errors never produce an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Complete,
    /// Non-empty input, nothing resolved.
    NoResults,
    Cancelled,
}

/// Where every offered posting went.
///
/// `offered = duplicates_skipped + dispatched + skipped_by_budget + skipped_by_cancellation`
/// and `dispatched = resolved + lost_by_batch_failure + lost_by_reconciliation`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunCounts {
    pub offered: usize,
    pub duplicates_skipped: usize,
    pub admitted: usize,
    pub skipped_by_budget: usize,
    pub skipped_by_cancellation: usize,
    pub dispatched: usize,
    pub resolved: usize,
    pub lost_by_batch_failure: usize,
    pub lost_by_reconciliation: usize,
    pub discarded_results: usize,
    pub batches_attempted: usize,
    pub batches_failed: usize,
    pub tokens_estimated: usize,
}

#[derive(Debug, Default)]
pub struct RunAggregator {
    assessments: Vec<AssessmentResult>,
    seen: HashSet<String>,
    counts: RunCounts,
}

impl RunAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconciles a successful batch's raw results and appends the survivors.
    pub fn record_success(&mut self, batch: &Batch, results: Vec<AssessmentResult>) {
        self.counts.batches_attempted += 1;
        self.counts.dispatched += batch.len();

        let reconciliation = reconcile(batch, results);
        self.counts.lost_by_reconciliation += reconciliation.missing.len();
        self.counts.discarded_results += reconciliation.discarded.len();

        let mut resolved = 0;
        for assessment in reconciliation.matched {
            if self.seen.insert(assessment.job_url.clone()) {
                self.assessments.push(assessment);
                resolved += 1;
            } else {
                warn!("Dropping second result for {}", assessment.job_url);
                self.counts.lost_by_reconciliation += 1;
                self.counts.discarded_results += 1;
            }
        }
        self.counts.resolved += resolved;

        info!(
            "Batch {} resolved {}/{} postings",
            batch.index,
            resolved,
            batch.len()
        );
    }

    /// Every item of a failed batch is lost.
    pub fn record_failure(&mut self, batch: &Batch) {
        self.counts.batches_attempted += 1;
        self.counts.batches_failed += 1;
        self.counts.dispatched += batch.len();
        self.counts.lost_by_batch_failure += batch.len();
    }

    #[cfg(test)]
    pub fn counts(&self) -> &RunCounts {
        &self.counts
    }

    #[cfg(test)]
    pub fn assessments(&self) -> &[AssessmentResult] {
        &self.assessments
    }

    /// Folds in the intake-side counters and decides the outcome.
    pub fn finish(
        mut self,
        state: &RunState,
        cancelled: bool,
    ) -> (RunOutcome, Vec<AssessmentResult>, RunCounts) {
        self.counts.offered = state.items_offered;
        self.counts.duplicates_skipped = state.duplicates_skipped;
        self.counts.admitted = state.items_admitted;
        self.counts.skipped_by_budget = state.skipped_by_budget;
        self.counts.tokens_estimated = state.tokens_consumed;
        self.counts.skipped_by_cancellation = state
            .items_offered
            .saturating_sub(state.duplicates_skipped)
            .saturating_sub(state.skipped_by_budget)
            .saturating_sub(self.counts.dispatched);

        let outcome = if cancelled {
            RunOutcome::Cancelled
        } else if self.assessments.is_empty() && state.items_offered > 0 {
            warn!(
                "Run produced no results from {} postings",
                state.items_offered
            );
            RunOutcome::NoResults
        } else {
            RunOutcome::Complete
        };

        (outcome, self.assessments, self.counts)
    }
}

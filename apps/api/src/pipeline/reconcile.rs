//! Result reconciliation — maps the service's result set back onto the batch
//! that produced it.
//!
//! Counts equal and keys line up position by position: accepted in order.
//! Otherwise each item looks for a result carrying its exact key; items
//! without one are losses. Results that match nothing in the batch are
//! discarded, never forwarded.
//!
//! Blank `title`, `company` or `location` on a matched result are filled from
//! the posting it was matched to.

use tracing::{debug, warn};

use crate::models::{AssessmentResult, Record};
use crate::pipeline::batcher::Batch;

#[derive(Debug, Default)]
pub struct Reconciliation {
    /// In batch order, one per recognized item.
    pub matched: Vec<AssessmentResult>,
    /// Keys of items the service returned nothing for.
    pub missing: Vec<String>,
    /// Keys of results that matched no remaining item.
    pub discarded: Vec<String>,
}

pub fn reconcile(batch: &Batch, results: Vec<AssessmentResult>) -> Reconciliation {
    if results.len() == batch.len() && batch.keys().zip(&results).all(|(k, r)| r.job_url == k) {
        debug!("Batch {}: all {} results line up", batch.index, results.len());
        let matched = batch
            .items
            .iter()
            .zip(results)
            .map(|(item, result)| backfill(result, &item.record))
            .collect();
        return Reconciliation {
            matched,
            ..Default::default()
        };
    }

    warn!(
        "Batch {}: expected {} results in order, got {}; matching by job_url",
        batch.index,
        batch.len(),
        results.len()
    );
    reconcile_by_key(batch, results)
}

fn reconcile_by_key(batch: &Batch, results: Vec<AssessmentResult>) -> Reconciliation {
    let mut pool: Vec<Option<AssessmentResult>> = results.into_iter().map(Some).collect();
    let mut reconciliation = Reconciliation::default();

    for item in &batch.items {
        let found = pool
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|r| r.job_url == item.key))
            .and_then(Option::take);

        match found {
            Some(result) => reconciliation.matched.push(backfill(result, &item.record)),
            None => {
                warn!("Batch {}: no result returned for {}", batch.index, item.key);
                reconciliation.missing.push(item.key.clone());
            }
        }
    }

    for leftover in pool.into_iter().flatten() {
        warn!(
            "Batch {}: discarding result for unknown or repeated key {}",
            batch.index, leftover.job_url
        );
        reconciliation.discarded.push(leftover.job_url);
    }

    reconciliation
}

fn backfill(mut result: AssessmentResult, record: &Record) -> AssessmentResult {
    for (field, source) in [
        (&mut result.title, record.title()),
        (&mut result.company, record.company()),
        (&mut result.location, record.location()),
    ] {
        if field.trim().is_empty() {
            if let Some(value) = source {
                *field = value;
            }
        }
    }
    result
}

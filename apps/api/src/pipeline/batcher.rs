//! Batch Builder — packs prepared postings into requests under three budgets.
//!
//! Budgets:
//! - `batch_max_tokens`: ceiling for one request, fixed overhead included
//! - `max_items_per_batch`: ceiling on postings per request
//! - `input_max_tokens`: ceiling on tokens across the whole run (soft cutoff)
//!
//! Every posting after the first in a batch also pays for the separator that
//! precedes it in the prompt.
//!
//! The per-request checks run *before* an item is added. An item that alone
//! exceeds the per-request ceiling still gets a batch of its own; nothing is
//! dropped for being large.

use tracing::{info, warn};

use crate::pipeline::preprocess::PreparedItem;
use crate::pipeline::runner::RunState;

/// Added to every batch's overhead to absorb message framing.
pub const SAFETY_BUFFER_TOKENS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub batch_max_tokens: usize,
    pub max_items_per_batch: usize,
    pub input_max_tokens: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    Accumulating,
    /// The last push closed a batch to make room. Cleared by the next push.
    Closing,
    /// Global budget reached; no further intake.
    Exhausted,
    Completed,
}

/// One outbound request's worth of postings.
#[derive(Debug, Clone)]
pub struct Batch {
    pub index: usize,
    pub items: Vec<PreparedItem>,
    pub overhead_tokens: usize,
    /// Overhead plus item tokens plus one separator between each pair of items.
    pub token_count: usize,
}

impl Batch {
    fn open(index: usize, overhead_tokens: usize) -> Self {
        Self {
            index,
            items: Vec::new(),
            overhead_tokens,
            token_count: overhead_tokens,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|i| i.key.as_str())
    }
}

#[derive(Debug)]
pub enum Admission {
    /// The item joined the open batch. `flushed` carries the batch that had to
    /// be closed first, if any.
    Admitted { flushed: Option<Batch> },
    /// Intake is over; the item was not placed anywhere.
    Refused(PreparedItem),
}

pub struct BatchBuilder {
    limits: BatchLimits,
    overhead_tokens: usize,
    separator_tokens: usize,
    state: BuilderState,
    current: Option<Batch>,
    next_index: usize,
}

impl BatchBuilder {
    pub fn new(limits: BatchLimits, overhead_tokens: usize, separator_tokens: usize) -> Self {
        if overhead_tokens >= limits.batch_max_tokens {
            warn!(
                "Fixed overhead ({} tokens) already meets batch_max_tokens ({}); every batch will hold one posting",
                overhead_tokens, limits.batch_max_tokens
            );
        }
        Self {
            limits,
            overhead_tokens,
            separator_tokens,
            state: BuilderState::Accumulating,
            current: None,
            next_index: 0,
        }
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == BuilderState::Exhausted
    }

    /// Offers one item. Updates the run's token and request counters for
    /// admitted items and for every batch opened.
    pub fn push(&mut self, item: PreparedItem, run: &mut RunState) -> Admission {
        if matches!(self.state, BuilderState::Exhausted | BuilderState::Completed) {
            return Admission::Refused(item);
        }

        let mut flushed = None;
        if let Some(current) = &self.current {
            let cost = self.cost_in(current, &item);
            let over_tokens = current.token_count + cost > self.limits.batch_max_tokens;
            let over_items = current.len() + 1 > self.limits.max_items_per_batch;
            if !current.is_empty() && (over_tokens || over_items) {
                flushed = self.current.take();
            }
        }

        let mut current = match self.current.take() {
            Some(current) => current,
            None => {
                run.tokens_consumed += self.overhead_tokens;
                self.next_index += 1;
                Batch::open(self.next_index - 1, self.overhead_tokens)
            }
        };
        let cost = self.cost_in(&current, &item);
        run.tokens_consumed += cost;
        run.items_admitted += 1;
        current.token_count += cost;
        current.items.push(item);
        self.current = Some(current);

        self.state = if run.tokens_consumed > self.limits.input_max_tokens {
            info!(
                "Global token budget reached ({} > {}); no further postings will be admitted",
                run.tokens_consumed, self.limits.input_max_tokens
            );
            BuilderState::Exhausted
        } else if flushed.is_some() {
            BuilderState::Closing
        } else {
            BuilderState::Accumulating
        };

        Admission::Admitted { flushed }
    }

    /// Tokens `item` adds to `batch`: its own plus a separator unless it is first.
    fn cost_in(&self, batch: &Batch, item: &PreparedItem) -> usize {
        if batch.is_empty() {
            item.tokens
        } else {
            item.tokens + self.separator_tokens
        }
    }

    /// Terminal flush. Returns the open batch if it holds anything.
    pub fn finish(&mut self) -> Option<Batch> {
        self.state = BuilderState::Completed;
        self.current.take().filter(|b| !b.is_empty())
    }
}

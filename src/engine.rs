// Match evaluation of one line against every registered filter
//
// DESIGN: Map then reduce. Each filter is tested independently and yields
// `Option<FilterId>`; the surviving ids are collected and sorted afterwards.
// Nothing is appended to shared state during the fan-out, so the parallel and
// sequential paths return identical output.

use crate::filter::{Filter, FilterId};
use crate::normalize::LineTokens;
use crate::registry::FilterRegistry;
use rayon::prelude::*;
use std::sync::Arc;

/// Snapshots with at least this many filters are evaluated on the rayon pool
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct MatchEngine {
    parallel_threshold: usize,
}

impl MatchEngine {
    /// `parallel_threshold` of 0 always fans out; `usize::MAX` never does.
    pub fn new(parallel_threshold: usize) -> Self {
        Self { parallel_threshold }
    }

    /// Identifiers of every filter in `registry` matching `tokens`, ascending.
    pub fn evaluate(&self, tokens: &LineTokens, registry: &FilterRegistry) -> Vec<FilterId> {
        let snapshot = registry.snapshot();
        self.evaluate_filters(tokens, &snapshot)
    }

    /// Evaluate against an explicit set of filters, in any order.
    pub fn evaluate_filters(&self, tokens: &LineTokens, filters: &[Arc<dyn Filter>]) -> Vec<FilterId> {
        let parallel = filters.len() >= self.parallel_threshold;

        let mut matched: Vec<FilterId> = if parallel {
            filters
                .par_iter()
                .filter_map(|filter| filter.matches(tokens).then(|| filter.id()))
                .collect()
        } else {
            filters
                .iter()
                .filter_map(|filter| filter.matches(tokens).then(|| filter.id()))
                .collect()
        };

        matched.sort_unstable();

        tracing::trace!(
            filters = filters.len(),
            parallel,
            matched = matched.len(),
            "Evaluated line"
        );
        matched
    }
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new(DEFAULT_PARALLEL_THRESHOLD)
    }
}

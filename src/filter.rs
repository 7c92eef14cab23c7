// Keyword filters tested against normalized log-line tokens
//
// DESIGN: Each matching strategy is its own type implementing the Filter
// trait. The registry and the engine only ever hold `Arc<dyn Filter>`;
// `create_filter` is the single place that maps a strategy to a type.

use crate::normalize::{LineTokens, term_tokens};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifier assigned to a filter at registration (1-based, never reused).
pub type FilterId = u64;

/// How a filter decides that a token set matches.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    /// Every term must be present in the line.
    #[default]
    All,
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStrategy::All => f.write_str("all"),
        }
    }
}

/// Common interface for all filter strategies.
///
/// Implementations are immutable after construction and are shared across
/// threads, so `matches` must not need any synchronization.
pub trait Filter: Send + Sync + fmt::Debug {
    fn id(&self) -> FilterId;

    /// Test the filter against the tokens of one log line.
    fn matches(&self, tokens: &LineTokens) -> bool;

    /// Normalized terms in definition order, duplicates included.
    fn terms(&self) -> &[String];

    fn strategy(&self) -> MatchStrategy;

    /// Terms rejoined with single spaces, as shown in acknowledgments.
    fn display_terms(&self) -> String {
        self.terms().join(" ")
    }
}

/// Matches when every term is present in the line.
#[derive(Debug, Clone)]
pub struct MatchAll {
    id: FilterId,
    terms: Vec<String>,
}

impl MatchAll {
    pub fn new(id: FilterId, terms: Vec<String>) -> Self {
        Self { id, terms }
    }

    /// Build from a raw, not yet normalized definition string
    pub fn from_definition(id: FilterId, definition: &str) -> Self {
        Self::new(id, term_tokens(definition))
    }
}

impl Filter for MatchAll {
    fn id(&self) -> FilterId {
        self.id
    }

    // `all` stops at the first missing term. A definition that normalized to
    // a single empty term never matches, since line tokens are never empty.
    fn matches(&self, tokens: &LineTokens) -> bool {
        self.terms.iter().all(|term| tokens.contains(term))
    }

    fn terms(&self) -> &[String] {
        &self.terms
    }

    fn strategy(&self) -> MatchStrategy {
        MatchStrategy::All
    }
}

/// Factory function to build a filter for the given strategy
pub fn create_filter(strategy: MatchStrategy, id: FilterId, terms: Vec<String>) -> Arc<dyn Filter> {
    match strategy {
        MatchStrategy::All => Arc::new(MatchAll::new(id, terms)),
    }
}

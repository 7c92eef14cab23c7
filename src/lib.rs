//! streamfilter - keyword filters over a stream of log lines.
//!
//! Lines are either filter definitions (`QF:<terms>`) or log lines to check
//! (`LOL:<line>`). [`CommandRouter::process`] is the single entry point; it
//! registers filters, evaluates lines against every registered filter and
//! formats the response.
//!
//! ```text
//! line ──► CommandRouter ──► FilterRegistry.register ──► "A:<terms>; FID=<id>"
//!                 │
//!                 └──► line_tokens ──► MatchEngine.evaluate ──► "M:<line>; FID=<ids>"
//! ```
//!
//! The core (`normalize`, `filter`, `registry`, `engine`, `router`) is
//! synchronous and shared across threads. `config`, `logging`, `source`
//! and `sinks` make up the command-line driver.

pub mod config;
pub mod engine;
pub mod filter;
pub mod logging;
pub mod normalize;
pub mod registry;
pub mod router;
pub mod sinks;
pub mod source;

pub use config::{Config, OutputFormat};
pub use engine::MatchEngine;
pub use filter::{Filter, FilterId, MatchAll, MatchStrategy};
pub use normalize::{LineTokens, line_tokens, term_tokens};
pub use registry::FilterRegistry;
pub use router::{Command, CommandRouter, MatchReport, Response};

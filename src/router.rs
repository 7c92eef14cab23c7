// Per-line entry point: classify, delegate, format
//
// Line protocol (default prefixes):
//   QF:<terms>   define a filter   -> A:<terms>; FID=<id>
//   LOL:<line>   evaluate a line   -> M:<line>; FID=<id>, <id>, ...  (nothing if no match)
//   anything else                  -> echoed back unchanged

use crate::config::{Config, ProtocolConfig};
use crate::engine::MatchEngine;
use crate::filter::FilterId;
use crate::normalize::line_tokens;
use crate::registry::FilterRegistry;
use serde::Serialize;
use std::fmt;

/// A classified input line, borrowing the text after the prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Define(&'a str),
    Evaluate(&'a str),
    Passthrough(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str, protocol: &ProtocolConfig) -> Self {
        if let Some(rest) = line.strip_prefix(protocol.define_prefix.as_str()) {
            Command::Define(rest)
        } else if let Some(rest) = line.strip_prefix(protocol.evaluate_prefix.as_str()) {
            Command::Evaluate(rest)
        } else {
            Command::Passthrough(line)
        }
    }
}

/// The filters matching one submitted line. Never built with an empty id list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchReport {
    /// Trimmed line as submitted, punctuation intact
    pub line: String,
    /// Matching identifiers, ascending
    pub fids: Vec<FilterId>,
}

impl MatchReport {
    pub fn new(line: String, fids: Vec<FilterId>) -> Option<Self> {
        if fids.is_empty() {
            return None;
        }
        Some(Self { line, fids })
    }
}

impl fmt::Display for MatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M:{}; FID=", self.line)?;
        for (i, fid) in self.fids.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{fid}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Response {
    Ack { fid: FilterId, terms: String },
    Match(MatchReport),
    Passthrough { line: String },
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ack { fid, terms } => write!(f, "A:{terms}; FID={fid}"),
            Response::Match(report) => report.fmt(f),
            Response::Passthrough { line } => f.write_str(line),
        }
    }
}

/// Shared by every caller feeding lines; safe to use from many threads at once.
pub struct CommandRouter {
    registry: FilterRegistry,
    engine: MatchEngine,
    protocol: ProtocolConfig,
}

impl CommandRouter {
    pub fn new(registry: FilterRegistry, engine: MatchEngine, protocol: ProtocolConfig) -> Self {
        Self {
            registry,
            engine,
            protocol,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            FilterRegistry::new(config.strategy),
            MatchEngine::new(config.parallel_threshold),
            config.protocol.clone(),
        )
    }

    /// Handle one line, returning its textual response if there is one.
    pub fn process(&self, line: &str) -> Option<String> {
        self.respond(line).map(|response| response.to_string())
    }

    /// Handle one line. `None` means the line produces no output at all.
    pub fn respond(&self, line: &str) -> Option<Response> {
        match Command::parse(line, &self.protocol) {
            Command::Define(definition) => Some(self.define(definition)),
            Command::Evaluate(raw) => self.evaluate(raw).map(Response::Match),
            Command::Passthrough(line) => Some(Response::Passthrough {
                line: line.to_string(),
            }),
        }
    }

    fn define(&self, definition: &str) -> Response {
        let filter = self.registry.register(definition);
        Response::Ack {
            fid: filter.id(),
            terms: filter.display_terms(),
        }
    }

    fn evaluate(&self, raw: &str) -> Option<MatchReport> {
        let line = raw.trim();
        let tokens = line_tokens(line);
        let fids = self.engine.evaluate(&tokens, &self.registry);

        tracing::debug!(line, matched = fids.len(), "Evaluated log line");
        MatchReport::new(line.to_string(), fids)
    }

    pub fn registry(&self) -> &FilterRegistry {
        &self.registry
    }

    pub fn protocol(&self) -> &ProtocolConfig {
        &self.protocol
    }
}

impl Default for CommandRouter {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

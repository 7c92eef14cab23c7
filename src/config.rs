use crate::engine::DEFAULT_PARALLEL_THRESHOLD;
use crate::filter::MatchStrategy;
use anyhow::{Context, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

// DESIGN CHOICE: Every field has a default
// An empty file (or no file at all) gives the standard QF:/LOL: protocol,
// match-all filters and text output on stdout.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Strategy used for every `QF:` definition
    pub strategy: MatchStrategy,

    /// Registry size at which evaluation fans out on the rayon pool
    pub parallel_threshold: usize,

    pub protocol: ProtocolConfig,
    pub output: OutputConfig,
    pub follow: FollowConfig,
    pub logging: LoggingConfig,
}

// Default: fan out once 64 filters are registered
impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: MatchStrategy::default(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            protocol: ProtocolConfig::default(),
            output: OutputConfig::default(),
            follow: FollowConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Command prefixes. The define prefix is checked first.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ProtocolConfig {
    pub define_prefix: String,
    pub evaluate_prefix: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            define_prefix: "QF:".to_string(),
            evaluate_prefix: "LOL:".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `A:...; FID=n` and `M:...; FID=...` lines
    #[default]
    Text,
    /// One JSON object per response
    Json,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Append responses to this file instead of writing to stdout
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FollowConfig {
    pub polling_frequency_ms: u64,
}

// Default: poll followed files twice a second
impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            polling_frequency_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// EnvFilter directive, e.g. `debug` or `streamfilter=trace`
    pub level: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let protocol = &self.protocol;
        if protocol.define_prefix.is_empty() || protocol.evaluate_prefix.is_empty() {
            bail!("Command prefixes must not be empty");
        }
        if protocol.define_prefix == protocol.evaluate_prefix {
            bail!(
                "Define and evaluate prefixes must differ (both are '{}')",
                protocol.define_prefix
            );
        }
        if self.follow.polling_frequency_ms == 0 {
            bail!("follow.polling_frequency_ms must be greater than 0");
        }
        Ok(())
    }
}

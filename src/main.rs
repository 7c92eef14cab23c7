use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use streamfilter::config::Config;
use streamfilter::filter::MatchStrategy;
use streamfilter::router::{CommandRouter, Response};
use streamfilter::{OutputFormat, logging, sinks, source};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Responses buffered between the sources and the writer task
const CHANNEL_CAPACITY: usize = 1024;

/// Define keyword filters and check log lines against them.
///
/// Reads `QF:<terms>` and `LOL:<line>` commands from the given files, or
/// from stdin when none are given, and prints one response per command.
#[derive(Debug, Parser)]
#[command(name = "streamfilter", version, about)]
struct Cli {
    /// Command files, each processed in order by its own task
    inputs: Vec<PathBuf>,

    /// YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run the built-in example script instead of reading input
    #[arg(long, conflicts_with = "inputs")]
    demo: bool,

    /// Keep polling input files for appended commands
    #[arg(short, long, requires = "inputs")]
    follow: bool,

    /// Output format (overrides config)
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Append responses to this file instead of stdout (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Strategy for new filters (overrides config)
    #[arg(long, value_enum)]
    strategy: Option<MatchStrategy>,

    /// Enable debug logging on stderr
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(format) = self.format {
            config.output.format = format;
        }
        if let Some(path) = &self.output {
            config.output.path = Some(path.clone());
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }

        config.validate()?;
        Ok(config)
    }
}

fn spawn_sources(
    cli: &Cli,
    config: &Config,
    router: &Arc<CommandRouter>,
    tx: &mpsc::Sender<Response>,
) -> JoinSet<Result<usize>> {
    let mut sources = JoinSet::new();

    if cli.demo {
        let lines = source::DEMO_SCRIPT.iter().map(|l| l.to_string()).collect();
        sources.spawn(source::feed_lines(lines, Arc::clone(router), tx.clone()));
    } else if cli.inputs.is_empty() {
        sources.spawn(source::feed_stdin(Arc::clone(router), tx.clone()));
    } else {
        let follow = cli
            .follow
            .then(|| Duration::from_millis(config.follow.polling_frequency_ms));
        for path in &cli.inputs {
            sources.spawn(source::feed_file(
                path.clone(),
                follow,
                Arc::clone(router),
                tx.clone(),
            ));
        }
    }

    sources
}

async fn wait_for_sources(sources: &mut JoinSet<Result<usize>>) -> Result<usize> {
    let mut total = 0;
    while let Some(joined) = sources.join_next().await {
        total += joined??;
    }
    Ok(total)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    logging::init(cli.debug, config.logging.level.as_deref())?;

    let router = Arc::new(CommandRouter::from_config(&config));

    tracing::info!(
        strategy = %router.registry().strategy(),
        parallel_threshold = config.parallel_threshold,
        define_prefix = %router.protocol().define_prefix,
        evaluate_prefix = %router.protocol().evaluate_prefix,
        "Starting streamfilter"
    );

    let sink = sinks::create_sink(&config.output)?;

    // tx = transmitter, one clone per source task
    // rx = receiver, owned by the single writer task
    let (tx, rx) = mpsc::channel::<Response>(CHANNEL_CAPACITY);
    let writer = tokio::spawn(sinks::drain(rx, sink));

    let mut sources = spawn_sources(&cli, &config, &router, &tx);
    drop(tx);

    let outcome = tokio::select! {
        result = wait_for_sources(&mut sources) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    if outcome.is_none() {
        tracing::info!("Interrupted, stopping sources");
    }

    // Aborts anything still running, which drops the last senders and
    // closes the channel
    sources.shutdown().await;

    let written = writer.await??;
    let lines = outcome.transpose()?.unwrap_or(0);

    tracing::info!(
        lines,
        responses = written,
        filters = router.registry().len(),
        "Finished"
    );
    Ok(())
}

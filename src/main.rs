//! CLI entry point for mediadl.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use mediadl_core::config::load_file_config;
use mediadl_core::http_client::build_http_client;
use mediadl_core::{
    BatchError, ConsoleNotifier, Downloader, ErrorKind, HttpClient, InfoJsonWriter, Notifier,
    PostProcessChain, SourceOpener, build_default_resolver_registry,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

/// Process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    Success,
    Failure,
    Usage,
    Interrupted,
}

impl ProcessExit {
    fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Usage => 2,
            Self::Interrupted => 130,
        }
    }

    fn from_batch_error(err: &BatchError) -> Self {
        match err.kind() {
            ErrorKind::Interrupted => Self::Interrupted,
            ErrorKind::AmbiguousDestination => Self::Usage,
            _ => Self::Failure,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    init_tracing(args.default_log_level());
    debug!(?args, "CLI arguments parsed");

    let exit = match run(args).await {
        Ok(exit) => exit,
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            ProcessExit::Usage
        }
    };
    ExitCode::from(exit.code())
}

fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

async fn run(args: Args) -> Result<ProcessExit> {
    let file_config = load_file_config(args.config.as_deref())?;
    let config = Arc::new(args.build_config(file_config.as_ref())?);
    let inputs = args.collect_inputs()?;
    if inputs.is_empty() {
        bail!("you must provide at least one URL\n  Suggestion: mediadl <URL>... or --batch-file FILE");
    }
    info!(inputs = inputs.len(), "mediadl starting");

    let resolver_client =
        build_http_client(&config.http, true).context("failed to build resolver HTTP client")?;
    let registry = build_default_resolver_registry(resolver_client);
    let opener: Arc<dyn SourceOpener> =
        Arc::new(HttpClient::new(&config.http).context("failed to build download HTTP client")?);

    let mut chain = PostProcessChain::new();
    if config.write_info_json {
        chain.add(Box::new(InfoJsonWriter::new()));
    }

    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier::new(config.quiet));
    let cancel = CancellationToken::new();
    spawn_interrupt_watcher(cancel.clone());

    let downloader = Downloader::new(config, registry, chain, opener, notifier)
        .with_cancellation(cancel);

    match downloader.download_all(&inputs).await {
        Ok(outcome) => {
            info!(
                succeeded = outcome.succeeded(),
                failed = outcome.failed(),
                skipped = outcome.skipped(),
                "mediadl finished"
            );
            Ok(if outcome.status() == 0 {
                ProcessExit::Success
            } else {
                ProcessExit::Failure
            })
        }
        Err(err) => {
            debug!(kind = ?err.kind(), "Batch aborted");
            Ok(ProcessExit::from_batch_error(&err))
        }
    }
}

fn spawn_interrupt_watcher(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping");
                cancel.cancel();
            }
            Err(err) => warn!(error = %err, "Unable to listen for Ctrl-C"),
        }
    });
}

//! Batch controller.
//!
//! Walks inputs in order, dispatches each to a resolver, then renders,
//! opens, transfers and post-processes every resolved item. Every problem
//! is reported through the [`Notifier`]; the `ignore_errors` policy decides
//! whether a per-item failure is absorbed or aborts the batch.

mod error;
mod outcome;

pub use error::{BatchError, ErrorKind};
pub use outcome::BatchOutcome;

use std::path::Path;
use std::sync::Arc;

use tokio::fs::OpenOptions;
use tokio::io::BufWriter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::download::{SourceOpener, Throttle, TransferEngine};
use crate::item::{DownloadedItem, ResolvedItem};
use crate::notify::Notifier;
use crate::postprocess::{PostProcessChain, ProcessContext};
use crate::resolver::{ResolveContext, ResolveError, ResolverRegistry};

/// Drives a batch of inputs through resolve, transfer and post-processing.
pub struct Downloader {
    config: Arc<Config>,
    registry: ResolverRegistry,
    chain: PostProcessChain,
    opener: Arc<dyn SourceOpener>,
    notifier: Arc<dyn Notifier>,
    engine: TransferEngine,
    cancel: CancellationToken,
}

impl Downloader {
    /// Creates a downloader; the transfer throttle follows `config.rate_limit`.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        registry: ResolverRegistry,
        chain: PostProcessChain,
        opener: Arc<dyn SourceOpener>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let engine = TransferEngine::new(Throttle::new(config.rate_limit));
        Self {
            config,
            registry,
            chain,
            opener,
            notifier,
            engine,
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the cancellation token observed during the run.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Processes every input in order.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::AmbiguousDestination`] or
    /// [`BatchError::Interrupted`] unconditionally, and the first per-item
    /// error when `ignore_errors` is off. Absorbed errors are counted in
    /// [`BatchOutcome::failed`].
    #[instrument(skip_all, fields(inputs = inputs.len()))]
    pub async fn download_all(&self, inputs: &[String]) -> Result<BatchOutcome, BatchError> {
        let template = &self.config.output_template;
        if inputs.len() > 1 && !template.has_placeholders() {
            return Err(self.report_fatal(BatchError::AmbiguousDestination {
                template: template.to_string(),
            }));
        }

        let mut outcome = BatchOutcome::default();
        for input in inputs {
            if self.cancel.is_cancelled() {
                return Err(self.report_fatal(BatchError::Interrupted));
            }
            self.process_input(input, &mut outcome).await?;
        }

        info!(
            succeeded = outcome.succeeded(),
            failed = outcome.failed(),
            skipped = outcome.skipped(),
            simulated = outcome.simulated(),
            "Batch finished"
        );
        Ok(outcome)
    }

    #[instrument(skip(self, outcome))]
    async fn process_input(
        &self,
        input: &str,
        outcome: &mut BatchOutcome,
    ) -> Result<(), BatchError> {
        let ctx = ResolveContext::new(&self.config, self.notifier.as_ref());
        let resolved = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(self.report_fatal(BatchError::Interrupted)),
            resolved = self.registry.dispatch(input, &ctx) => resolved,
        };
        let dispatched = match resolved {
            Ok(dispatched) => dispatched,
            Err(ResolveError::NoSuitableResolver { .. }) => {
                return self.apply_policy(
                    BatchError::NoSuitableResolver {
                        input: input.to_string(),
                    },
                    outcome,
                );
            }
            Err(err) => {
                return self.apply_policy(
                    BatchError::ExtractionFailure {
                        input: input.to_string(),
                        reason: err.to_string(),
                    },
                    outcome,
                );
            }
        };
        debug!(resolver = %dispatched.resolver, items = dispatched.items.len(), "Input resolved");

        let template = &self.config.output_template;
        let present = dispatched.items.iter().filter(|item| item.is_some()).count();
        if present > 1 && !template.has_placeholders() {
            return Err(self.report_fatal(BatchError::AmbiguousDestination {
                template: template.to_string(),
            }));
        }

        let absent = dispatched.items.len() - present;
        for _ in 0..absent {
            self.apply_policy(
                BatchError::ExtractionFailure {
                    input: input.to_string(),
                    reason: format!("{} could not extract an item", dispatched.resolver),
                },
                outcome,
            )?;
        }

        for item in dispatched.items.into_iter().flatten() {
            if self.cancel.is_cancelled() {
                return Err(self.report_fatal(BatchError::Interrupted));
            }
            self.process_item(item, outcome).await?;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(id = item.id()))]
    async fn process_item(
        &self,
        item: ResolvedItem,
        outcome: &mut BatchOutcome,
    ) -> Result<(), BatchError> {
        if self.config.force_title {
            self.notifier.forced(item.title());
        }
        if self.config.force_url {
            self.notifier.forced(item.url());
        }
        if self.config.simulate {
            outcome.record_simulated();
            return Ok(());
        }

        let path = match self.config.output_template.render(&item) {
            Ok(path) => path,
            Err(source) => return self.apply_policy(BatchError::InvalidTemplate { source }, outcome),
        };
        if self.config.no_overwrite && path.exists() {
            self.notifier
                .warning(&format!("{} has already been downloaded", path.display()));
            outcome.record_skipped();
            return Ok(());
        }

        if let Err(err) = self.fetch(&item, &path).await {
            return self.apply_policy(err, outcome);
        }

        let ctx = ProcessContext::new(&self.config, self.notifier.as_ref());
        match self.chain.run(DownloadedItem::new(item, &path), &ctx).await {
            Ok(_) => {
                outcome.record_success();
                Ok(())
            }
            Err(source) => self.apply_policy(
                BatchError::PostProcessingFailure {
                    path: path.clone(),
                    source,
                },
                outcome,
            ),
        }
    }

    /// Opens the destination and the remote source, then transfers.
    async fn fetch(&self, item: &ResolvedItem, path: &Path) -> Result<(), BatchError> {
        let unwritable = |source: std::io::Error| BatchError::DestinationUnwritable {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(unwritable)?;
        }
        let mut options = OpenOptions::new();
        options.write(true);
        if self.config.no_overwrite {
            options.create_new(true);
        } else {
            options.create(true).truncate(true);
        }
        let file = options.open(path).await.map_err(unwritable)?;
        let mut sink = BufWriter::new(file);

        self.notifier
            .to_screen(&format!("[download] Destination: {}", path.display()));
        let source = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(BatchError::Interrupted),
            opened = self.opener.open(item.url()) => opened
                .map_err(|err| BatchError::from_transfer(err, item.url(), path))?,
        };

        let report = self
            .engine
            .transfer(source, &mut sink, self.notifier.as_ref(), &self.cancel)
            .await
            .map_err(|err| BatchError::from_transfer(err, item.url(), path))?;
        debug!(bytes = report.bytes, path = %path.display(), "Item downloaded");
        Ok(())
    }

    /// Reports `err`; absorbs it under `ignore_errors` unless it is fatal.
    fn apply_policy(&self, err: BatchError, outcome: &mut BatchOutcome) -> Result<(), BatchError> {
        if err.is_fatal() {
            return Err(self.report_fatal(err));
        }
        self.notifier.error(&err.to_string());
        if self.config.ignore_errors {
            warn!(kind = ?err.kind(), error = %err, "Absorbed per-item failure");
            outcome.record_failure();
            Ok(())
        } else {
            Err(err)
        }
    }

    fn report_fatal(&self, err: BatchError) -> BatchError {
        warn!(kind = ?err.kind(), "Aborting batch");
        self.notifier.error(&err.to_string());
        err
    }
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("registry", &self.registry)
            .field("chain", &self.chain)
            .field("throttle", &self.engine.throttle())
            .finish_non_exhaustive()
    }
}

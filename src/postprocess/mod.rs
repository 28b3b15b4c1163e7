//! Post-processing chain run after each successful transfer.
//!
//! Processors run in registration order. Each receives the item produced by
//! the previous one; returning `Ok(None)` halts the chain for that item
//! without it counting as a failure.

mod info_json;

pub use info_json::{InfoJsonWriter, info_json_path};

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::item::DownloadedItem;
use crate::notify::Notifier;

/// Errors produced by post-processors.
#[derive(Debug, Error)]
pub enum PostProcessError {
    /// I/O error while writing processor output.
    #[error("{processor}: I/O error on {path}: {source}")]
    Io {
        /// Processor name.
        processor: String,
        /// File being written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error.
    #[error("{processor}: JSON serialization error: {source}")]
    Serialize {
        /// Processor name.
        processor: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// Any other processor-specific failure.
    #[error("{processor}: {reason}")]
    Failed {
        /// Processor name.
        processor: String,
        /// What went wrong.
        reason: String,
    },
}

/// Context handed to every processor.
#[derive(Clone, Copy)]
pub struct ProcessContext<'a> {
    /// Run configuration.
    pub config: &'a Config,
    /// Channel for user-facing output.
    pub notifier: &'a dyn Notifier,
}

impl<'a> ProcessContext<'a> {
    /// Creates a context.
    #[must_use]
    pub fn new(config: &'a Config, notifier: &'a dyn Notifier) -> Self {
        Self { config, notifier }
    }
}

impl std::fmt::Debug for ProcessContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessContext").finish_non_exhaustive()
    }
}

/// A step applied to downloaded items.
#[async_trait]
pub trait PostProcessor: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Processes `item`; `Ok(None)` stops the chain for this item.
    async fn run(
        &self,
        item: DownloadedItem,
        ctx: &ProcessContext<'_>,
    ) -> Result<Option<DownloadedItem>, PostProcessError>;
}

/// Ordered list of post-processors.
#[derive(Default)]
pub struct PostProcessChain {
    processors: Vec<Box<dyn PostProcessor>>,
}

impl PostProcessChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a processor.
    pub fn add(&mut self, processor: Box<dyn PostProcessor>) {
        debug!(name = processor.name(), "Adding post-processor");
        self.processors.push(processor);
    }

    /// Number of processors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// True when no processor is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Feeds `item` through every processor in order.
    ///
    /// Returns `Ok(None)` when a processor halted the chain.
    ///
    /// # Errors
    ///
    /// Returns the first processor error; later processors do not run.
    #[instrument(skip_all, fields(path = %item.filepath.display()))]
    pub async fn run(
        &self,
        item: DownloadedItem,
        ctx: &ProcessContext<'_>,
    ) -> Result<Option<DownloadedItem>, PostProcessError> {
        let mut current = item;
        for processor in &self.processors {
            match processor.run(current, ctx).await? {
                Some(next) => current = next,
                None => {
                    debug!(processor = processor.name(), "Chain halted");
                    return Ok(None);
                }
            }
        }
        Ok(Some(current))
    }
}

impl std::fmt::Debug for PostProcessChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.processors.iter().map(|p| p.name()).collect();
        f.debug_struct("PostProcessChain")
            .field("processors", &names)
            .finish()
    }
}

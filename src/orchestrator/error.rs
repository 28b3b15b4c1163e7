//! Batch-level errors and their classification.

use std::path::PathBuf;

use thiserror::Error;

use crate::download::{TemplateError, TransferError, length_mismatch};
use crate::postprocess::PostProcessError;

/// Classification of a [`BatchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No resolver claims an input.
    NoSuitableResolver,
    /// A fixed output name would receive more than one item.
    AmbiguousDestination,
    /// A resolver failed to extract an input or one of its items.
    ExtractionFailure,
    /// The destination file or its directories could not be created.
    DestinationUnwritable,
    /// Fetching or writing media bytes failed.
    TransferFailure,
    /// The origin sent fewer or more bytes than it announced.
    ContentLengthMismatch,
    /// A post-processor failed.
    PostProcessingFailure,
    /// The output template could not be rendered.
    InvalidTemplate,
    /// The run was cancelled by the user.
    Interrupted,
}

/// Errors surfaced by the batch controller.
#[derive(Debug, Error)]
pub enum BatchError {
    /// No resolver claims the input.
    #[error(
        "no suitable resolver for '{input}'\n  Suggestion: Check the URL; only http(s) URLs and supported sites are accepted"
    )]
    NoSuitableResolver {
        /// The unclaimed input.
        input: String,
    },

    /// Fixed output template with more than one item to download.
    #[error(
        "fixed output name '{template}' but more than one file to download\n  Suggestion: Add a placeholder such as %(id)s to the output template"
    )]
    AmbiguousDestination {
        /// The fixed template.
        template: String,
    },

    /// Extraction failed for an input or one of its items.
    #[error("extraction failed for '{input}': {reason}")]
    ExtractionFailure {
        /// The input being resolved.
        input: String,
        /// Why extraction failed.
        reason: String,
    },

    /// Destination could not be opened for writing.
    #[error("unable to open {path} for writing: {source}")]
    DestinationUnwritable {
        /// Destination path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Transfer failed.
    #[error("unable to download {url}: {source}")]
    TransferFailure {
        /// Media URL.
        url: String,
        /// Underlying transfer error.
        #[source]
        source: TransferError,
    },

    /// Received length differs from the announced length.
    #[error(
        "content too {} for {path}: {actual}/{expected} bytes",
        length_mismatch(.expected, .actual)
    )]
    ContentLengthMismatch {
        /// Destination path (partial file is kept).
        path: PathBuf,
        /// Announced length.
        expected: u64,
        /// Bytes received.
        actual: u64,
    },

    /// A post-processor failed.
    #[error("post-processing failed for {path}: {source}")]
    PostProcessingFailure {
        /// Downloaded file.
        path: PathBuf,
        /// Processor error.
        #[source]
        source: PostProcessError,
    },

    /// Output template could not be rendered for an item.
    #[error("invalid output template: {source}")]
    InvalidTemplate {
        /// Rendering error.
        #[source]
        source: TemplateError,
    },

    /// The user interrupted the run.
    #[error("interrupted by user")]
    Interrupted,
}

impl BatchError {
    /// Returns the error classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSuitableResolver { .. } => ErrorKind::NoSuitableResolver,
            Self::AmbiguousDestination { .. } => ErrorKind::AmbiguousDestination,
            Self::ExtractionFailure { .. } => ErrorKind::ExtractionFailure,
            Self::DestinationUnwritable { .. } => ErrorKind::DestinationUnwritable,
            Self::TransferFailure { .. } => ErrorKind::TransferFailure,
            Self::ContentLengthMismatch { .. } => ErrorKind::ContentLengthMismatch,
            Self::PostProcessingFailure { .. } => ErrorKind::PostProcessingFailure,
            Self::InvalidTemplate { .. } => ErrorKind::InvalidTemplate,
            Self::Interrupted => ErrorKind::Interrupted,
        }
    }

    /// True for errors that abort the batch even with `ignore_errors`.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::AmbiguousDestination | ErrorKind::Interrupted)
    }

    /// Maps a transfer error for `url` written to `path`.
    #[must_use]
    pub fn from_transfer(error: TransferError, url: &str, path: &std::path::Path) -> Self {
        match error {
            TransferError::Interrupted => Self::Interrupted,
            TransferError::ContentLengthMismatch { expected, actual } => {
                Self::ContentLengthMismatch {
                    path: path.to_path_buf(),
                    expected,
                    actual,
                }
            }
            source => Self::TransferFailure {
                url: url.to_string(),
                source,
            },
        }
    }
}

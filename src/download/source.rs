//! Byte sources feeding the transfer engine.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use super::error::TransferError;

/// An open stream of media bytes plus the length the origin announced.
pub struct ByteSource {
    reader: Pin<Box<dyn AsyncRead + Send>>,
    content_length: Option<u64>,
}

impl ByteSource {
    /// Wraps any async reader.
    pub fn new(reader: impl AsyncRead + Send + 'static, content_length: Option<u64>) -> Self {
        Self {
            reader: Box::pin(reader),
            content_length,
        }
    }

    /// In-memory source announcing exactly its own length.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let len = bytes.len() as u64;
        Self::new(std::io::Cursor::new(bytes), Some(len))
    }

    /// Declared total length, if any.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub(crate) fn reader_mut(&mut self) -> &mut Pin<Box<dyn AsyncRead + Send>> {
        &mut self.reader
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteSource")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Opens a [`ByteSource`] for a resolved media URL.
#[async_trait]
pub trait SourceOpener: Send + Sync {
    /// Starts fetching `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] when the origin cannot be reached or refuses.
    async fn open(&self, url: &str) -> Result<ByteSource, TransferError>;
}

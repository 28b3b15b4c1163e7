//! Transfer engine streaming one item from a byte source into a sink.
//!
//! Each iteration fills a block of the current size, writes it, resizes the
//! next block from the measured read time, reports progress and consults the
//! throttle. The sink is flushed and shut down on every exit path, and the
//! received byte count is checked against the announced length.
//!
//! # Example
//!
//! ```no_run
//! use mediadl_core::download::{ByteSource, Throttle, TransferEngine};
//! use mediadl_core::notify::MemoryNotifier;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = TransferEngine::new(Throttle::disabled());
//! let mut sink = Vec::new();
//! let report = engine
//!     .transfer(
//!         ByteSource::from_bytes(b"media".to_vec()),
//!         &mut sink,
//!         &MemoryNotifier::new(),
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! assert_eq!(report.bytes, 5);
//! # Ok(())
//! # }
//! ```

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use super::error::TransferError;
use super::progress::{INITIAL_BLOCK_SIZE, ProgressUpdate, best_block_size};
use super::source::ByteSource;
use super::throttle::Throttle;
use crate::notify::Notifier;

/// Summary of a completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
    /// Bytes written to the sink.
    pub bytes: u64,
    /// Wall time from first read to end of stream.
    pub elapsed: Duration,
    /// Length the source announced, if any.
    pub content_length: Option<u64>,
}

/// Mutable state of one transfer.
#[derive(Debug)]
struct TransferSession {
    start: Instant,
    downloaded: u64,
    block_size: usize,
}

impl TransferSession {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            downloaded: 0,
            block_size: INITIAL_BLOCK_SIZE,
        }
    }

    fn snapshot(&self, total: Option<u64>) -> ProgressUpdate {
        ProgressUpdate {
            downloaded: self.downloaded,
            total,
            elapsed: self.start.elapsed(),
        }
    }
}

/// Streams resolved items to sinks under an optional rate cap.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferEngine {
    throttle: Throttle,
}

impl TransferEngine {
    /// Creates an engine using `throttle` for every transfer.
    #[must_use]
    pub fn new(throttle: Throttle) -> Self {
        Self { throttle }
    }

    /// Returns the configured throttle.
    #[must_use]
    pub fn throttle(&self) -> Throttle {
        self.throttle
    }

    /// Moves every byte of `source` into `sink`.
    ///
    /// # Errors
    ///
    /// - [`TransferError::Io`] when reading or writing fails
    /// - [`TransferError::ContentLengthMismatch`] when the byte count differs
    ///   from the announced length
    /// - [`TransferError::Interrupted`] when `cancel` fires
    #[instrument(skip_all, fields(content_length = ?source.content_length()))]
    pub async fn transfer<W>(
        &self,
        mut source: ByteSource,
        sink: &mut W,
        notifier: &dyn Notifier,
        cancel: &CancellationToken,
    ) -> Result<TransferReport, TransferError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let pumped = self.pump(&mut source, sink, notifier, cancel).await;
        notifier.progress_done();
        let closed = close_sink(sink).await;

        let report = pumped?;
        closed?;

        if let Some(expected) = report.content_length
            && expected != report.bytes
        {
            return Err(TransferError::ContentLengthMismatch {
                expected,
                actual: report.bytes,
            });
        }
        debug!(bytes = report.bytes, elapsed_ms = report.elapsed.as_millis(), "transfer complete");
        Ok(report)
    }

    async fn pump<W>(
        &self,
        source: &mut ByteSource,
        sink: &mut W,
        notifier: &dyn Notifier,
        cancel: &CancellationToken,
    ) -> Result<TransferReport, TransferError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let total = source.content_length();
        let mut session = TransferSession::new();
        let mut block = Vec::new();

        loop {
            notifier.progress(&session.snapshot(total));

            block.resize(session.block_size, 0);
            let before = Instant::now();
            let filled = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(TransferError::Interrupted),
                read = fill_block(source.reader_mut(), &mut block) => read?,
            };
            let read_time = before.elapsed();
            if filled == 0 {
                break;
            }

            sink.write_all(&block[..filled]).await?;
            session.downloaded += filled as u64;
            session.block_size = best_block_size(read_time, filled);
            trace!(
                filled,
                downloaded = session.downloaded,
                next_block = session.block_size,
                "block written"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(TransferError::Interrupted),
                () = self.throttle.wait(session.downloaded, session.start.elapsed()) => {}
            }
        }

        Ok(TransferReport {
            bytes: session.downloaded,
            elapsed: session.start.elapsed(),
            content_length: total,
        })
    }
}

/// Reads until `block` is full or the stream ends.
async fn fill_block<R>(reader: &mut R, block: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < block.len() {
        let n = reader.read(&mut block[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

async fn close_sink<W>(sink: &mut W) -> Result<(), TransferError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    sink.flush().await?;
    sink.shutdown().await?;
    Ok(())
}

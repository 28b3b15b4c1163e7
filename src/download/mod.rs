//! Byte transfer: sources, the streaming engine, rate math and throttling.
//!
//! # Features
//!
//! - Streaming transfers with adaptive block sizing
//! - Progress lines with percent, size, average speed and ETA
//! - Average-rate throttle checked on block boundaries
//! - Announced-length verification and sink close on every path
//! - Cooperative cancellation via `CancellationToken`
//! - Output filename templates

mod client;
mod engine;
mod error;
pub mod filename;
pub mod progress;
mod source;
mod throttle;

pub use client::HttpClient;
pub use engine::{TransferEngine, TransferReport};
pub use error::TransferError;
pub(crate) use error::length_mismatch;
pub use filename::{OutputTemplate, TemplateError};
pub use progress::ProgressUpdate;
pub use source::{ByteSource, SourceOpener};
pub use throttle::Throttle;

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, TransferError>` explicitly in function signatures.

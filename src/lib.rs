//! mediadl core library
//!
//! Resolves media URLs into downloadable items and streams them to disk
//! with progress reporting, rate limiting and a batch error policy.
//!
//! # Architecture
//!
//! - [`resolver`] - Resolver trait, dispatch registry and site resolvers
//! - [`download`] - Transfer engine, progress math, throttle, filename templates
//! - [`postprocess`] - Post-processing chain run after each transfer
//! - [`orchestrator`] - Batch controller applying the error policy
//! - [`notify`] - User-facing output channel
//! - [`config`] - Run configuration and the TOML config file
//! - [`auth`] - `.netrc` credentials

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod download;
pub mod http_client;
pub mod item;
pub mod notify;
pub mod orchestrator;
pub mod postprocess;
pub mod resolver;
pub mod user_agent;

// Re-export commonly used types
pub use config::{Config, ConfigError, Credentials, FileConfig, HttpSettings, RateLimit};
pub use download::{
    ByteSource, HttpClient, OutputTemplate, SourceOpener, TransferEngine, TransferError,
};
pub use item::{DownloadedItem, ResolvedItem};
pub use notify::{ConsoleNotifier, MemoryNotifier, Notifier};
pub use orchestrator::{BatchError, BatchOutcome, Downloader, ErrorKind};
pub use postprocess::{InfoJsonWriter, PostProcessChain, PostProcessor};
pub use resolver::{ResolverRegistry, build_default_resolver_registry};

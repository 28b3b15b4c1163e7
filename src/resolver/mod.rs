//! Resolution of user inputs into concrete downloadable items.
//!
//! # Architecture
//!
//! - [`Resolver`] - Async trait that individual resolvers implement
//! - [`ResolverRegistry`] - Ordered collection; the first suitable resolver wins
//! - [`ResolveContext`] - Configuration and notifier handed to every call
//! - [`YoutubePlaylistResolver`] - Playlist pages, delegating each video
//! - [`YoutubeResolver`] - Watch pages and bare video ids
//! - [`DirectResolver`] - Fallback for any plain `http(s)` URL
//!
//! # Example
//!
//! ```no_run
//! use mediadl_core::config::Config;
//! use mediadl_core::notify::MemoryNotifier;
//! use mediadl_core::resolver::{ResolveContext, build_default_resolver_registry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let registry = build_default_resolver_registry(reqwest::Client::new());
//! let notifier = MemoryNotifier::new();
//! let ctx = ResolveContext::new(&config, &notifier);
//! let dispatched = registry
//!     .dispatch("https://example.com/clip.mp4", &ctx)
//!     .await?;
//! println!("{} produced {} item(s)", dispatched.resolver, dispatched.items.len());
//! # Ok(())
//! # }
//! ```

mod direct;
mod error;
mod registry;
pub mod utils;
mod youtube;
mod youtube_playlist;

pub use direct::DirectResolver;
pub use error::ResolveError;
pub use registry::{Dispatched, ResolverRegistry};
pub use youtube::YoutubeResolver;
pub use youtube_playlist::YoutubePlaylistResolver;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::item::ResolvedItem;
use crate::notify::Notifier;

/// Builds the registry used by the CLI.
///
/// Order is deterministic: site-specific resolvers before the direct
/// fallback. The playlist resolver shares the registered `YoutubeResolver`.
#[must_use]
pub fn build_default_resolver_registry(client: reqwest::Client) -> ResolverRegistry {
    let youtube = Arc::new(YoutubeResolver::new(client.clone()));
    let mut registry = ResolverRegistry::new();
    registry.register(Arc::new(YoutubePlaylistResolver::new(
        client,
        Arc::clone(&youtube),
    )));
    registry.register(youtube);
    registry.register(Arc::new(DirectResolver::new()));
    registry
}

/// Context passed to resolvers during initialization and resolution.
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    /// Run configuration (format hint, credentials, netrc).
    pub config: &'a Config,
    /// Channel for user-facing status and problems.
    pub notifier: &'a dyn Notifier,
}

impl<'a> ResolveContext<'a> {
    /// Creates a context.
    #[must_use]
    pub fn new(config: &'a Config, notifier: &'a dyn Notifier) -> Self {
        Self { config, notifier }
    }
}

impl std::fmt::Debug for ResolveContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolveContext")
            .field("config", self.config)
            .finish_non_exhaustive()
    }
}

/// Trait that all resolvers must implement.
///
/// # Object Safety
///
/// This trait uses `async_trait` to support dynamic dispatch via
/// `Arc<dyn Resolver>`, which the registry and composing resolvers rely on.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Returns the resolver's name (e.g. "youtube", "direct").
    fn name(&self) -> &str;

    /// Returns true if this resolver claims the input. Pure; never does I/O.
    fn suitable(&self, input: &str) -> bool;

    /// One-time setup before the first `resolve` (login and similar).
    ///
    /// The registry runs this at most once per registered resolver and turns
    /// failures into warnings.
    async fn initialize(&self, _ctx: &ResolveContext<'_>) -> Result<(), ResolveError> {
        Ok(())
    }

    /// Extracts the items behind `input`.
    ///
    /// `None` entries stand for items that were expected but could not be
    /// extracted; a hard `Err` means nothing could be extracted at all.
    async fn resolve(
        &self,
        input: &str,
        ctx: &ResolveContext<'_>,
    ) -> Result<Vec<Option<ResolvedItem>>, ResolveError>;
}

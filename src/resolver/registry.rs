//! Resolver registry with first-match dispatch.
//!
//! The [`ResolverRegistry`] keeps resolvers in registration order. An input
//! goes to the first resolver whose `suitable` holds, and only that one: a
//! claiming resolver that fails or returns nothing is never followed by
//! another.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::item::ResolvedItem;

use super::{ResolveContext, ResolveError, Resolver};

/// Items produced for one input, tagged with the resolver that claimed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    /// Name of the claiming resolver.
    pub resolver: String,
    /// Extracted items; `None` marks an item that failed extraction.
    pub items: Vec<Option<ResolvedItem>>,
}

struct Registration {
    resolver: Arc<dyn Resolver>,
    initialized: OnceCell<()>,
}

/// An ordered collection of resolvers.
pub struct ResolverRegistry {
    resolvers: Vec<Registration>,
}

impl ResolverRegistry {
    /// Creates an empty resolver registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
        }
    }

    /// Appends a resolver; earlier registrations win.
    #[tracing::instrument(skip(self, resolver), fields(resolver_name))]
    pub fn register(&mut self, resolver: Arc<dyn Resolver>) {
        tracing::Span::current().record("resolver_name", resolver.name());
        debug!(
            name = resolver.name(),
            position = self.resolvers.len(),
            "Registering resolver"
        );
        self.resolvers.push(Registration {
            resolver,
            initialized: OnceCell::new(),
        });
    }

    /// Returns the number of registered resolvers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Returns true if no resolvers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Resolver names in dispatch order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.resolvers.iter().map(|r| r.resolver.name()).collect()
    }

    /// Returns the first resolver claiming `input`.
    #[must_use]
    pub fn find_handler(&self, input: &str) -> Option<&dyn Resolver> {
        self.find_registration(input).map(|r| r.resolver.as_ref())
    }

    fn find_registration(&self, input: &str) -> Option<&Registration> {
        self.resolvers.iter().find(|r| r.resolver.suitable(input))
    }

    /// Resolves `input` with the first suitable resolver.
    ///
    /// The resolver is initialized on first use; a failed initialization is
    /// reported as a warning and not retried.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NoSuitableResolver`] when nothing claims the
    /// input, or the claiming resolver's own error.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn dispatch(
        &self,
        input: &str,
        ctx: &ResolveContext<'_>,
    ) -> Result<Dispatched, ResolveError> {
        let Some(registration) = self.find_registration(input) else {
            debug!("No resolver claims input");
            return Err(ResolveError::no_suitable_resolver(input));
        };
        let resolver = registration.resolver.as_ref();

        registration
            .initialized
            .get_or_init(|| async {
                debug!(resolver = resolver.name(), "Initializing resolver");
                if let Err(err) = resolver.initialize(ctx).await {
                    warn!(resolver = resolver.name(), error = %err, "Resolver initialization failed");
                    ctx.notifier.warning(&err.to_string());
                }
            })
            .await;

        let items = resolver.resolve(input, ctx).await?;
        info!(
            resolver = resolver.name(),
            items = items.len(),
            absent = items.iter().filter(|i| i.is_none()).count(),
            "Resolution finished"
        );
        Ok(Dispatched {
            resolver: resolver.name().to_string(),
            items,
        })
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("resolver_count", &self.resolvers.len())
            .field("resolvers", &self.names())
            .finish()
    }
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

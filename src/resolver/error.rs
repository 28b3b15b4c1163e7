//! Error types for resolver operations.
//!
//! Messages follow the What/Why/Fix pattern used across the project.

use thiserror::Error;

/// Errors that can occur while turning an input into resolved items.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// No registered resolver claims the input.
    #[error(
        "no resolver found for input '{input}'\n  Suggestion: Check the URL; only http(s) URLs and supported sites are accepted"
    )]
    NoSuitableResolver {
        /// The unclaimed input.
        input: String,
    },

    /// The claiming resolver could not extract anything from the input.
    #[error("{resolver} failed to resolve '{input}': {reason}\n  Suggestion: {suggestion}")]
    ResolutionFailed {
        /// Resolver name.
        resolver: String,
        /// The input being resolved.
        input: String,
        /// Why extraction failed.
        reason: String,
        /// How to fix the issue.
        suggestion: String,
    },

    /// A network request made by the resolver failed.
    #[error("{resolver} could not fetch {url}: {reason}")]
    Network {
        /// Resolver name.
        resolver: String,
        /// Requested URL.
        url: String,
        /// Transport error description.
        reason: String,
    },

    /// One-time resolver setup (login, age confirmation) failed.
    #[error("{resolver} setup failed: {reason}")]
    InitializationFailed {
        /// Resolver name.
        resolver: String,
        /// Why setup failed.
        reason: String,
    },
}

impl ResolveError {
    /// Creates a `NoSuitableResolver` error.
    #[must_use]
    pub fn no_suitable_resolver(input: &str) -> Self {
        Self::NoSuitableResolver {
            input: input.to_string(),
        }
    }

    /// Creates a `ResolutionFailed` error.
    #[must_use]
    pub fn resolution_failed(resolver: &str, input: &str, reason: &str) -> Self {
        Self::ResolutionFailed {
            resolver: resolver.to_string(),
            input: input.to_string(),
            reason: reason.to_string(),
            suggestion: "Check the input and try again".to_string(),
        }
    }

    /// Creates a `Network` error from any displayable transport error.
    #[must_use]
    pub fn network(resolver: &str, url: &str, reason: impl std::fmt::Display) -> Self {
        Self::Network {
            resolver: resolver.to_string(),
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates an `InitializationFailed` error.
    #[must_use]
    pub fn initialization_failed(resolver: &str, reason: impl Into<String>) -> Self {
        Self::InitializationFailed {
            resolver: resolver.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_no_suitable_resolver_display() {
        let err = ResolveError::no_suitable_resolver("ftp://x");
        let msg = err.to_string();
        assert!(msg.contains("ftp://x"));
        assert!(msg.contains("Suggestion:"));
    }

    #[test]
    fn test_resolution_failed_display() {
        let err = ResolveError::resolution_failed("youtube", "abc", "unable to extract title");
        assert!(
            err.to_string()
                .starts_with("youtube failed to resolve 'abc': unable to extract title")
        );
    }

    #[test]
    fn test_initialization_failed_display() {
        let err = ResolveError::initialization_failed("youtube", "bad login");
        assert_eq!(err.to_string(), "youtube setup failed: bad login");
    }
}

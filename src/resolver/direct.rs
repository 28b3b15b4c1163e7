//! Direct URL resolver - fallback for plain media URLs.
//!
//! The [`DirectResolver`] accepts any `http`/`https` URL and describes it as a
//! single item without fetching anything: the last path segment supplies the
//! id, title and extension, the host supplies the uploader.

use async_trait::async_trait;
use url::Url;

use crate::item::ResolvedItem;

use super::{ResolveContext, ResolveError, Resolver};

/// Extension used when the URL path has none.
const DEFAULT_EXTENSION: &str = "bin";

/// A resolver that passes URLs through unchanged.
#[derive(Debug)]
pub struct DirectResolver;

impl DirectResolver {
    /// Creates a new `DirectResolver`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for DirectResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_http_url(input: &str) -> Option<Url> {
    let url = Url::parse(input.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

fn describe(url: &Url) -> ResolvedItem {
    let host = url.host_str().unwrap_or_default().to_string();
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            urlencoding::decode(segment).map_or_else(|_| segment.to_string(), |s| s.into_owned())
        });

    let Some(filename) = segment else {
        return ResolvedItem::new(host.clone(), url.as_str(), host.clone(), host, DEFAULT_EXTENSION);
    };
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            (stem.to_string(), ext.to_ascii_lowercase())
        }
        _ => (filename.clone(), DEFAULT_EXTENSION.to_string()),
    };

    ResolvedItem::new(
        path_safe(&stem),
        url.as_str(),
        host,
        filename,
        path_safe(&ext),
    )
}

/// Replaces path separators so a decoded segment stays a single file name.
fn path_safe(decoded: &str) -> String {
    decoded.replace(['/', '\\'], "_")
}

#[async_trait]
impl Resolver for DirectResolver {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn suitable(&self, input: &str) -> bool {
        parse_http_url(input).is_some()
    }

    #[tracing::instrument(skip(self, _ctx), fields(resolver = "direct"))]
    async fn resolve(
        &self,
        input: &str,
        _ctx: &ResolveContext<'_>,
    ) -> Result<Vec<Option<ResolvedItem>>, ResolveError> {
        let url = parse_http_url(input)
            .ok_or_else(|| ResolveError::resolution_failed(self.name(), input, "not an http(s) URL"))?;
        Ok(vec![Some(describe(&url))])
    }
}

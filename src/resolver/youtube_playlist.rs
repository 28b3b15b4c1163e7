//! YouTube playlist resolver.
//!
//! Fetches a `view_play_list` page once, collects the unique video ids in
//! page order and hands each one to the composed [`YoutubeResolver`].

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use crate::item::ResolvedItem;

use super::utils::compile_static_regex;
use super::{ResolveContext, ResolveError, Resolver, YoutubeResolver};

static PLAYLIST_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r"^(?:https?://)?(?:\w+\.)?youtube\.com/view_play_list\?(?:.+&)?p=([0-9A-Za-z_-]+)",
    )
});
static VIDEO_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"/watch\?v=([0-9A-Za-z_-]+)"));

/// Extracts the playlist id from a playlist URL.
#[must_use]
pub fn extract_playlist_id(input: &str) -> Option<&str> {
    PLAYLIST_URL_RE
        .captures(input.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Unique video ids linked from a playlist page, in page order.
#[must_use]
pub fn collect_video_ids(page: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    VIDEO_LINK_RE
        .captures_iter(page)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Resolver for playlist pages, delegating each entry to a video resolver.
pub struct YoutubePlaylistResolver {
    client: Client,
    youtube: Arc<YoutubeResolver>,
}

impl YoutubePlaylistResolver {
    /// Creates a playlist resolver sharing `youtube`'s base URL and session.
    #[must_use]
    pub fn new(client: Client, youtube: Arc<YoutubeResolver>) -> Self {
        Self { client, youtube }
    }
}

impl std::fmt::Debug for YoutubePlaylistResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoutubePlaylistResolver")
            .field("youtube", &self.youtube)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Resolver for YoutubePlaylistResolver {
    fn name(&self) -> &'static str {
        "youtube:playlist"
    }

    fn suitable(&self, input: &str) -> bool {
        extract_playlist_id(input).is_some()
    }

    async fn initialize(&self, ctx: &ResolveContext<'_>) -> Result<(), ResolveError> {
        self.youtube.initialize(ctx).await
    }

    #[instrument(skip(self, ctx), fields(resolver = "youtube:playlist"))]
    async fn resolve(
        &self,
        input: &str,
        ctx: &ResolveContext<'_>,
    ) -> Result<Vec<Option<ResolvedItem>>, ResolveError> {
        let playlist_id = extract_playlist_id(input)
            .ok_or_else(|| ResolveError::resolution_failed(self.name(), input, "invalid URL"))?;
        let page_url = format!("{}/view_play_list?p={playlist_id}", self.youtube.base_url());

        ctx.notifier
            .to_screen(&format!("[youtube] PL {playlist_id}: Downloading playlist page"));
        let response = self
            .client
            .get(&page_url)
            .send()
            .await
            .map_err(|e| ResolveError::network(self.name(), &page_url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::network(self.name(), &page_url, format!("HTTP {status}")));
        }
        let page = response
            .text()
            .await
            .map_err(|e| ResolveError::network(self.name(), &page_url, e))?;

        let video_ids = collect_video_ids(&page);
        debug!(count = video_ids.len(), "playlist entries found");
        if video_ids.is_empty() {
            return Err(ResolveError::resolution_failed(
                self.name(),
                input,
                "playlist page lists no videos",
            ));
        }

        let mut items = Vec::with_capacity(video_ids.len());
        for video_id in &video_ids {
            match self.youtube.resolve(video_id, ctx).await {
                Ok(resolved) => items.extend(resolved),
                Err(err) => {
                    warn!(video_id = %video_id, error = %err, "playlist entry failed");
                    ctx.notifier.error(&err.to_string());
                    items.push(None);
                }
            }
        }
        Ok(items)
    }
}

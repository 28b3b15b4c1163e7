//! YouTube resolver for watch URLs, `/v/` URLs and bare video ids.
//!
//! Resolution fetches the watch page once and scrapes the session token,
//! uploader and title from it. Initialization optionally logs in (explicit
//! credentials or the `youtube` netrc machine) and confirms age.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::auth::netrc_credentials;
use crate::config::Credentials;
use crate::item::ResolvedItem;

use super::utils::{compile_static_regex, encode_form, extract_capture, unescape_html};
use super::{ResolveContext, ResolveError, Resolver};

const DEFAULT_BASE_URL: &str = "http://www.youtube.com";
const NETRC_MACHINE: &str = "youtube";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

static VIDEO_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r"^(?:https?://)?(?:\w+\.)?youtube\.com/(?:v/|(?:watch(?:\.php)?)?\?(?:.+&)?v=)([0-9A-Za-z_-]+)",
    )
});
static BARE_ID_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"^[0-9A-Za-z_-]+$"));
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r#", "t": "([^"]+)""#));
static UPLOADER_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"More From: ([^<]*)<"));
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?im)<title>YouTube - ([^<]*)</title>"));
static LOGIN_FORM_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"(?i)<form[^>]* name="loginForm""#));

/// Extracts the video id from a watch URL, `/v/` URL or bare id.
#[must_use]
pub fn extract_video_id(input: &str) -> Option<&str> {
    let input = input.trim();
    if let Some(caps) = VIDEO_URL_RE.captures(input) {
        return caps.get(1).map(|m| m.as_str());
    }
    BARE_ID_RE.is_match(input).then_some(input)
}

/// File extension served for a format code.
#[must_use]
pub fn extension_for_format(format: Option<&str>) -> &'static str {
    match format {
        Some("13") => "3gp",
        Some("17" | "18" | "22") => "mp4",
        _ => "flv",
    }
}

/// Resolver for single YouTube videos.
pub struct YoutubeResolver {
    client: Client,
    base_url: String,
    session: OnceCell<Result<(), ResolveError>>,
}

impl YoutubeResolver {
    /// Creates a resolver talking to youtube.com.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    /// Creates a resolver with a custom base URL (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: OnceCell::new(),
        }
    }

    /// Base URL all requests go to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_page(&self, url: &str) -> Result<String, ResolveError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ResolveError::network(self.name(), url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::network(self.name(), url, format!("HTTP {status}")));
        }
        response
            .text()
            .await
            .map_err(|e| ResolveError::network(self.name(), url, e))
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<String, reqwest::Error> {
        self.client
            .post(url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(encode_form(form))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }

    fn credentials(&self, ctx: &ResolveContext<'_>) -> Result<Option<Credentials>, ResolveError> {
        if let Some(credentials) = &ctx.config.credentials {
            return Ok(Some(credentials.clone()));
        }
        if !ctx.config.use_netrc {
            return Ok(None);
        }
        netrc_credentials(NETRC_MACHINE).map(Some).map_err(|e| {
            ResolveError::initialization_failed(self.name(), format!("parsing .netrc: {e}"))
        })
    }

    #[instrument(level = "debug", skip_all, fields(resolver = "youtube"))]
    async fn log_in(&self, ctx: &ResolveContext<'_>) -> Result<(), ResolveError> {
        let Some(credentials) = self.credentials(ctx)? else {
            debug!("No credentials configured; skipping login");
            return Ok(());
        };

        ctx.notifier.to_screen("[youtube] Logging in");
        let login_url = format!("{}/login?next=/", self.base_url);
        let page = self
            .post_form(
                &login_url,
                &[
                    ("current_form", "loginForm"),
                    ("next", "/"),
                    ("action_login", "log In"),
                    ("username", &credentials.username),
                    ("password", &credentials.password),
                ],
            )
            .await
            .map_err(|e| {
                ResolveError::initialization_failed(self.name(), format!("unable to log in: {e}"))
            })?;
        if LOGIN_FORM_RE.is_match(&page) {
            return Err(ResolveError::initialization_failed(
                self.name(),
                "unable to log in: bad username or password",
            ));
        }

        ctx.notifier.to_screen("[youtube] Confirming age");
        let age_url = format!("{}/verify_age?next_url=/", self.base_url);
        self.post_form(&age_url, &[("next_url", "/"), ("action_confirm", "confirm")])
            .await
            .map_err(|e| {
                ResolveError::initialization_failed(
                    self.name(),
                    format!("unable to confirm age: {e}"),
                )
            })?;
        Ok(())
    }
}

impl std::fmt::Debug for YoutubeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoutubeResolver")
            .field("base_url", &self.base_url)
            .field("initialized", &self.session.initialized())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Resolver for YoutubeResolver {
    fn name(&self) -> &'static str {
        "youtube"
    }

    fn suitable(&self, input: &str) -> bool {
        extract_video_id(input).is_some()
    }

    /// Logs in once. Only the call that ran the login reports its failure,
    /// so resolvers sharing this session warn about it once.
    async fn initialize(&self, ctx: &ResolveContext<'_>) -> Result<(), ResolveError> {
        let mut ran_login = false;
        let outcome = self
            .session
            .get_or_init(|| {
                ran_login = true;
                self.log_in(ctx)
            })
            .await;
        if ran_login { outcome.clone() } else { Ok(()) }
    }

    #[instrument(skip(self, ctx), fields(resolver = "youtube"))]
    async fn resolve(
        &self,
        input: &str,
        ctx: &ResolveContext<'_>,
    ) -> Result<Vec<Option<ResolvedItem>>, ResolveError> {
        let video_id = extract_video_id(input)
            .ok_or_else(|| ResolveError::resolution_failed(self.name(), input, "invalid URL"))?;
        let format = ctx.config.format.as_deref();
        let fmt_suffix = format.map(|f| format!("&fmt={f}")).unwrap_or_default();

        let watch_url = format!("{}/watch?v={video_id}{fmt_suffix}", self.base_url);
        ctx.notifier
            .to_screen(&format!("[youtube] {video_id}: Downloading video webpage"));
        let page = self.fetch_page(&watch_url).await?;
        ctx.notifier
            .to_screen(&format!("[youtube] {video_id}: Extracting video information"));

        let Some(token) = extract_capture(&page, &TOKEN_RE) else {
            ctx.notifier.error("unable to extract \"t\" parameter");
            return Ok(vec![None]);
        };
        let media_url = format!(
            "{}/get_video?video_id={video_id}&t={token}{fmt_suffix}",
            self.base_url
        );
        ctx.notifier
            .to_screen(&format!("[youtube] {video_id}: URL: {media_url}"));

        let Some(uploader) = UPLOADER_RE
            .captures(&page)
            .and_then(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        else {
            ctx.notifier.error("unable to extract uploader nickname");
            return Ok(vec![None]);
        };

        let Some(title) = TITLE_RE
            .captures(&page)
            .and_then(|caps| caps.get(1).map(|m| unescape_html(m.as_str())))
        else {
            ctx.notifier.error("unable to extract video title");
            return Ok(vec![None]);
        };

        Ok(vec![Some(ResolvedItem::new(
            video_id,
            media_url,
            uploader,
            title,
            extension_for_format(format),
        ))])
    }
}

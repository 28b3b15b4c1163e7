//! Resolved media items.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Placeholder used when simplifying titles.
pub const TITLE_PLACEHOLDER: char = '_';

static NON_TITLE_CHARS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new("[^0-9A-Za-z]+").ok());

/// Derives a filesystem-safe title.
///
/// Every run of characters outside ASCII letters and digits becomes a single
/// `_`, and leading/trailing `_` are trimmed.
#[must_use]
pub fn simplify_title(title: &str) -> String {
    let replaced = match NON_TITLE_CHARS.as_ref() {
        Some(pattern) => pattern
            .replace_all(title, TITLE_PLACEHOLDER.to_string().as_str())
            .into_owned(),
        None => title
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c
                } else {
                    TITLE_PLACEHOLDER
                }
            })
            .collect(),
    };
    replaced.trim_matches(TITLE_PLACEHOLDER).to_string()
}

/// One concrete downloadable media unit produced by a resolver.
///
/// Fields are fixed at construction; the simplified title is always derived
/// from the literal title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedItem {
    id: String,
    url: String,
    uploader: String,
    title: String,
    stitle: String,
    ext: String,
}

impl ResolvedItem {
    /// Builds an item; `ext` may be given with or without a leading dot.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        uploader: impl Into<String>,
        title: impl Into<String>,
        ext: impl Into<String>,
    ) -> Self {
        let title = title.into();
        let ext = ext.into();
        Self {
            id: id.into(),
            url: url.into(),
            uploader: uploader.into(),
            stitle: simplify_title(&title),
            title,
            ext: ext.trim_start_matches('.').to_string(),
        }
    }

    /// Resolver-assigned identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fetchable media URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Uploader display name.
    #[must_use]
    pub fn uploader(&self) -> &str {
        &self.uploader
    }

    /// Literal title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Filesystem-safe title.
    #[must_use]
    pub fn stitle(&self) -> &str {
        &self.stitle
    }

    /// File extension without the dot.
    #[must_use]
    pub fn ext(&self) -> &str {
        &self.ext
    }

    /// Looks up a field by its template name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(&self.id),
            "url" => Some(&self.url),
            "uploader" => Some(&self.uploader),
            "title" => Some(&self.title),
            "stitle" => Some(&self.stitle),
            "ext" => Some(&self.ext),
            _ => None,
        }
    }
}

/// A resolved item after its bytes landed on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadedItem {
    /// Item metadata.
    #[serde(flatten)]
    pub item: ResolvedItem,
    /// Final file location.
    pub filepath: PathBuf,
}

impl DownloadedItem {
    /// Pairs an item with the file it was written to.
    #[must_use]
    pub fn new(item: ResolvedItem, filepath: impl Into<PathBuf>) -> Self {
        Self {
            item,
            filepath: filepath.into(),
        }
    }
}

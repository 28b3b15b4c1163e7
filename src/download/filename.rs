//! Output filename templates.
//!
//! A template is a path with `%(field)s` placeholders filled from a
//! [`ResolvedItem`]; `%%` renders a literal `%`. Substituted values are used
//! verbatim, so a `/` in a literal title creates a subdirectory. Use
//! `%(stitle)s` for a filesystem-safe name.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::item::ResolvedItem;

/// Template used when none is configured.
pub const DEFAULT_TEMPLATE: &str = "%(id)s.%(ext)s";

/// `--title` shortcut.
pub const STITLE_TEMPLATE: &str = "%(stitle)s-%(id)s.%(ext)s";

/// `--literal` shortcut.
pub const LITERAL_TEMPLATE: &str = "%(title)s-%(id)s.%(ext)s";

/// Errors raised while rendering a template.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// Placeholder names a field items do not have.
    #[error(
        "unknown template field '{name}' in '{template}'\n  Suggestion: use one of id, url, uploader, title, stitle, ext"
    )]
    UnknownPlaceholder {
        /// Template text.
        template: String,
        /// Unknown field name.
        name: String,
    },

    /// A `%` that does not start `%%` or a complete `%(name)s`.
    #[error("malformed placeholder at byte {position} in '{template}'")]
    Malformed {
        /// Template text.
        template: String,
        /// Byte offset of the offending `%`.
        position: usize,
    },

    /// Rendered name cannot be used as a path.
    #[error("rendered filename '{rendered}' is not a valid path")]
    InvalidPath {
        /// The rendered text.
        rendered: String,
    },
}

/// A validated-on-render output filename template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTemplate(String);

impl Default for OutputTemplate {
    fn default() -> Self {
        Self(DEFAULT_TEMPLATE.to_string())
    }
}

impl FromStr for OutputTemplate {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl fmt::Display for OutputTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl OutputTemplate {
    /// Wraps template text.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// Raw template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when at least one `%(...)s` placeholder appears.
    ///
    /// A template without placeholders names one fixed file, which cannot
    /// hold more than one item. `%%(id)s` is a literal, not a placeholder.
    /// A malformed template counts as templated so rendering reports it.
    #[must_use]
    pub fn has_placeholders(&self) -> bool {
        match self.tokens() {
            Ok(tokens) => tokens.iter().any(|token| matches!(token, Token::Field(_))),
            Err(_) => true,
        }
    }

    /// Renders the destination path for `item`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] for unknown fields, malformed placeholders
    /// and results that are empty or contain NUL.
    pub fn render(&self, item: &ResolvedItem) -> Result<PathBuf, TemplateError> {
        let mut out = String::with_capacity(self.0.len() + 32);
        for token in self.tokens()? {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Percent => out.push('%'),
                Token::Field(name) => {
                    let value = item.field(name).ok_or_else(|| {
                        TemplateError::UnknownPlaceholder {
                            template: self.0.clone(),
                            name: name.to_string(),
                        }
                    })?;
                    out.push_str(value);
                }
            }
        }

        if out.is_empty() || out.contains('\0') {
            return Err(TemplateError::InvalidPath { rendered: out });
        }
        Ok(PathBuf::from(out))
    }

    fn tokens(&self) -> Result<Vec<Token<'_>>, TemplateError> {
        let template = self.0.as_str();
        let mut tokens = Vec::new();
        let mut rest = template;
        let mut offset = 0;

        while let Some(pos) = rest.find('%') {
            if pos > 0 {
                tokens.push(Token::Literal(&rest[..pos]));
            }
            let position = offset + pos;
            let after = &rest[pos + 1..];
            let malformed = || TemplateError::Malformed {
                template: template.to_string(),
                position,
            };

            if let Some(tail) = after.strip_prefix('%') {
                tokens.push(Token::Percent);
                offset = position + 2;
                rest = tail;
                continue;
            }

            let inner = after.strip_prefix('(').ok_or_else(malformed)?;
            let close = inner.find(')').ok_or_else(malformed)?;
            let name = &inner[..close];
            let tail = inner[close + 1..].strip_prefix('s').ok_or_else(malformed)?;
            if name.is_empty() {
                return Err(malformed());
            }
            tokens.push(Token::Field(name));

            // '%' + '(' + name + ')' + 's'
            offset = position + name.len() + 4;
            rest = tail;
        }
        if !rest.is_empty() {
            tokens.push(Token::Literal(rest));
        }
        Ok(tokens)
    }
}

enum Token<'a> {
    Literal(&'a str),
    Percent,
    Field(&'a str),
}

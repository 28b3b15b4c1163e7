//! Process-wide configuration.
//!
//! [`Config`] is built once at startup (CLI flags merged over an optional
//! TOML file) and then shared read-only as `Arc<Config>` with the resolvers,
//! the transfer engine and the post-processors.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::download::OutputTemplate;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large media files).
pub const READ_TIMEOUT_SECS: u64 = 300;

static RATE_LIMIT_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)([bkmgtpezyBKMGTPEZY]?)$").ok());

/// Errors raised while building or loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Rate limit is negative, NaN or infinite.
    #[error("invalid rate limit {value}: must be a non-negative finite number of bytes per second")]
    InvalidRateLimit {
        /// The rejected value.
        value: f64,
    },

    /// Rate limit string could not be parsed.
    #[error("invalid rate limit '{input}'\n  Suggestion: use a byte count with an optional suffix, e.g. 50k or 4.2M")]
    UnparsableRateLimit {
        /// The rejected input.
        input: String,
    },

    /// A timeout value is outside its accepted range.
    #[error("invalid config value for `{field}`: {value}. Expected range: 1..=3600")]
    InvalidTimeout {
        /// Config key.
        field: &'static str,
        /// The rejected value.
        value: u64,
    },

    /// Config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the expected keys.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
}

/// A transfer-rate cap in bytes per second.
///
/// Construction guarantees the value is finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct RateLimit(f64);

impl RateLimit {
    /// Validates and wraps a bytes-per-second cap.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRateLimit`] for negative or non-finite values.
    pub fn new(bytes_per_second: f64) -> Result<Self, ConfigError> {
        if !bytes_per_second.is_finite() || bytes_per_second < 0.0 {
            return Err(ConfigError::InvalidRateLimit {
                value: bytes_per_second,
            });
        }
        Ok(Self(bytes_per_second))
    }

    /// Returns the cap in bytes per second.
    #[must_use]
    pub fn bytes_per_second(self) -> f64 {
        self.0
    }
}

impl FromStr for RateLimit {
    type Err = ConfigError;

    /// Parses `50k`, `4.2M`, `1024` and similar (base-1024 suffixes).
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let unparsable = || ConfigError::UnparsableRateLimit {
            input: input.to_string(),
        };
        let pattern = RATE_LIMIT_PATTERN.as_ref().ok_or_else(unparsable)?;
        let caps = pattern.captures(input.trim()).ok_or_else(unparsable)?;
        let number: f64 = caps[1].parse().map_err(|_| unparsable())?;
        let suffix = caps[2].to_ascii_lowercase();
        let exponent = match suffix.as_str() {
            "" | "b" => 0,
            "k" => 1,
            "m" => 2,
            "g" => 3,
            "t" => 4,
            "p" => 5,
            "e" => 6,
            "z" => 7,
            _ => 8,
        };
        Self::new(number * 1024f64.powi(exponent))
    }
}

/// Account credentials handed to resolvers that support logging in.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// HTTP transport settings shared by every client the process builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// Proxy URL applied to all schemes.
    pub proxy: Option<String>,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub read_timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            proxy: None,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            user_agent: crate::user_agent::default_user_agent(),
        }
    }
}

/// Immutable run configuration.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct Config {
    /// Suppress status and progress output.
    pub quiet: bool,
    /// Resolve only; never touch the filesystem.
    pub simulate: bool,
    /// Print each resolved media URL.
    pub force_url: bool,
    /// Print each resolved title.
    pub force_title: bool,
    /// Destination filename template.
    pub output_template: OutputTemplate,
    /// Keep going after a per-item failure.
    pub ignore_errors: bool,
    /// Optional transfer-rate cap.
    pub rate_limit: Option<RateLimit>,
    /// Skip items whose destination already exists.
    pub no_overwrite: bool,
    /// Resolver-specific format hint.
    pub format: Option<String>,
    /// Explicit account credentials.
    pub credentials: Option<Credentials>,
    /// Look up credentials in `.netrc` when none are given.
    pub use_netrc: bool,
    /// Write an `.info.json` sidecar next to each download.
    pub write_info_json: bool,
    /// HTTP transport settings.
    pub http: HttpSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quiet: false,
            simulate: false,
            force_url: false,
            force_title: false,
            output_template: OutputTemplate::default(),
            ignore_errors: false,
            rate_limit: None,
            no_overwrite: false,
            format: None,
            credentials: None,
            use_netrc: false,
            write_info_json: false,
            http: HttpSettings::default(),
        }
    }
}

/// TOML-backed defaults, overridden by CLI flags.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Default output template.
    pub output_template: Option<String>,
    /// Default rate limit, e.g. `"50k"`.
    pub rate_limit: Option<String>,
    /// Continue after per-item failures.
    pub ignore_errors: Option<bool>,
    /// Never overwrite existing files.
    pub no_overwrite: Option<bool>,
    /// Default format hint.
    pub format: Option<String>,
    /// Read credentials from `.netrc`.
    pub use_netrc: Option<bool>,
    /// Proxy URL.
    pub proxy: Option<String>,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// Write `.info.json` next to each download.
    pub write_info_json: Option<bool>,
}

impl FileConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for syntax errors or unknown keys, and
    /// the validation errors of [`FileConfig::validate`].
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let parsed: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Checks values against the same constraints the CLI enforces.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(rate_limit) = &self.rate_limit {
            rate_limit.parse::<RateLimit>()?;
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &'static str, value: Option<u64>) -> Result<(), ConfigError> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        return Err(ConfigError::InvalidTimeout { field, value });
    }
    Ok(())
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/mediadl/config.toml`
/// 2. `$HOME/.config/mediadl/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("mediadl")
                .join("config.toml"),
        );
    }
    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("mediadl")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads a config file.
///
/// An explicit path must exist; the default path is optional and yields
/// `Ok(None)` when absent.
///
/// # Errors
///
/// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
pub fn load_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match resolve_default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(None),
        },
    };
    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    FileConfig::from_toml_str(&raw, &path).map(Some)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_rejects_negative_and_non_finite() {
        assert!(RateLimit::new(-1.0).is_err());
        assert!(RateLimit::new(f64::NAN).is_err());
        assert!(RateLimit::new(f64::INFINITY).is_err());
        assert!(RateLimit::new(0.0).is_ok());
    }

    #[test]
    fn test_rate_limit_parses_suffixes() {
        assert_eq!("1024".parse::<RateLimit>().unwrap().bytes_per_second(), 1024.0);
        assert_eq!("50k".parse::<RateLimit>().unwrap().bytes_per_second(), 51_200.0);
        assert_eq!("50K".parse::<RateLimit>().unwrap().bytes_per_second(), 51_200.0);
        assert_eq!(
            "1.5M".parse::<RateLimit>().unwrap().bytes_per_second(),
            1.5 * 1024.0 * 1024.0
        );
    }

    #[test]
    fn test_rate_limit_rejects_garbage() {
        let err = "fast".parse::<RateLimit>().unwrap_err();
        assert!(err.to_string().contains("fast"));
        assert!("-5k".parse::<RateLimit>().is_err());
        assert!("5kb".parse::<RateLimit>().is_err());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_config_default_values() {
        let config = Config::default();
        assert!(!config.quiet);
        assert!(!config.ignore_errors);
        assert!(config.rate_limit.is_none());
        assert_eq!(config.output_template.as_str(), "%(id)s.%(ext)s");
        assert_eq!(config.http.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_file_config_parses_known_keys() {
        let raw = r#"
            output_template = "%(title)s.%(ext)s"
            rate_limit = "100k"
            ignore_errors = true
            connect_timeout_secs = 10
        "#;
        let cfg = FileConfig::from_toml_str(raw, Path::new("config.toml")).unwrap();
        assert_eq!(cfg.output_template.as_deref(), Some("%(title)s.%(ext)s"));
        assert_eq!(cfg.rate_limit.as_deref(), Some("100k"));
        assert_eq!(cfg.ignore_errors, Some(true));
        assert_eq!(cfg.connect_timeout_secs, Some(10));
    }

    #[test]
    fn test_file_config_rejects_unknown_keys() {
        let err = FileConfig::from_toml_str("colour = true", Path::new("c.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_file_config_rejects_bad_values() {
        let err =
            FileConfig::from_toml_str("rate_limit = \"lots\"", Path::new("c.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::UnparsableRateLimit { .. }));

        let err = FileConfig::from_toml_str("read_timeout_secs = 0", Path::new("c.toml"))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidTimeout {
                field: "read_timeout_secs",
                value: 0
            }
        ));
    }

    #[test]
    fn test_load_file_config_explicit_missing_path_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            load_file_config(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_load_file_config_explicit_path_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "no_overwrite = true\n").unwrap();
        let cfg = load_file_config(Some(&path)).unwrap().unwrap();
        assert_eq!(cfg.no_overwrite, Some(true));
    }
}

//! CLI argument definitions using clap derive macros.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;

use mediadl_core::download::filename::{DEFAULT_TEMPLATE, LITERAL_TEMPLATE, STITLE_TEMPLATE};
use mediadl_core::{Config, Credentials, FileConfig, HttpSettings, OutputTemplate, RateLimit};

/// Download media from video sites and plain URLs.
///
/// Each URL is handed to the first resolver that recognizes it; the
/// resolved items are streamed to files named by the output template.
#[derive(Parser, Debug)]
#[command(name = "mediadl")]
#[command(author, version, about)]
pub struct Args {
    /// URLs (or bare video ids) to download
    pub urls: Vec<String>,

    /// File with one URL per line ('-' reads stdin; '#' and ';' start comments)
    #[arg(short = 'a', long, value_name = "FILE")]
    pub batch_file: Option<PathBuf>,

    /// Resolve only; do not download anything
    #[arg(short, long)]
    pub simulate: bool,

    /// Suppress status and progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the final media URL of each item
    #[arg(short = 'g', long)]
    pub get_url: bool,

    /// Print the title of each item
    #[arg(short = 'e', long)]
    pub get_title: bool,

    /// Continue with the next item after a failure
    #[arg(short, long)]
    pub ignore_errors: bool,

    /// Maximum download rate in bytes per second (e.g. 50k or 4.2M)
    #[arg(short, long, value_name = "LIMIT")]
    pub rate_limit: Option<String>,

    /// Do not overwrite existing files
    #[arg(short = 'w', long)]
    pub no_overwrites: bool,

    /// Video format code passed to the resolver
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Output filename template, e.g. "%(title)s-%(id)s.%(ext)s"
    #[arg(short, long, value_name = "TEMPLATE", conflicts_with_all = ["title", "literal"])]
    pub output: Option<String>,

    /// Use the simplified title in the file name
    #[arg(short, long, conflicts_with = "literal")]
    pub title: bool,

    /// Use the literal title in the file name
    #[arg(short, long)]
    pub literal: bool,

    /// Account username
    #[arg(short, long, requires = "password")]
    pub username: Option<String>,

    /// Account password
    #[arg(short, long, requires = "username")]
    pub password: Option<String>,

    /// Read credentials from .netrc
    #[arg(short, long)]
    pub netrc: bool,

    /// Proxy URL for all requests
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Write item metadata to a .info.json file next to each download
    #[arg(long)]
    pub write_info_json: bool,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Config file (defaults to $XDG_CONFIG_HOME/mediadl/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Log level used when `RUST_LOG` is unset.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "debug",
                _ => "trace",
            }
        }
    }

    /// Merges the flags over `file`; flags win.
    pub fn build_config(&self, file: Option<&FileConfig>) -> Result<Config> {
        let file = file.cloned().unwrap_or_default();

        let template = if let Some(output) = &self.output {
            output.clone()
        } else if self.title {
            STITLE_TEMPLATE.to_string()
        } else if self.literal {
            LITERAL_TEMPLATE.to_string()
        } else {
            file.output_template
                .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string())
        };

        let rate_limit = self
            .rate_limit
            .as_deref()
            .or(file.rate_limit.as_deref())
            .map(str::parse::<RateLimit>)
            .transpose()?;

        let credentials = match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            (None, None) => None,
            _ => bail!("--username and --password must be given together"),
        };

        let mut http = HttpSettings {
            proxy: self.proxy.clone().or(file.proxy),
            ..HttpSettings::default()
        };
        if let Some(secs) = file.connect_timeout_secs {
            http.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.read_timeout_secs {
            http.read_timeout = Duration::from_secs(secs);
        }

        Ok(Config {
            quiet: self.quiet,
            simulate: self.simulate,
            force_url: self.get_url,
            force_title: self.get_title,
            output_template: OutputTemplate::new(template),
            ignore_errors: self.ignore_errors || file.ignore_errors.unwrap_or(false),
            rate_limit,
            no_overwrite: self.no_overwrites || file.no_overwrite.unwrap_or(false),
            format: self.format.clone().or(file.format),
            credentials,
            use_netrc: self.netrc || file.use_netrc.unwrap_or(false),
            write_info_json: self.write_info_json || file.write_info_json.unwrap_or(false),
            http,
        })
    }

    /// Batch-file entries followed by positional URLs.
    pub fn collect_inputs(&self) -> Result<Vec<String>> {
        let mut inputs = Vec::new();
        if let Some(path) = &self.batch_file {
            let raw = read_batch_file(path)?;
            inputs.extend(parse_batch_lines(&raw));
        }
        inputs.extend(self.urls.iter().map(|url| url.trim().to_string()));
        Ok(inputs)
    }
}

fn read_batch_file(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read batch input from stdin")?;
        return Ok(buffer);
    }
    fs::read_to_string(path)
        .with_context(|| format!("failed to read batch file {}", path.display()))
}

/// Non-empty, non-comment lines of a batch file.
#[must_use]
pub fn parse_batch_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(['#', ';']))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["mediadl"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(args.urls.is_empty());
        assert_eq!(args.default_log_level(), "warn");
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["mediadl", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(args.default_log_level(), "trace");

        let args = Args::try_parse_from(["mediadl", "-v", "-q"]).unwrap();
        assert_eq!(args.default_log_level(), "error");
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["mediadl", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["mediadl", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_output_conflicts_with_title() {
        let err = Args::try_parse_from(["mediadl", "-o", "x.flv", "-t"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);

        let err = Args::try_parse_from(["mediadl", "-t", "-l"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_password_requires_username() {
        let err = Args::try_parse_from(["mediadl", "-p", "secret"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_build_config_template_shortcuts() {
        let args = Args::try_parse_from(["mediadl", "-t"]).unwrap();
        assert_eq!(args.build_config(None).unwrap().output_template.as_str(), STITLE_TEMPLATE);

        let args = Args::try_parse_from(["mediadl", "-l"]).unwrap();
        assert_eq!(args.build_config(None).unwrap().output_template.as_str(), LITERAL_TEMPLATE);

        let args = Args::try_parse_from(["mediadl"]).unwrap();
        assert_eq!(args.build_config(None).unwrap().output_template.as_str(), DEFAULT_TEMPLATE);
    }

    #[test]
    fn test_build_config_cli_wins_over_file() {
        let file = FileConfig {
            output_template: Some("%(title)s.%(ext)s".to_string()),
            rate_limit: Some("10k".to_string()),
            format: Some("18".to_string()),
            ignore_errors: Some(true),
            connect_timeout_secs: Some(5),
            ..FileConfig::default()
        };
        let args = Args::try_parse_from(["mediadl", "-o", "%(id)s", "-r", "1M"]).unwrap();
        let config = args.build_config(Some(&file)).unwrap();

        assert_eq!(config.output_template.as_str(), "%(id)s");
        assert!(
            (config.rate_limit.unwrap().bytes_per_second() - 1_048_576.0).abs() < f64::EPSILON
        );
        assert_eq!(config.format.as_deref(), Some("18"));
        assert!(config.ignore_errors);
        assert_eq!(config.http.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_build_config_rejects_bad_rate_limit() {
        let args = Args::try_parse_from(["mediadl", "-r", "fast"]).unwrap();
        assert!(args.build_config(None).is_err());
    }

    #[test]
    fn test_build_config_credentials() {
        let args = Args::try_parse_from(["mediadl", "-u", "alice", "-p", "pw", "-n"]).unwrap();
        let config = args.build_config(None).unwrap();
        let creds = config.credentials.unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "pw");
        assert!(config.use_netrc);
    }

    #[test]
    fn test_parse_batch_lines_skips_comments_and_blanks() {
        let raw = "http://a\n\n# comment\n; also comment\n  http://b  \n";
        assert_eq!(parse_batch_lines(raw), vec!["http://a", "http://b"]);
    }

    #[test]
    fn test_collect_inputs_batch_file_first() {
        let dir = tempfile::TempDir::new().unwrap();
        let batch = dir.path().join("urls.txt");
        fs::write(&batch, "http://from-file\n").unwrap();
        let args = Args::try_parse_from([
            "mediadl",
            "http://from-args",
            "-a",
            batch.to_str().unwrap(),
        ])
        .unwrap();
        assert_eq!(
            args.collect_inputs().unwrap(),
            vec!["http://from-file", "http://from-args"]
        );
    }
}

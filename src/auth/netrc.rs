//! `.netrc` parser.
//!
//! Supports the `machine`, `default`, `login`, `password`, `account` and
//! `macdef` tokens. Macro bodies are skipped up to the next blank line. A
//! machine that appears twice keeps its last entry.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::config::Credentials;

/// Errors raised while locating or parsing a netrc file.
#[derive(Debug, thiserror::Error)]
pub enum NetrcError {
    /// Neither `$NETRC` nor `$HOME` is set.
    #[error("cannot locate .netrc: neither NETRC nor HOME is set")]
    NoPath,

    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Netrc path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A token sequence is not valid netrc syntax.
    #[error("line {line_number}: {reason}")]
    Parse {
        /// 1-based line number.
        line_number: usize,
        /// What was wrong.
        reason: String,
    },

    /// The file has no entry usable for the machine.
    #[error("no authenticators for {machine}")]
    NoAuthenticators {
        /// Requested machine name.
        machine: String,
    },

    /// The matching entry lacks a login or password.
    #[error("entry for {machine} has no {missing}")]
    Incomplete {
        /// Requested machine name.
        machine: String,
        /// `login` or `password`.
        missing: &'static str,
    },
}

/// One `machine` (or `default`) entry.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct NetrcEntry {
    /// `login` value.
    pub login: Option<String>,
    /// `account` value.
    pub account: Option<String>,
    password: Option<String>,
}

impl NetrcEntry {
    /// Returns the password.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl fmt::Debug for NetrcEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetrcEntry")
            .field("login", &self.login)
            .field("account", &self.account)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// A parsed netrc file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Netrc {
    machines: HashMap<String, NetrcEntry>,
    default: Option<NetrcEntry>,
}

enum Target {
    Machine(String),
    Default,
}

impl Netrc {
    /// Parses netrc text.
    ///
    /// # Errors
    ///
    /// Returns [`NetrcError::Parse`] for a token outside an entry, an unknown
    /// token, or a keyword missing its value.
    #[instrument(level = "debug", skip(raw))]
    pub fn parse(raw: &str) -> Result<Self, NetrcError> {
        let mut netrc = Self::default();
        let mut current: Option<(Target, NetrcEntry)> = None;
        let mut in_macdef = false;

        for (idx, line) in raw.lines().enumerate() {
            let line_number = idx + 1;
            if in_macdef {
                if line.trim().is_empty() {
                    in_macdef = false;
                }
                continue;
            }
            if line.trim_start().starts_with('#') {
                continue;
            }

            let mut tokens = line.split_whitespace();
            while let Some(token) = tokens.next() {
                let mut value_for = |keyword: &str| {
                    tokens
                        .next()
                        .map(str::to_string)
                        .ok_or_else(|| NetrcError::Parse {
                            line_number,
                            reason: format!("'{keyword}' without a value"),
                        })
                };
                match token {
                    "machine" => {
                        let name = value_for("machine")?;
                        netrc.commit(current.take());
                        current = Some((Target::Machine(name), NetrcEntry::default()));
                    }
                    "default" => {
                        netrc.commit(current.take());
                        current = Some((Target::Default, NetrcEntry::default()));
                    }
                    "macdef" => {
                        value_for("macdef")?;
                        in_macdef = true;
                        break;
                    }
                    "login" | "password" | "account" => {
                        let value = value_for(token)?;
                        let Some((_, entry)) = current.as_mut() else {
                            return Err(NetrcError::Parse {
                                line_number,
                                reason: format!("'{token}' before any machine"),
                            });
                        };
                        match token {
                            "login" => entry.login = Some(value),
                            "password" => entry.password = Some(value),
                            _ => entry.account = Some(value),
                        }
                    }
                    other => {
                        return Err(NetrcError::Parse {
                            line_number,
                            reason: format!("bad token '{other}'"),
                        });
                    }
                }
            }
        }
        netrc.commit(current);
        debug!(machines = netrc.machines.len(), has_default = netrc.default.is_some(), "netrc parsed");
        Ok(netrc)
    }

    fn commit(&mut self, entry: Option<(Target, NetrcEntry)>) {
        match entry {
            Some((Target::Machine(name), entry)) => {
                self.machines.insert(name, entry);
            }
            Some((Target::Default, entry)) => self.default = Some(entry),
            None => {}
        }
    }

    /// Reads and parses a netrc file.
    ///
    /// # Errors
    ///
    /// Returns [`NetrcError::Io`] or [`NetrcError::Parse`].
    pub fn load(path: &Path) -> Result<Self, NetrcError> {
        let raw = std::fs::read_to_string(path).map_err(|source| NetrcError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    /// Entry for `machine`, falling back to `default`.
    #[must_use]
    pub fn authenticators(&self, machine: &str) -> Option<&NetrcEntry> {
        self.machines.get(machine).or(self.default.as_ref())
    }

    /// Login and password for `machine`.
    ///
    /// # Errors
    ///
    /// Returns [`NetrcError::NoAuthenticators`] or [`NetrcError::Incomplete`].
    pub fn credentials(&self, machine: &str) -> Result<Credentials, NetrcError> {
        let entry = self
            .authenticators(machine)
            .ok_or_else(|| NetrcError::NoAuthenticators {
                machine: machine.to_string(),
            })?;
        let username = entry.login.clone().ok_or_else(|| NetrcError::Incomplete {
            machine: machine.to_string(),
            missing: "login",
        })?;
        let password = entry.password.clone().ok_or_else(|| NetrcError::Incomplete {
            machine: machine.to_string(),
            missing: "password",
        })?;
        Ok(Credentials { username, password })
    }
}

/// Default netrc location: `$NETRC`, else `$HOME/.netrc`.
#[must_use]
pub fn default_netrc_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("NETRC").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }
    std::env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .map(|home| PathBuf::from(home).join(".netrc"))
}

/// Looks up credentials for `machine` in the default netrc file.
///
/// # Errors
///
/// Returns [`NetrcError`] when the file is missing, malformed or has no
/// usable entry.
pub fn netrc_credentials(machine: &str) -> Result<Credentials, NetrcError> {
    let path = default_netrc_path().ok_or(NetrcError::NoPath)?;
    Netrc::load(&path)?.credentials(machine)
}

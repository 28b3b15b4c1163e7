//! Credential sources for resolvers that log in.
//!
//! Explicit credentials come from [`Config`](crate::config::Config); this
//! module supplies the `.netrc` fallback.

mod netrc;

pub use netrc::{Netrc, NetrcEntry, NetrcError, default_netrc_path, netrc_credentials};

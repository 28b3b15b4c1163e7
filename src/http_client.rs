//! Shared HTTP client construction policy.
//!
//! Resolvers and the transfer layer build their clients here so timeouts,
//! user-agent, default headers, compression, proxy and cookie handling stay
//! consistent across all traffic.

use std::panic::{AssertUnwindSafe, catch_unwind};

use reqwest::header::{ACCEPT, ACCEPT_CHARSET, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder, Proxy};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::HttpSettings;

const DEFAULT_ACCEPT: &str = "text/xml,application/xml,application/xhtml+xml,text/html;q=0.9,text/plain;q=0.8,*/*;q=0.5";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-us,en;q=0.5";
const DEFAULT_ACCEPT_CHARSET: &str = "ISO-8859-1,utf-8;q=0.7,*;q=0.7";

/// Errors raised while building an HTTP client.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// Configured proxy URL was rejected.
    #[error("invalid proxy '{proxy}': {source}\n  Suggestion: use a URL such as http://host:3128")]
    InvalidProxy {
        /// The configured proxy.
        proxy: String,
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// Client builder failed.
    #[error("HTTP client construction failed: {0}")]
    Build(#[source] reqwest::Error),

    /// Client builder panicked even with the environment-proxy fallback.
    #[error("HTTP client construction panicked while loading proxy settings")]
    Panicked,
}

/// Builds a client from shared transport settings.
///
/// `cookies` enables an in-memory cookie store, used by resolvers that log in.
///
/// # Errors
///
/// Returns [`HttpClientError`] for an invalid proxy or a failed build.
pub fn build_http_client(settings: &HttpSettings, cookies: bool) -> Result<Client, HttpClientError> {
    let proxy = match settings.proxy.as_deref() {
        Some(raw) => Some(Proxy::all(raw).map_err(|source| HttpClientError::InvalidProxy {
            proxy: raw.to_string(),
            source,
        })?),
        None => None,
    };

    match try_build(settings, cookies, proxy.clone(), false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic when querying system proxy
            // settings; retry with environment variables only.
            warn!("HTTP client hit system proxy panic; using env-proxy fallback builder");
            match try_build(settings, cookies, proxy, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Build(error)) => Err(HttpClientError::Build(error)),
                Err(BuildClientFailure::Panic) => Err(HttpClientError::Panicked),
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(HttpClientError::Build(error)),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build(
    settings: &HttpSettings,
    cookies: bool,
    proxy: Option<Proxy>,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(settings, cookies);
        if let Some(proxy) = proxy {
            builder = builder.proxy(proxy);
        } else if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(settings: &HttpSettings, cookies: bool) -> ClientBuilder {
    debug!(
        connect_timeout_secs = settings.connect_timeout.as_secs(),
        read_timeout_secs = settings.read_timeout.as_secs(),
        proxy = settings.proxy.as_deref().unwrap_or("-"),
        cookies,
        "building HTTP client"
    );
    Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.read_timeout)
        .user_agent(settings.user_agent.clone())
        .default_headers(default_headers())
        .cookie_store(cookies)
        .gzip(true)
}

/// Request headers sent on every request.
#[must_use]
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE));
    headers.insert(ACCEPT_CHARSET, HeaderValue::from_static(DEFAULT_ACCEPT_CHARSET));
    headers
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    let names: &[&str] = match scheme {
        "https" => &["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"],
        "http" => &["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"],
        _ => return None,
    };
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_headers_present() {
        let headers = default_headers();
        assert!(headers.contains_key(ACCEPT));
        assert_eq!(headers[ACCEPT_LANGUAGE], "en-us,en;q=0.5");
        assert!(headers.contains_key(ACCEPT_CHARSET));
    }

    #[test]
    fn test_build_http_client_with_defaults() {
        assert!(build_http_client(&HttpSettings::default(), true).is_ok());
    }

    #[test]
    fn test_build_http_client_with_proxy() {
        let settings = HttpSettings {
            proxy: Some("http://127.0.0.1:3128".to_string()),
            ..HttpSettings::default()
        };
        assert!(build_http_client(&settings, false).is_ok());
    }

    #[test]
    fn test_build_http_client_rejects_bad_proxy() {
        let settings = HttpSettings {
            proxy: Some("not a url at all".to_string()),
            ..HttpSettings::default()
        };
        let err = build_http_client(&settings, false).unwrap_err();
        assert!(matches!(err, HttpClientError::InvalidProxy { .. }));
    }
}

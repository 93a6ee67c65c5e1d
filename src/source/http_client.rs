//! Shared HTTP client construction for source adapters.
//!
//! Keeps timeouts, user agent and compression consistent across the
//! language model, arXiv and Semantic Scholar clients.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Proxy};
use tracing::warn;

use super::ApiError;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default whole-request timeout in seconds.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/reference-renamer";

/// Timeouts applied to every source client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
        }
    }
}

/// User agent sent by every source client.
#[must_use]
pub fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("reference-renamer/{version} (research-tool; +{PROJECT_UA_URL})")
}

/// Builds the HTTP client used by one source adapter.
///
/// # Errors
///
/// Returns [`ApiError::Client`] when client construction fails.
pub fn build_source_http_client(
    service: &'static str,
    settings: &HttpSettings,
) -> Result<Client, ApiError> {
    match try_build_client(settings, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // System proxy lookup can panic in sandboxed environments; fall back
            // to env-only proxy configuration.
            warn!(
                service,
                "client hit system proxy panic; using env-proxy fallback builder"
            );
            try_build_client(settings, true).map_err(|failure| failure.into_api_error(service))
        }
        Err(failure) => Err(failure.into_api_error(service)),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

impl BuildClientFailure {
    fn into_api_error(self, service: &'static str) -> ApiError {
        let reason = match self {
            Self::Panic => "client construction panicked".to_string(),
            Self::Build(error) => error.to_string(),
        };
        ApiError::Client { service, reason }
    }
}

fn try_build_client(
    settings: &HttpSettings,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    let settings = *settings;
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(&settings);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(settings: &HttpSettings) -> ClientBuilder {
    Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.read_timeout)
        .user_agent(default_user_agent())
        .gzip(true)
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    for (scheme, names) in [
        ("https", ["HTTPS_PROXY", "https_proxy", "ALL_PROXY"]),
        ("http", ["HTTP_PROXY", "http_proxy", "ALL_PROXY"]),
    ] {
        let Some(proxy) = names.iter().find_map(|name| {
            std::env::var(name)
                .ok()
                .filter(|value| !value.trim().is_empty())
        }) else {
            continue;
        };
        let resolved = if scheme == "https" {
            Proxy::https(&proxy)
        } else {
            Proxy::http(&proxy)
        };
        if let Ok(resolved) = resolved {
            builder = builder.proxy(resolved);
        }
    }
    builder
}

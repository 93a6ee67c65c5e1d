//! Error types for remote metadata sources.

use thiserror::Error;

/// Errors raised by a source adapter while talking to its service.
///
/// Every variant carries the service name so log lines and the error log can
/// attribute the failure without extra context.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (DNS, connection refused, reset).
    #[error("{service} request failed: {source}")]
    Network {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Request did not complete within the configured timeout.
    #[error("{service} request timed out")]
    Timeout { service: &'static str },

    /// Service answered with a non-success status.
    #[error("{service} returned HTTP {status}")]
    HttpStatus { service: &'static str, status: u16 },

    /// Response body could not be interpreted.
    #[error("{service} response could not be parsed: {reason}")]
    Parse {
        service: &'static str,
        reason: String,
    },

    /// Request URL could not be constructed.
    #[error("{service} request URL is invalid: {reason}")]
    InvalidUrl {
        service: &'static str,
        reason: String,
    },

    /// HTTP client construction failed.
    #[error("{service} HTTP client could not be built: {reason}")]
    Client {
        service: &'static str,
        reason: String,
    },
}

impl ApiError {
    /// Maps a reqwest error, separating timeouts from other transport failures.
    #[must_use]
    pub fn from_reqwest(service: &'static str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { service }
        } else {
            Self::Network { service, source }
        }
    }

    #[must_use]
    pub fn http_status(service: &'static str, status: u16) -> Self {
        Self::HttpStatus { service, status }
    }

    #[must_use]
    pub fn parse(service: &'static str, reason: impl Into<String>) -> Self {
        Self::Parse {
            service,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn invalid_url(service: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            service,
            reason: reason.into(),
        }
    }

    /// Name of the service the error came from.
    #[must_use]
    pub fn service(&self) -> &'static str {
        match self {
            Self::Network { service, .. }
            | Self::Timeout { service }
            | Self::HttpStatus { service, .. }
            | Self::Parse { service, .. }
            | Self::InvalidUrl { service, .. }
            | Self::Client { service, .. } => service,
        }
    }

    /// HTTP status, when the service answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

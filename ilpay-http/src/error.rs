//! Error types for the HTTP clients.

use http::StatusCode;
use ilpay::quote::QuoteError;
use ilpay::wallet::WalletAddressError;
use url::Url;

/// Errors that can occur while talking to a wallet address server or the
/// quote service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// URL parse error.
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// HTTP transport error.
    #[error("HTTP error: {context}: {source}")]
    Http {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// The request did not complete within the configured timeout.
    #[error("timed out: {context}: {source}")]
    Timeout {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// JSON deserialization error.
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// Unexpected HTTP status code.
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        /// Human-readable context.
        context: &'static str,
        /// The HTTP status code.
        status: StatusCode,
        /// The response body.
        body: String,
    },
    /// Failed to read response body.
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// The response decoded but lacks a required value.
    #[error("missing {field}: {context}")]
    MissingField {
        /// Human-readable context.
        context: &'static str,
        /// Name of the missing field.
        field: &'static str,
    },
    /// A required setting is absent.
    #[error("not configured: {0}")]
    NotConfigured(&'static str),
}

impl ClientError {
    /// Wraps a reqwest send error, telling timeouts apart from other failures.
    pub(crate) fn transport(context: &'static str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { context, source }
        } else {
            Self::Http { context, source }
        }
    }

    /// Reports this failure as an unresolvable wallet address.
    #[must_use]
    pub fn into_wallet_error(self, url: Url) -> WalletAddressError {
        WalletAddressError::unresolvable(url, self)
    }
}

impl From<ClientError> for QuoteError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::HttpStatus { status, body, .. } => Self::Rejected {
                status: status.as_u16(),
                body,
            },
            ClientError::JsonDeserialization { .. } | ClientError::MissingField { .. } => {
                Self::Malformed {
                    reason: err.to_string(),
                }
            }
            ClientError::UrlParse { .. }
            | ClientError::Http { .. }
            | ClientError::Timeout { .. }
            | ClientError::ResponseBodyRead { .. }
            | ClientError::NotConfigured(_) => Self::unreachable(err),
        }
    }
}

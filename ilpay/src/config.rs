//! Negotiation settings.
//!
//! Values come from the process environment, after loading a `.env` file if
//! one is present. Unset variables fall back to the defaults below.
//!
//! # Environment Variables
//!
//! - `ILPAY_SESSION_LIFETIME_SECS`: session lifetime (default: 900)
//! - `ILPAY_DISCOVERY_TIMEOUT_SECS`: wallet address lookup timeout (default: 10)
//! - `ILPAY_QUOTE_TIMEOUT_SECS`: quote request timeout (default: 15)
//! - `ILPAY_QUOTE_SERVICE_URL`: base URL of the quote service

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};
use url::Url;

/// Default wall-clock lifetime of a session.
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(15 * 60);
/// Default timeout for one wallet address lookup.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);
/// Default timeout for one quote request.
pub const DEFAULT_QUOTE_TIMEOUT: Duration = Duration::from_secs(15);

const SESSION_LIFETIME_VAR: &str = "ILPAY_SESSION_LIFETIME_SECS";
const DISCOVERY_TIMEOUT_VAR: &str = "ILPAY_DISCOVERY_TIMEOUT_SECS";
const QUOTE_TIMEOUT_VAR: &str = "ILPAY_QUOTE_TIMEOUT_SECS";
const QUOTE_SERVICE_URL_VAR: &str = "ILPAY_QUOTE_SERVICE_URL";

/// Settings shared by the payment flow and its HTTP clients.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    /// How long a session stays usable after it is started.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub session_lifetime: Duration,

    /// Upper bound on a single wallet address lookup.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub discovery_timeout: Duration,

    /// Upper bound on a single quote request.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub quote_timeout: Duration,

    /// Base URL of the quote service, if one is configured.
    pub quote_service_url: Option<Url>,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            session_lifetime: DEFAULT_SESSION_LIFETIME,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            quote_timeout: DEFAULT_QUOTE_TIMEOUT,
            quote_service_url: None,
        }
    }
}

/// A configuration variable that could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Not a whole number of seconds.
    #[error("{var} must be a whole number of seconds, got {value:?}")]
    InvalidNumber {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
    /// Not an absolute URL.
    #[error("{var} is not a valid URL")]
    InvalidUrl {
        /// Variable name.
        var: &'static str,
        /// Parse failure.
        #[source]
        source: url::ParseError,
    },
}

impl NegotiationConfig {
    /// Reads the configuration from the environment, loading `.env` first.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is normal.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set but malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(lifetime) = seconds(&lookup, SESSION_LIFETIME_VAR)? {
            config.session_lifetime = lifetime;
        }
        if let Some(timeout) = seconds(&lookup, DISCOVERY_TIMEOUT_VAR)? {
            config.discovery_timeout = timeout;
        }
        if let Some(timeout) = seconds(&lookup, QUOTE_TIMEOUT_VAR)? {
            config.quote_timeout = timeout;
        }
        if let Some(raw) = present(&lookup, QUOTE_SERVICE_URL_VAR) {
            let url = Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl {
                var: QUOTE_SERVICE_URL_VAR,
                source,
            })?;
            config.quote_service_url = Some(url);
        }
        Ok(config)
    }
}

fn present<F>(lookup: &F, var: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn seconds<F>(lookup: &F, var: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    present(lookup, var)
        .map(|value| {
            value
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidNumber { var, value })
        })
        .transpose()
}

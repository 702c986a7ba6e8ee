//! A [`QuoteService`] that talks to a remote quote endpoint over HTTP.
//!
//! [`HttpQuoteClient`] posts a [`QuoteRequest`] as JSON to `./quotes` relative
//! to its base URL and decodes the [`Quote`] in the reply.
//!
//! ## Error Handling
//!
//! - non-2xx replies become [`QuoteError::Rejected`] with the status and body
//! - undecodable replies become [`QuoteError::Malformed`]
//! - transport failures and timeouts become [`QuoteError::Unreachable`]

use std::time::Duration;

use http::HeaderMap;
use ilpay::config::{DEFAULT_QUOTE_TIMEOUT, NegotiationConfig};
use ilpay::quote::{Quote, QuoteError, QuoteRequest, QuoteService};
use reqwest::Client;
use url::Url;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::constants::QUOTES_PATH;
use crate::error::ClientError;
use crate::transport::JsonTransport;

/// A client for a remote quote service.
#[derive(Clone, Debug)]
pub struct HttpQuoteClient {
    /// Base URL of the service (e.g. `https://quotes.example/`)
    base_url: Url,
    /// Full URL to `POST /quotes` requests
    quotes_url: Url,
    transport: JsonTransport,
}

impl HttpQuoteClient {
    /// Constructs a client from a base URL, with the default quote timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the quotes URL cannot be derived.
    pub fn try_new(base_url: Url) -> Result<Self, ClientError> {
        let quotes_url = base_url
            .join(QUOTES_PATH)
            .map_err(|e| ClientError::UrlParse {
                context: "Failed to construct ./quotes URL",
                source: e,
            })?;
        Ok(Self {
            base_url,
            quotes_url,
            transport: JsonTransport::new(Client::new(), Some(DEFAULT_QUOTE_TIMEOUT)),
        })
    }

    /// Constructs a client from the configured quote service URL and timeout.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotConfigured`] if no quote service URL is set.
    pub fn from_config(config: &NegotiationConfig) -> Result<Self, ClientError> {
        let base_url = config
            .quote_service_url
            .as_ref()
            .ok_or(ClientError::NotConfigured("quote service URL"))?;
        Ok(Self::try_from(base_url.as_str())?.with_timeout(config.quote_timeout))
    }

    /// Returns the base URL used by this client.
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the computed `./quotes` URL relative to [`HttpQuoteClient::base_url`].
    pub const fn quotes_url(&self) -> &Url {
        &self.quotes_url
    }

    /// Returns any custom headers configured on the client.
    pub const fn headers(&self) -> &HeaderMap {
        self.transport.headers()
    }

    /// Returns the configured timeout, if any.
    pub const fn timeout(&self) -> Option<Duration> {
        self.transport.timeout()
    }

    /// Uses `client` for all future requests.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.transport.set_client(client);
        self
    }

    /// Attaches custom headers to all future requests.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.transport.set_headers(headers);
        self
    }

    /// Sets the timeout for all future requests.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.transport.set_timeout(timeout);
        self
    }

    /// Sends a `POST /quotes` request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the HTTP request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "ilpay.quote_client.create",
            skip_all,
            fields(
                receiver = %request.receiver_wallet_id,
                value = request.send_amount.value,
                timeout = ?self.timeout(),
                otel.status_code = tracing::field::Empty,
                error.message = tracing::field::Empty,
            ),
            err
        )
    )]
    pub async fn create(&self, request: &QuoteRequest) -> Result<Quote, ClientError> {
        self.transport
            .post_json(&self.quotes_url, "POST /quotes", request)
            .await
    }
}

impl QuoteService for HttpQuoteClient {
    async fn create_quote(&self, request: &QuoteRequest) -> Result<Quote, QuoteError> {
        Ok(self.create(request).await?)
    }
}

/// Converts a string URL into an `HttpQuoteClient`, parsing the URL and calling `try_new`.
impl TryFrom<&str> for HttpQuoteClient {
    type Error = ClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // Normalize: strip trailing slashes and add a single trailing slash
        let mut normalized = value.trim_end_matches('/').to_owned();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|e| ClientError::UrlParse {
            context: "Failed to parse base url",
            source: e,
        })?;
        Self::try_new(url)
    }
}

/// Converts a String URL into an `HttpQuoteClient`.
impl TryFrom<String> for HttpQuoteClient {
    type Error = ClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

//! A [`WalletAddressResolver`] that fetches wallet address documents over HTTP.
//!
//! Each lookup is a single `GET` of the wallet address URL with
//! `Accept: application/json`. Nothing is cached and nothing is retried; every
//! failure (transport, timeout, non-2xx status, undecodable or incomplete
//! document) is reported as [`WalletAddressError::Unresolvable`].

use std::time::Duration;

use http::HeaderMap;
use ilpay::amount::MAX_ASSET_SCALE;
use ilpay::config::{DEFAULT_DISCOVERY_TIMEOUT, NegotiationConfig};
use ilpay::wallet::{WalletAddress, WalletAddressError, WalletAddressResolver};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::error::ClientError;
use crate::transport::JsonTransport;

const CONTEXT: &str = "GET wallet address";

/// The JSON a wallet address server publishes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAddressDocument {
    /// Canonical URL.
    #[serde(default)]
    pub id: Option<Url>,
    /// Asset code of the account.
    #[serde(default)]
    pub asset_code: Option<String>,
    /// Decimal scale of the account's asset.
    #[serde(default)]
    pub asset_scale: Option<u8>,
    /// Authorization server.
    #[serde(default)]
    pub auth_server: Option<Url>,
    /// Resource server.
    #[serde(default)]
    pub resource_server: Option<Url>,
    /// Display name.
    #[serde(default)]
    pub public_name: Option<String>,
}

impl WalletAddressDocument {
    /// Turns the document into a [`WalletAddress`].
    ///
    /// # Errors
    ///
    /// [`ClientError::MissingField`] when the id is absent, the asset code is
    /// absent or blank, or the asset scale is absent or larger than any amount
    /// can carry.
    pub fn into_wallet_address(self) -> Result<WalletAddress, ClientError> {
        let id = self.id.ok_or(ClientError::MissingField {
            context: CONTEXT,
            field: "id",
        })?;
        let asset_code = self
            .asset_code
            .map(|code| code.trim().to_owned())
            .filter(|code| !code.is_empty())
            .ok_or(ClientError::MissingField {
                context: CONTEXT,
                field: "assetCode",
            })?;
        let asset_scale = self
            .asset_scale
            .filter(|scale| *scale <= MAX_ASSET_SCALE)
            .ok_or(ClientError::MissingField {
                context: CONTEXT,
                field: "assetScale",
            })?;
        Ok(WalletAddress {
            id,
            asset_code,
            asset_scale,
            auth_server: self.auth_server,
            resource_server: self.resource_server,
            public_name: self.public_name,
        })
    }
}

/// Resolves wallet addresses with reqwest.
#[derive(Clone, Debug)]
pub struct HttpWalletAddressResolver {
    transport: JsonTransport,
}

impl Default for HttpWalletAddressResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpWalletAddressResolver {
    /// Creates a resolver with the default discovery timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            transport: JsonTransport::new(Client::new(), Some(DEFAULT_DISCOVERY_TIMEOUT)),
        }
    }

    /// Creates a resolver using the configured discovery timeout.
    #[must_use]
    pub fn from_config(config: &NegotiationConfig) -> Self {
        Self::new().with_timeout(config.discovery_timeout)
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

    /// Returns any custom headers configured on the resolver.
    pub const fn headers(&self) -> &HeaderMap {
        self.transport.headers()
    }

    /// Returns the configured timeout, if any.
    pub const fn timeout(&self) -> Option<Duration> {
        self.transport.timeout()
    }

    /// Fetches the raw document published at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or the body is not JSON.
    pub async fn fetch(&self, url: &Url) -> Result<WalletAddressDocument, ClientError> {
        self.transport.get_json(url, CONTEXT).await
    }

    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "ilpay.wallet_client.resolve",
            skip_all,
            fields(
                url = %url,
                timeout = ?self.timeout(),
                otel.status_code = tracing::field::Empty,
                error.message = tracing::field::Empty,
            ),
            err
        )
    )]
    async fn resolve_inner(&self, url: &Url) -> Result<WalletAddress, WalletAddressError> {
        self.fetch(url)
            .await
            .and_then(WalletAddressDocument::into_wallet_address)
            .map_err(|e| e.into_wallet_error(url.clone()))
    }
}

impl WalletAddressResolver for HttpWalletAddressResolver {
    async fn resolve(&self, url: &Url) -> Result<WalletAddress, WalletAddressError> {
        self.resolve_inner(url).await
    }
}

//! Wallet addresses: normalization and remote discovery.
//!
//! A wallet address is an HTTPS URL that, when fetched, publishes the account's
//! asset code and scale. Users may also type the payment-pointer shorthand
//! (`$wallet.example/alice`), which [`normalize_address`] rewrites to
//! `https://wallet.example/alice` before any network call is made.
//!
//! Discovery itself is behind the [`WalletAddressResolver`] trait; the
//! `ilpay-http` crate provides the reqwest-backed implementation.

use std::future::Future;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::amount::{AmountError, FixedPointAmount, decimal_to_fixed_point};
use crate::error::{BoxError, ErrorKind};

/// Leading marker of the payment-pointer shorthand.
pub const PAYMENT_POINTER_PREFIX: char = '$';

/// A resolved wallet address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAddress {
    /// Canonical wallet URL.
    pub id: Url,
    /// Asset code of the account.
    pub asset_code: String,
    /// Decimal scale of the account's asset.
    pub asset_scale: u8,
    /// Authorization server advertised by the wallet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_server: Option<Url>,
    /// Resource server advertised by the wallet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_server: Option<Url>,
    /// Display name of the account holder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_name: Option<String>,
}

impl WalletAddress {
    /// Creates a wallet address with no optional metadata.
    #[must_use]
    pub fn new(id: Url, asset_code: impl Into<String>, asset_scale: u8) -> Self {
        Self {
            id,
            asset_code: asset_code.into(),
            asset_scale,
            auth_server: None,
            resource_server: None,
            public_name: None,
        }
    }

    /// Converts a decimal string into this wallet's minor units.
    ///
    /// # Errors
    ///
    /// See [`decimal_to_fixed_point`].
    pub fn amount(&self, input: &str) -> Result<FixedPointAmount, AmountError> {
        decimal_to_fixed_point(input, &self.asset_code, self.asset_scale)
    }

    /// Returns `true` when `amount` is denominated in this wallet's asset.
    #[must_use]
    pub fn accepts(&self, amount: &FixedPointAmount) -> bool {
        amount.asset_code == self.asset_code && amount.asset_scale == self.asset_scale
    }
}

/// Errors raised while turning user input into a [`WalletAddress`].
#[derive(Debug, thiserror::Error)]
pub enum WalletAddressError {
    /// The input does not parse as a URL.
    #[error("invalid wallet address {input:?}: {source}")]
    InvalidFormat {
        /// The rejected input.
        input: String,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },

    /// The input parses but is not an `http(s)` URL.
    #[error("wallet address {input:?} must be an http(s) URL")]
    UnsupportedScheme {
        /// The rejected input.
        input: String,
    },

    /// Discovery failed: transport error, timeout, bad status or bad document.
    #[error("wallet address {url} could not be resolved: {source}")]
    Unresolvable {
        /// The URL that was looked up.
        url: Url,
        /// What went wrong.
        #[source]
        source: BoxError,
    },
}

impl WalletAddressError {
    /// Creates an [`WalletAddressError::Unresolvable`] error.
    pub fn unresolvable(url: Url, source: impl Into<BoxError>) -> Self {
        Self::Unresolvable {
            url,
            source: source.into(),
        }
    }

    /// Returns the taxonomy entry for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFormat { .. } | Self::UnsupportedScheme { .. } => {
                ErrorKind::InvalidAddressFormat
            }
            Self::Unresolvable { .. } => ErrorKind::UnresolvableAddress,
        }
    }
}

/// Rewrites payment-pointer shorthand and validates the result as a URL.
///
/// # Errors
///
/// Returns [`WalletAddressError::InvalidFormat`] or
/// [`WalletAddressError::UnsupportedScheme`] when the input is not a usable
/// wallet URL.
pub fn normalize_address(input: &str) -> Result<Url, WalletAddressError> {
    let trimmed = input.trim();
    let candidate = trimmed
        .strip_prefix(PAYMENT_POINTER_PREFIX)
        .map_or_else(|| trimmed.to_owned(), |rest| format!("https://{rest}"));
    let url = Url::parse(&candidate).map_err(|source| WalletAddressError::InvalidFormat {
        input: input.to_owned(),
        source,
    })?;
    match url.scheme() {
        "https" | "http" => Ok(url),
        _ => Err(WalletAddressError::UnsupportedScheme {
            input: input.to_owned(),
        }),
    }
}

/// Looks up wallet address documents.
///
/// Implementations perform exactly one remote call per [`resolve`] and never
/// cache or retry; they must bound the call with a timeout and report it as
/// [`WalletAddressError::Unresolvable`].
///
/// [`resolve`]: WalletAddressResolver::resolve
pub trait WalletAddressResolver: Send + Sync {
    /// Fetches the wallet address published at `url`.
    fn resolve(
        &self,
        url: &Url,
    ) -> impl Future<Output = Result<WalletAddress, WalletAddressError>> + Send;

    /// Normalizes user input and resolves it.
    fn lookup(
        &self,
        input: &str,
    ) -> impl Future<Output = Result<WalletAddress, WalletAddressError>> + Send {
        async move {
            let url = normalize_address(input)?;
            self.resolve(&url).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubResolver;

    #[test]
    fn test_normalize_rewrites_payment_pointer() {
        let url = normalize_address("$wallet.example/alice").unwrap();
        assert_eq!(url.as_str(), "https://wallet.example/alice");
    }

    #[test]
    fn test_normalize_passes_urls_through() {
        let url = normalize_address("  https://wallet.example/bob ").unwrap();
        assert_eq!(url.as_str(), "https://wallet.example/bob");
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        let err = normalize_address("not a wallet").unwrap_err();
        assert!(matches!(err, WalletAddressError::InvalidFormat { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidAddressFormat);

        let err = normalize_address("$").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAddressFormat);
    }

    #[test]
    fn test_normalize_rejects_other_schemes() {
        let err = normalize_address("ftp://wallet.example/alice").unwrap_err();
        assert!(matches!(err, WalletAddressError::UnsupportedScheme { .. }));
    }

    #[test]
    fn test_wallet_amount_uses_wallet_scale() {
        let wallet = WalletAddress::new(
            Url::parse("https://wallet.example/alice").unwrap(),
            "EUR",
            2,
        );
        let amount = wallet.amount("12.34").unwrap();
        assert_eq!(amount, FixedPointAmount::new(1234, "EUR", 2));
        assert!(wallet.accepts(&amount));
        assert!(!wallet.accepts(&FixedPointAmount::new(1, "EUR", 9)));
    }

    #[test]
    fn test_wallet_document_shape() {
        let json = serde_json::json!({
            "id": "https://wallet.example/alice",
            "assetCode": "USD",
            "assetScale": 2,
            "authServer": "https://auth.wallet.example/",
            "publicName": "Alice"
        });
        let wallet: WalletAddress = serde_json::from_value(json).unwrap();
        assert_eq!(wallet.asset_scale, 2);
        assert_eq!(wallet.public_name.as_deref(), Some("Alice"));
        assert!(wallet.resource_server.is_none());
    }

    #[tokio::test]
    async fn test_lookup_normalizes_before_resolving() {
        let resolver = StubResolver::new().with_wallet("https://wallet.example/alice", "USD", 2);
        let wallet = resolver.lookup("$wallet.example/alice").await.unwrap();
        assert_eq!(wallet.id.as_str(), "https://wallet.example/alice");
        assert_eq!(
            resolver.requested(),
            vec!["https://wallet.example/alice".to_owned()]
        );
    }

    #[tokio::test]
    async fn test_lookup_skips_network_for_bad_format() {
        let resolver = StubResolver::new();
        let err = resolver.lookup("::nope::").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAddressFormat);
        assert!(resolver.requested().is_empty());
    }
}

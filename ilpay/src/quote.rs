//! Quote negotiation against the payment network.
//!
//! [`QuoteNegotiator`] turns a sender wallet, a receiver wallet and a
//! fixed-point send amount into a [`QuoteRequest`], hands it to a
//! [`QuoteService`], and sanity-checks what comes back. It does not enforce
//! quote expiry; the session does that when the payment is confirmed.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::amount::FixedPointAmount;
use crate::error::{BoxError, ErrorKind};
use crate::wallet::WalletAddress;

#[cfg(feature = "telemetry")]
use tracing::instrument;

/// A binding, time-limited offer from the payment network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Opaque quote identifier.
    pub id: String,
    /// What the sender pays.
    #[serde(alias = "debitAmount")]
    pub send_amount: FixedPointAmount,
    /// What the receiver gets.
    pub receive_amount: FixedPointAmount,
    /// After this instant the quote must not authorize a payment.
    pub expires_at: DateTime<Utc>,
    /// When the network issued the quote.
    pub created_at: DateTime<Utc>,
}

impl Quote {
    /// Returns `true` once `now` has reached the quote's expiry.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Renders the expiry for the confirmation screen.
    #[must_use]
    pub fn expires_display(&self, format: DateFormat) -> String {
        format.format(self.expires_at)
    }

    /// Renders the creation time for the confirmation screen.
    #[must_use]
    pub fn created_display(&self, format: DateFormat) -> String {
        format.format(self.created_at)
    }
}

/// How a month is spelled in a rendered date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MonthStyle {
    /// `Jan`
    #[default]
    Short,
    /// `January`
    Long,
}

/// Rendering of quote timestamps, e.g. `Jan 05, 2026, 02:30 PM`.
///
/// Always in UTC with a two-digit day and a four-digit year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateFormat {
    /// Appends the hour and minute on a 12-hour clock.
    pub time: bool,
    /// Month spelling.
    pub month: MonthStyle,
}

impl DateFormat {
    /// Renders `at`.
    #[must_use]
    pub fn format(self, at: DateTime<Utc>) -> String {
        let pattern = match (self.month, self.time) {
            (MonthStyle::Short, true) => "%b %d, %Y, %I:%M %p",
            (MonthStyle::Short, false) => "%b %d, %Y",
            (MonthStyle::Long, true) => "%B %d, %Y, %I:%M %p",
            (MonthStyle::Long, false) => "%B %d, %Y",
        };
        at.format(pattern).to_string()
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        Self {
            time: true,
            month: MonthStyle::Short,
        }
    }
}

/// Body of a quote request, as sent to the quote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    /// Canonical URL of the paying wallet.
    pub sender_wallet_id: Url,
    /// Canonical URL of the receiving wallet.
    pub receiver_wallet_id: Url,
    /// Exact amount to send, in the sender's minor units.
    pub send_amount: FixedPointAmount,
}

/// Errors raised while obtaining a quote.
#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    /// The service refused the request (e.g. receiver cannot accept the asset,
    /// amount below minimum).
    #[error("quote request rejected ({status}): {body}")]
    Rejected {
        /// HTTP-style status code returned by the service.
        status: u16,
        /// Body of the rejection.
        body: String,
    },

    /// The service answered with something that is not a usable quote.
    #[error("malformed quote response: {reason}")]
    Malformed {
        /// What was wrong with the response.
        reason: String,
    },

    /// The service could not be reached or did not answer in time.
    #[error("quote service unreachable: {source}")]
    Unreachable {
        /// The transport failure.
        #[source]
        source: BoxError,
    },

    /// The send amount is not denominated in the sender wallet's asset.
    #[error("send amount {amount} does not match sender asset {asset_code}/{asset_scale}")]
    AssetMismatch {
        /// The offending amount.
        amount: FixedPointAmount,
        /// The sender wallet's asset code.
        asset_code: String,
        /// The sender wallet's asset scale.
        asset_scale: u8,
    },
}

impl QuoteError {
    /// Creates a [`QuoteError::Unreachable`] error.
    pub fn unreachable(source: impl Into<BoxError>) -> Self {
        Self::Unreachable {
            source: source.into(),
        }
    }

    /// Returns the taxonomy entry for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Rejected { .. } | Self::Malformed { .. } => ErrorKind::QuoteUnavailable,
            Self::Unreachable { .. } => ErrorKind::QuoteServiceUnreachable,
            Self::AssetMismatch { .. } => ErrorKind::InvalidAmount,
        }
    }
}

/// Issues quotes.
///
/// Implementations make one remote call per request, bound it with a timeout
/// and report transport failures as [`QuoteError::Unreachable`].
pub trait QuoteService: Send + Sync {
    /// Requests a quote for `request`.
    fn create_quote(
        &self,
        request: &QuoteRequest,
    ) -> impl Future<Output = Result<Quote, QuoteError>> + Send;
}

/// Builds quote requests from negotiated values and validates the replies.
#[derive(Debug, Clone)]
pub struct QuoteNegotiator<S> {
    service: S,
    timeout: Option<Duration>,
}

impl<S: QuoteService> QuoteNegotiator<S> {
    /// Wraps a quote service. Requests are not time-limited.
    pub const fn new(service: S) -> Self {
        Self {
            service,
            timeout: None,
        }
    }

    /// Gives up on any request still unanswered after `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the request time limit, if any.
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the underlying quote service.
    pub const fn service(&self) -> &S {
        &self.service
    }

    /// Requests a quote for sending `send_amount` from `sender` to `receiver`.
    ///
    /// The amount is forwarded as the exact minor-unit value it already is.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::AssetMismatch`] before any remote call if the
    /// amount is not in the sender's asset, and whatever the service reports
    /// otherwise. A reply whose send amount is in a different asset than
    /// requested is [`QuoteError::Malformed`]. A service that does not answer
    /// within the configured timeout is [`QuoteError::Unreachable`].
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "ilpay.quote.request",
            skip_all,
            fields(sender = %sender.id, receiver = %receiver.id, value = send_amount.value),
            err
        )
    )]
    pub async fn request_quote(
        &self,
        sender: &WalletAddress,
        receiver: &WalletAddress,
        send_amount: &FixedPointAmount,
    ) -> Result<Quote, QuoteError> {
        if !sender.accepts(send_amount) {
            return Err(QuoteError::AssetMismatch {
                amount: send_amount.clone(),
                asset_code: sender.asset_code.clone(),
                asset_scale: sender.asset_scale,
            });
        }
        let request = QuoteRequest {
            sender_wallet_id: sender.id.clone(),
            receiver_wallet_id: receiver.id.clone(),
            send_amount: send_amount.clone(),
        };
        let reply = self.service.create_quote(&request);
        let quote = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, reply)
                .await
                .map_err(QuoteError::unreachable)??,
            None => reply.await?,
        };
        if !quote.send_amount.same_asset(send_amount) {
            return Err(QuoteError::Malformed {
                reason: format!(
                    "send amount {} differs from requested asset {}/{}",
                    quote.send_amount, send_amount.asset_code, send_amount.asset_scale
                ),
            });
        }
        #[cfg(feature = "telemetry")]
        tracing::debug!(quote = %quote.id, expires_at = %quote.expires_at, "quote obtained");
        Ok(quote)
    }
}

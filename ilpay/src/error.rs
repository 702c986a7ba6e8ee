//! Error taxonomy for payment-intent negotiation.
//!
//! Each component owns a dedicated error type ([`AmountError`],
//! [`WalletAddressError`], [`QuoteError`], [`SessionError`]).
//! [`NegotiationError`] aggregates them for callers that drive the whole
//! pipeline, and every error maps onto a machine-readable [`ErrorKind`] so the
//! UI layer can pick a specific message.

use serde::{Deserialize, Serialize};

use crate::amount::AmountError;
use crate::quote::QuoteError;
use crate::session::SessionError;
use crate::submission::Field;
use crate::wallet::WalletAddressError;

/// Boxed error used to carry transport-specific causes across crate boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Machine-readable classification of negotiation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorKind {
    /// The amount is not numeric, negative, zero where forbidden, or does not
    /// fit the asset's scale.
    InvalidAmount,
    /// The wallet address string is not a well-formed URL.
    InvalidAddressFormat,
    /// The discovery service could not produce a wallet address.
    UnresolvableAddress,
    /// The quote service rejected the request or answered with garbage.
    QuoteUnavailable,
    /// The quote service could not be reached in time.
    QuoteServiceUnreachable,
    /// The negotiated quote is past its expiry.
    QuoteExpired,
    /// A session field was read before the flow populated it.
    SessionIncomplete,
    /// The session outlived its wall-clock lifetime.
    SessionExpired,
    /// The session was invalidated and must be replaced.
    SessionDiscarded,
    /// An operation was attempted in the wrong stage.
    StageViolation,
    /// Submitted data disagrees with what the session already negotiated.
    Inconsistent,
}

impl ErrorKind {
    /// Returns the `snake_case` code used on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidAmount => "invalid_amount",
            Self::InvalidAddressFormat => "invalid_address_format",
            Self::UnresolvableAddress => "unresolvable_address",
            Self::QuoteUnavailable => "quote_unavailable",
            Self::QuoteServiceUnreachable => "quote_service_unreachable",
            Self::QuoteExpired => "quote_expired",
            Self::SessionIncomplete => "session_incomplete",
            Self::SessionExpired => "session_expired",
            Self::SessionDiscarded => "session_discarded",
            Self::StageViolation => "stage_violation",
            Self::Inconsistent => "inconsistent",
        }
    }

    /// Whether the current payment attempt is over and must restart from the
    /// first step.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::SessionIncomplete | Self::SessionExpired | Self::SessionDiscarded
        )
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any failure raised while negotiating a payment intent.
#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    /// Amount conversion failed.
    #[error("{0}")]
    Amount(#[from] AmountError),

    /// Wallet address normalization or discovery failed.
    #[error("{0}")]
    WalletAddress(#[from] WalletAddressError),

    /// Quote negotiation failed.
    #[error("{0}")]
    Quote(#[from] QuoteError),

    /// The session refused the operation.
    #[error("{0}")]
    Session(#[from] SessionError),
}

impl NegotiationError {
    /// Returns the taxonomy entry for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Amount(e) => e.kind(),
            Self::WalletAddress(e) => e.kind(),
            Self::Quote(e) => e.kind(),
            Self::Session(e) => e.kind(),
        }
    }

    /// Returns the submission field the error is about, when there is one.
    #[must_use]
    pub const fn field(&self) -> Option<Field> {
        match self {
            Self::Amount(_) => Some(Field::Amount),
            Self::WalletAddress(_) | Self::Quote(_) | Self::Session(_) => None,
        }
    }
}

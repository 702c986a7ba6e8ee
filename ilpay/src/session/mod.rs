//! The per-attempt negotiation session.
//!
//! An [`IntentSession`] threads the sender wallet, entered amount, receiver,
//! note and quote through the payment flow:
//!
//! ```text
//! AmountEntry ──▶ ReceiverEntry ──▶ QuoteObtained ──▶ Confirmed
//! ```
//!
//! Transitions only move forward. Every operation, reads included, first checks
//! that the session is still alive: a session past its wall-clock lifetime
//! fails with [`SessionError::Expired`]. One that was confirmed, or invalidated
//! by a stale quote or an explicit reset, fails with
//! [`SessionError::Discarded`]. Both mean the user starts over with a fresh
//! session.
//!
//! - [`SessionHandle`] serializes concurrent mutations of one session.
//! - [`SessionTransport`] stores the serialized session in the host's
//!   key-value store (e.g. a signed cookie).

mod handle;
mod transport;

pub use handle::*;
pub use transport::*;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::FixedPointAmount;
use crate::error::ErrorKind;
use crate::quote::Quote;
use crate::submission::ValidatedSubmission;
use crate::wallet::WalletAddress;

/// Step of the payment flow a session is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    /// The user is typing an amount.
    AmountEntry,
    /// The user is entering the receiver and note.
    ReceiverEntry,
    /// A quote has been negotiated and awaits confirmation.
    QuoteObtained,
    /// The user accepted the quote.
    Confirmed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AmountEntry => "amount entry",
            Self::ReceiverEntry => "receiver entry",
            Self::QuoteObtained => "quote obtained",
            Self::Confirmed => "confirmed",
        })
    }
}

/// Fields a session populates as it advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionField {
    /// The paying wallet.
    SenderWallet,
    /// The amount typed during [`Stage::AmountEntry`].
    EnteredAmount,
    /// The receiving wallet.
    ReceiverWallet,
    /// The payment note.
    Note,
    /// The negotiated quote.
    Quote,
}

impl fmt::Display for SessionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SenderWallet => "sender wallet",
            Self::EnteredAmount => "entered amount",
            Self::ReceiverWallet => "receiver wallet",
            Self::Note => "note",
            Self::Quote => "quote",
        })
    }
}

/// Errors raised by session operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The field has not been populated yet.
    #[error("payment session is missing the {field}")]
    Incomplete {
        /// The field that was read.
        field: SessionField,
    },

    /// The stored session could not be decoded.
    #[error("payment session could not be decoded: {reason}")]
    Corrupt {
        /// Decoder message.
        reason: String,
    },

    /// The session outlived its lifetime.
    #[error("payment session expired at {expired_at}")]
    Expired {
        /// When the session expired.
        expired_at: DateTime<Utc>,
    },

    /// The session was invalidated.
    #[error("payment session has been discarded")]
    Discarded,

    /// The quote expired before it was confirmed.
    #[error("quote {quote_id} expired at {expires_at}")]
    QuoteExpired {
        /// The stale quote.
        quote_id: String,
        /// Its expiry.
        expires_at: DateTime<Utc>,
    },

    /// The operation belongs to another stage.
    #[error("operation requires the {expected} stage, session is in {actual}")]
    StageViolation {
        /// Stage the operation needs.
        expected: Stage,
        /// Stage the session is in.
        actual: Stage,
    },

    /// The amount cannot leave [`Stage::AmountEntry`] as zero.
    #[error("entered amount must be greater than zero")]
    ZeroAmount,

    /// The amount is not in the sender wallet's asset.
    #[error("amount {amount} is not in the sender's asset {asset_code}/{asset_scale}")]
    AssetMismatch {
        /// The rejected amount.
        amount: FixedPointAmount,
        /// Sender asset code.
        asset_code: String,
        /// Sender asset scale.
        asset_scale: u8,
    },

    /// Submitted data contradicts what the session already holds.
    #[error("submitted {field} does not match the payment session")]
    Inconsistent {
        /// The contradicting field.
        field: SessionField,
    },
}

impl SessionError {
    /// Returns the taxonomy entry for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Incomplete { .. } | Self::Corrupt { .. } => ErrorKind::SessionIncomplete,
            Self::Expired { .. } => ErrorKind::SessionExpired,
            Self::Discarded => ErrorKind::SessionDiscarded,
            Self::QuoteExpired { .. } => ErrorKind::QuoteExpired,
            Self::StageViolation { .. } => ErrorKind::StageViolation,
            Self::ZeroAmount | Self::AssetMismatch { .. } => ErrorKind::InvalidAmount,
            Self::Inconsistent { .. } => ErrorKind::Inconsistent,
        }
    }
}

/// State carried across the steps of one payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentSession {
    stage: Stage,
    sender_wallet: WalletAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    entered_amount: Option<FixedPointAmount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    receiver_wallet: Option<WalletAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quote: Option<Quote>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    #[serde(default)]
    discarded: bool,
}

impl IntentSession {
    /// Starts a session once the sender's wallet is known.
    #[must_use]
    pub fn start(sender_wallet: WalletAddress, lifetime: Duration, now: DateTime<Utc>) -> Self {
        let expires_at = TimeDelta::from_std(lifetime)
            .ok()
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        #[cfg(feature = "telemetry")]
        tracing::debug!(sender = %sender_wallet.id, %expires_at, "payment session started");
        Self {
            stage: Stage::AmountEntry,
            sender_wallet,
            entered_amount: None,
            receiver_wallet: None,
            note: None,
            quote: None,
            created_at: now,
            expires_at,
            discarded: false,
        }
    }

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// When the session was started.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the session stops accepting operations.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the session has been invalidated.
    #[must_use]
    pub const fn is_discarded(&self) -> bool {
        self.discarded
    }

    /// Fails unless the session is neither past its lifetime nor discarded.
    ///
    /// A confirmed session counts as discarded. The lifetime is checked first,
    /// so an expired session reports [`SessionError::Expired`] even if it was
    /// also discarded.
    ///
    /// # Errors
    ///
    /// [`SessionError::Expired`] or [`SessionError::Discarded`].
    pub fn ensure_live(&self, now: DateTime<Utc>) -> Result<(), SessionError> {
        if now >= self.expires_at {
            #[cfg(feature = "telemetry")]
            tracing::info!(expired_at = %self.expires_at, "payment session expired");
            return Err(SessionError::Expired {
                expired_at: self.expires_at,
            });
        }
        if self.discarded || self.stage == Stage::Confirmed {
            return Err(SessionError::Discarded);
        }
        Ok(())
    }

    /// Fails unless the session is alive and in `expected`.
    ///
    /// # Errors
    ///
    /// Liveness errors from [`Self::ensure_live`], then
    /// [`SessionError::StageViolation`].
    pub fn ensure_stage(&self, expected: Stage, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.ensure_live(now)?;
        if self.stage == expected {
            Ok(())
        } else {
            Err(SessionError::StageViolation {
                expected,
                actual: self.stage,
            })
        }
    }

    /// The paying wallet.
    ///
    /// # Errors
    ///
    /// Liveness errors only.
    pub fn sender_wallet(&self, now: DateTime<Utc>) -> Result<&WalletAddress, SessionError> {
        self.ensure_live(now)?;
        Ok(&self.sender_wallet)
    }

    /// The amount entered so far.
    ///
    /// # Errors
    ///
    /// Liveness errors, or [`SessionError::Incomplete`] before an amount was
    /// entered.
    pub fn entered_amount(&self, now: DateTime<Utc>) -> Result<&FixedPointAmount, SessionError> {
        self.ensure_live(now)?;
        populated(self.entered_amount.as_ref(), SessionField::EnteredAmount)
    }

    /// The receiving wallet.
    ///
    /// # Errors
    ///
    /// Liveness errors, or [`SessionError::Incomplete`] before a quote was
    /// recorded.
    pub fn receiver_wallet(&self, now: DateTime<Utc>) -> Result<&WalletAddress, SessionError> {
        self.ensure_live(now)?;
        populated(self.receiver_wallet.as_ref(), SessionField::ReceiverWallet)
    }

    /// The optional payment note.
    ///
    /// # Errors
    ///
    /// Liveness errors, or [`SessionError::Incomplete`] before the receiver
    /// step completed.
    pub fn note(&self, now: DateTime<Utc>) -> Result<Option<&str>, SessionError> {
        self.ensure_live(now)?;
        if self.stage < Stage::QuoteObtained {
            return Err(SessionError::Incomplete {
                field: SessionField::Note,
            });
        }
        Ok(self.note.as_deref())
    }

    /// The negotiated quote.
    ///
    /// # Errors
    ///
    /// Liveness errors, or [`SessionError::Incomplete`] before a quote was
    /// recorded.
    pub fn quote(&self, now: DateTime<Utc>) -> Result<&Quote, SessionError> {
        self.ensure_live(now)?;
        populated(self.quote.as_ref(), SessionField::Quote)
    }

    /// Records (or replaces) the amount while still in [`Stage::AmountEntry`].
    ///
    /// # Errors
    ///
    /// Liveness and stage errors, or [`SessionError::AssetMismatch`] if the
    /// amount is not in the sender's asset.
    pub fn enter_amount(
        &mut self,
        amount: FixedPointAmount,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        self.ensure_stage(Stage::AmountEntry, now)?;
        if !self.sender_wallet.accepts(&amount) {
            return Err(SessionError::AssetMismatch {
                amount,
                asset_code: self.sender_wallet.asset_code.clone(),
                asset_scale: self.sender_wallet.asset_scale,
            });
        }
        self.entered_amount = Some(amount);
        Ok(())
    }

    /// Moves from [`Stage::AmountEntry`] to [`Stage::ReceiverEntry`].
    ///
    /// # Errors
    ///
    /// Liveness and stage errors, [`SessionError::Incomplete`] without an
    /// amount, [`SessionError::ZeroAmount`] for a zero amount. The session
    /// stays in [`Stage::AmountEntry`] on error.
    pub fn advance_to_receiver_entry(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.ensure_stage(Stage::AmountEntry, now)?;
        let amount = populated(self.entered_amount.as_ref(), SessionField::EnteredAmount)?;
        if amount.is_zero() {
            return Err(SessionError::ZeroAmount);
        }
        self.advance(Stage::ReceiverEntry);
        Ok(())
    }

    /// Checks that a validated submission agrees with this session.
    ///
    /// # Errors
    ///
    /// Liveness and stage errors, then [`SessionError::Inconsistent`] if the
    /// submission names another sender or another amount.
    pub fn check_submission(
        &self,
        submission: &ValidatedSubmission,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        self.ensure_stage(Stage::ReceiverEntry, now)?;
        if submission.sender.id != self.sender_wallet.id {
            return Err(SessionError::Inconsistent {
                field: SessionField::SenderWallet,
            });
        }
        let entered = populated(self.entered_amount.as_ref(), SessionField::EnteredAmount)?;
        if submission.amount != *entered {
            return Err(SessionError::Inconsistent {
                field: SessionField::EnteredAmount,
            });
        }
        Ok(())
    }

    /// Stores the receiver, note and quote and moves to
    /// [`Stage::QuoteObtained`].
    ///
    /// # Errors
    ///
    /// Everything [`Self::check_submission`] reports,
    /// [`SessionError::Inconsistent`] if the quote sends a different asset, and
    /// [`SessionError::QuoteExpired`] for a quote that is already stale. The
    /// session stays in [`Stage::ReceiverEntry`] on error.
    pub fn record_quote(
        &mut self,
        submission: ValidatedSubmission,
        quote: Quote,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        self.check_submission(&submission, now)?;
        if !quote.send_amount.same_asset(&submission.amount) {
            return Err(SessionError::Inconsistent {
                field: SessionField::Quote,
            });
        }
        if quote.is_expired_at(now) {
            return Err(SessionError::QuoteExpired {
                quote_id: quote.id,
                expires_at: quote.expires_at,
            });
        }
        self.receiver_wallet = Some(submission.receiver);
        self.note = submission.note;
        self.quote = Some(quote);
        self.advance(Stage::QuoteObtained);
        Ok(())
    }

    /// Accepts the quote, moving to [`Stage::Confirmed`].
    ///
    /// A confirmed session is spent: it is discarded in the same step, so it
    /// can be neither read again nor restored from a transport. The returned
    /// quote is the caller's only copy.
    ///
    /// # Errors
    ///
    /// Liveness and stage errors. If the quote has expired the session is
    /// discarded, its stage is left as is, and [`SessionError::QuoteExpired`]
    /// is returned; a new session is needed to negotiate fresh terms.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<&Quote, SessionError> {
        self.ensure_stage(Stage::QuoteObtained, now)?;
        let quote = populated(self.quote.as_ref(), SessionField::Quote)?;
        if quote.is_expired_at(now) {
            let err = SessionError::QuoteExpired {
                quote_id: quote.id.clone(),
                expires_at: quote.expires_at,
            };
            #[cfg(feature = "telemetry")]
            tracing::info!(
                quote = %quote.id,
                expires_at = %quote.expires_at,
                "quote expired before confirmation"
            );
            self.discarded = true;
            return Err(err);
        }
        self.advance(Stage::Confirmed);
        self.discarded = true;
        populated(self.quote.as_ref(), SessionField::Quote)
    }

    /// Invalidates the session.
    pub fn reset(&mut self) {
        #[cfg(feature = "telemetry")]
        tracing::debug!(stage = %self.stage, "payment session reset");
        self.discarded = true;
    }

    fn advance(&mut self, to: Stage) {
        #[cfg(feature = "telemetry")]
        tracing::debug!(from = %self.stage, %to, "payment session advanced");
        self.stage = to;
    }
}

fn populated<T>(value: Option<&T>, field: SessionField) -> Result<&T, SessionError> {
    value.ok_or(SessionError::Incomplete { field })
}

//! Validation of the payment form.
//!
//! [`SubmissionValidator::validate`] runs in two phases:
//!
//! 1. Synchronous field checks: required values, numeric amount, well-formed
//!    wallet addresses. These never block.
//! 2. Remote wallet discovery for every address that passed phase 1. The
//!    lookups run concurrently and are all awaited before a result is built.
//!
//! Failures from both phases are merged into one [`SubmissionResult`]. A
//! discovery failure always surfaces as the same per-field message; the
//! underlying cause only goes to the log.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use futures_util::future::join;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::amount::{AmountError, FixedPointAmount, parse_decimal};
use crate::wallet::{WalletAddress, WalletAddressError, WalletAddressResolver, normalize_address};

/// Message for a missing required field.
pub const REQUIRED: &str = "Required";
/// Message for an address that is not a URL.
pub const INVALID_WALLET_ADDRESS: &str = "Invalid wallet address.";
/// Message for a receiver that could not be discovered.
pub const RECEIVER_NOT_VALID: &str = "Receiver wallet address is not valid.";
/// Message for a sender that could not be discovered.
pub const SENDER_NOT_VALID: &str = "Wallet address is not valid.";
/// Message for an amount that is not a number.
pub const AMOUNT_NOT_A_NUMBER: &str = "Amount must be a number.";
/// Message for a negative amount.
pub const AMOUNT_NEGATIVE: &str = "Amount must not be negative.";
/// Message for an amount the sender's asset cannot represent.
pub const AMOUNT_OUT_OF_RANGE: &str = "Amount is out of range for this wallet.";

/// Form fields, in the order their checks are declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    /// The paying wallet address.
    WalletAddress,
    /// The receiving wallet address.
    Receiver,
    /// The decimal amount.
    Amount,
    /// The free-text note.
    Note,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WalletAddress => "walletAddress",
            Self::Receiver => "receiver",
            Self::Amount => "amount",
            Self::Note => "note",
        })
    }
}

/// Raw form values as posted by the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSubmission {
    /// Paying wallet address.
    pub wallet_address: Option<String>,
    /// Receiving wallet address, possibly in `$` shorthand.
    pub receiver: Option<String>,
    /// Decimal amount.
    pub amount: Option<String>,
    /// Optional note.
    pub note: Option<String>,
}

/// A fully decoded submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedSubmission {
    /// Resolved paying wallet.
    pub sender: WalletAddress,
    /// Resolved receiving wallet.
    pub receiver: WalletAddress,
    /// Amount in the sender's minor units.
    pub amount: FixedPointAmount,
    /// Note, with blank notes dropped.
    pub note: Option<String>,
}

/// Error messages keyed by field, in declaration order.
pub type FieldErrors = BTreeMap<Field, Vec<String>>;

/// Outcome of one validation pass. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    value: Option<ValidatedSubmission>,
    field_errors: FieldErrors,
    ok: bool,
}

impl SubmissionResult {
    fn new(value: Option<ValidatedSubmission>, field_errors: FieldErrors) -> Self {
        let ok = field_errors.is_empty() && value.is_some();
        Self {
            value: value.filter(|_| ok),
            field_errors,
            ok,
        }
    }

    /// `true` iff no field has an error.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.ok
    }

    /// The decoded submission, present only when [`Self::is_ok`].
    #[must_use]
    pub const fn value(&self) -> Option<&ValidatedSubmission> {
        self.value.as_ref()
    }

    /// All field errors.
    #[must_use]
    pub const fn field_errors(&self) -> &FieldErrors {
        &self.field_errors
    }

    /// Errors for one field, empty if it passed.
    #[must_use]
    pub fn errors_for(&self, field: Field) -> &[String] {
        self.field_errors.get(&field).map_or(&[], Vec::as_slice)
    }
}

/// Validates form submissions against a wallet resolver.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionValidator<'r, R> {
    resolver: &'r R,
    timeout: Option<Duration>,
}

impl<'r, R: WalletAddressResolver> SubmissionValidator<'r, R> {
    /// Creates a validator that discovers wallets through `resolver`.
    pub const fn new(resolver: &'r R) -> Self {
        Self {
            resolver,
            timeout: None,
        }
    }

    /// Treats a wallet that has not answered after `timeout` as unresolvable.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validates `raw`, resolving both wallet addresses concurrently.
    ///
    /// Dropping the returned future cancels any discovery still in flight.
    pub async fn validate(&self, raw: &RawSubmission) -> SubmissionResult {
        let mut errors = FieldErrors::new();

        let sender_url = check_address(
            Field::WalletAddress,
            raw.wallet_address.as_deref(),
            &mut errors,
        );
        let receiver_url = check_address(Field::Receiver, raw.receiver.as_deref(), &mut errors);
        let decimal = check_amount(raw.amount.as_deref(), &mut errors);
        let note = raw
            .note
            .as_deref()
            .map(str::trim)
            .filter(|note| !note.is_empty())
            .map(str::to_owned);

        let (sender, receiver) = join(
            self.discover(sender_url.as_ref()),
            self.discover(receiver_url.as_ref()),
        )
        .await;
        let sender = settle(Field::WalletAddress, sender, SENDER_NOT_VALID, &mut errors);
        let receiver = settle(Field::Receiver, receiver, RECEIVER_NOT_VALID, &mut errors);

        let amount = match (&sender, decimal) {
            (Some(sender), Some(decimal)) => {
                FixedPointAmount::from_decimal(decimal, &sender.asset_code, sender.asset_scale)
                    .map_err(|_| push(&mut errors, Field::Amount, AMOUNT_OUT_OF_RANGE))
                    .ok()
            }
            _ => None,
        };

        let value = match (sender, receiver, amount) {
            (Some(sender), Some(receiver), Some(amount)) => Some(ValidatedSubmission {
                sender,
                receiver,
                amount,
                note,
            }),
            _ => None,
        };
        SubmissionResult::new(value, errors)
    }

    async fn discover(
        &self,
        url: Option<&Url>,
    ) -> Option<Result<WalletAddress, WalletAddressError>> {
        let url = url?;
        let lookup = self.resolver.resolve(url);
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, lookup).await {
                Ok(outcome) => outcome,
                Err(elapsed) => Err(WalletAddressError::unresolvable(url.clone(), elapsed)),
            },
            None => lookup.await,
        };
        Some(outcome)
    }
}

fn push(errors: &mut FieldErrors, field: Field, message: &str) {
    errors.entry(field).or_default().push(message.to_owned());
}

fn check_address(field: Field, input: Option<&str>, errors: &mut FieldErrors) -> Option<Url> {
    let Some(input) = input.filter(|value| !value.trim().is_empty()) else {
        push(errors, field, REQUIRED);
        return None;
    };
    normalize_address(input)
        .map_err(|_| push(errors, field, INVALID_WALLET_ADDRESS))
        .ok()
}

fn check_amount(input: Option<&str>, errors: &mut FieldErrors) -> Option<Decimal> {
    let Some(input) = input.filter(|value| !value.trim().is_empty()) else {
        push(errors, Field::Amount, REQUIRED);
        return None;
    };
    match parse_decimal(input) {
        Ok(decimal) => Some(decimal),
        Err(AmountError::Negative { .. }) => {
            push(errors, Field::Amount, AMOUNT_NEGATIVE);
            None
        }
        Err(AmountError::Overflow { .. }) => {
            push(errors, Field::Amount, AMOUNT_OUT_OF_RANGE);
            None
        }
        Err(_) => {
            push(errors, Field::Amount, AMOUNT_NOT_A_NUMBER);
            None
        }
    }
}

/// Folds one discovery outcome into the error map.
fn settle(
    field: Field,
    outcome: Option<Result<WalletAddress, WalletAddressError>>,
    message: &str,
    errors: &mut FieldErrors,
) -> Option<WalletAddress> {
    match outcome? {
        Ok(wallet) => Some(wallet),
        Err(err) => {
            #[cfg(feature = "telemetry")]
            tracing::warn!(
                %field,
                kind = %err.kind(),
                error = %err,
                "wallet address discovery failed"
            );
            #[cfg(not(feature = "telemetry"))]
            let _ = err;
            push(errors, field, message);
            None
        }
    }
}

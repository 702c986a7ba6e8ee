//! Fixed-point amounts and their decimal representations.
//!
//! Open Payments expresses money as an integer count of minor units together
//! with the asset's scale (`{ value: "1000", assetCode: "USD", assetScale: 2 }`
//! is ten dollars). User input arrives as decimal strings, so this module is
//! the single place where decimals become minor units and back.
//!
//! All arithmetic goes through [`rust_decimal::Decimal`]; no value ever passes
//! through a binary floating-point type.
//!
//! ```rust
//! use ilpay::amount::{decimal_to_fixed_point, currency_symbol};
//!
//! let amount = decimal_to_fixed_point("10.00", "USD", 2).unwrap();
//! assert_eq!(amount.value, 1000);
//! assert_eq!(amount.display().unwrap().amount_with_currency, "$10.00");
//! assert_eq!(currency_symbol("EUR"), "€");
//! ```

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use crate::error::ErrorKind;

/// Largest asset scale whose scaling factor fits the minor-unit integer.
pub const MAX_ASSET_SCALE: u8 = 19;

/// A monetary value as an integer number of minor units.
///
/// `value` is serialized as a decimal string, matching the Open Payments wire
/// format, so large values survive JSON consumers with 53-bit numbers.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedPointAmount {
    /// Minor units (cents for a scale-2 asset).
    #[serde_as(as = "DisplayFromStr")]
    pub value: u64,
    /// Asset code, usually ISO 4217 (e.g. `"USD"`).
    pub asset_code: String,
    /// Number of fractional decimal digits of the asset.
    pub asset_scale: u8,
}

/// Errors produced while converting amounts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// The input is empty or not a number.
    #[error("amount {input:?} is not a number")]
    NotNumeric {
        /// The rejected input.
        input: String,
    },

    /// The input is below zero.
    #[error("amount {input:?} is negative")]
    Negative {
        /// The rejected input.
        input: String,
    },

    /// The input is beyond the decimal range, or scaling it to minor units
    /// overflows.
    #[error(
        "amount {input} is out of range{}",
        .asset_scale.map(|scale| format!(" for an asset of scale {scale}")).unwrap_or_default()
    )]
    Overflow {
        /// The rejected input.
        input: String,
        /// The scale it was converted to, if scaling was reached.
        asset_scale: Option<u8>,
    },

    /// The asset scale is beyond what the codec can represent exactly.
    #[error("asset scale {0} is not supported")]
    UnsupportedScale(u8),
}

impl AmountError {
    /// Returns the taxonomy entry for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidAmount
    }
}

/// Parses a user-entered decimal string.
///
/// Accepts an optional sign, digits with at most one decimal point, and an
/// optional exponent (`"1e3"`, `"2.5E-2"`). Surrounding whitespace is ignored.
/// Negative zero is normalized to zero.
///
/// # Errors
///
/// Returns [`AmountError::NotNumeric`] for empty or malformed input (digit
/// separators included), [`AmountError::Negative`] for values below zero and
/// [`AmountError::Overflow`] for numbers beyond the decimal range.
pub fn parse_decimal(input: &str) -> Result<Decimal, AmountError> {
    let trimmed = input.trim();
    let (mantissa, exponent) = split_numeric(trimmed).ok_or_else(|| AmountError::NotNumeric {
        input: input.to_owned(),
    })?;
    let out_of_range = || AmountError::Overflow {
        input: input.to_owned(),
        asset_scale: None,
    };
    let mut decimal = Decimal::from_str(mantissa).map_err(|_| out_of_range())?;
    if let Some(exponent) = exponent.filter(|_| !decimal.is_zero()) {
        decimal = scale_by_exponent(decimal, exponent).ok_or_else(out_of_range)?;
    }
    if decimal.is_zero() {
        return Ok(Decimal::ZERO);
    }
    if decimal.is_sign_negative() {
        return Err(AmountError::Negative {
            input: input.to_owned(),
        });
    }
    Ok(decimal)
}

/// Splits a numeric literal into mantissa and exponent, or `None` if `input`
/// is not one.
fn split_numeric(input: &str) -> Option<(&str, Option<&str>)> {
    let (mantissa, exponent) = match input.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => (mantissa, Some(exponent)),
        None => (input, None),
    };
    let unsigned = mantissa.strip_prefix(['+', '-']).unwrap_or(mantissa);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let has_digits = !whole.is_empty() || !fraction.is_empty();
    if !has_digits || !all_digits(whole) || !all_digits(fraction) {
        return None;
    }
    if let Some(exponent) = exponent {
        let digits = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
        if digits.is_empty() || !all_digits(digits) {
            return None;
        }
    }
    Some((mantissa, exponent))
}

fn all_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

/// Largest exponent magnitude worth computing; beyond it a non-zero mantissa
/// overflows or underflows every supported scale.
const MAX_EXPONENT: u32 = 64;

/// Multiplies `decimal` by `10^exponent`. `None` on overflow.
fn scale_by_exponent(decimal: Decimal, exponent: &str) -> Option<Decimal> {
    let negative = exponent.starts_with('-');
    let digits = exponent.trim_start_matches(['+', '-']);
    let magnitude = digits.parse::<u32>().ok().filter(|m| *m <= MAX_EXPONENT);
    match (negative, magnitude) {
        (false, None) => None,
        (true, None) => Some(Decimal::ZERO),
        (false, Some(m)) => (0..m).try_fold(decimal, |acc, _| acc.checked_mul(Decimal::TEN)),
        (true, Some(m)) => (0..m).try_fold(decimal, |acc, _| acc.checked_div(Decimal::TEN)),
    }
}

/// Converts a decimal string into minor units of the given asset.
///
/// The value is scaled by `10^asset_scale` and rounded to the nearest minor
/// unit, ties away from zero.
///
/// # Errors
///
/// Returns an [`AmountError`] when the input is not a non-negative number or
/// does not fit the asset's scale.
pub fn decimal_to_fixed_point(
    input: &str,
    asset_code: &str,
    asset_scale: u8,
) -> Result<FixedPointAmount, AmountError> {
    let decimal = parse_decimal(input)?;
    FixedPointAmount::from_decimal(decimal, asset_code, asset_scale)
}

impl FixedPointAmount {
    /// Creates an amount from raw minor units.
    #[must_use]
    pub fn new(value: u64, asset_code: impl Into<String>, asset_scale: u8) -> Self {
        Self {
            value,
            asset_code: asset_code.into(),
            asset_scale,
        }
    }

    /// Scales an already parsed decimal into minor units.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::Negative`] for negative input,
    /// [`AmountError::UnsupportedScale`] above [`MAX_ASSET_SCALE`] and
    /// [`AmountError::Overflow`] when the result exceeds `u64`.
    pub fn from_decimal(
        decimal: Decimal,
        asset_code: &str,
        asset_scale: u8,
    ) -> Result<Self, AmountError> {
        if decimal.is_sign_negative() && !decimal.is_zero() {
            return Err(AmountError::Negative {
                input: decimal.to_string(),
            });
        }
        if asset_scale > MAX_ASSET_SCALE {
            return Err(AmountError::UnsupportedScale(asset_scale));
        }
        let factor = 10_u64.pow(u32::from(asset_scale));
        let value = decimal
            .checked_mul(Decimal::from(factor))
            .map(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|minor| minor.to_u64())
            .ok_or_else(|| AmountError::Overflow {
                input: decimal.to_string(),
                asset_scale: Some(asset_scale),
            })?;
        Ok(Self::new(value, asset_code, asset_scale))
    }

    /// Returns `true` when the amount is zero minor units.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.value == 0
    }

    /// Returns `true` when `other` is denominated in the same asset.
    #[must_use]
    pub fn same_asset(&self, other: &Self) -> bool {
        self.asset_code == other.asset_code && self.asset_scale == other.asset_scale
    }

    /// Returns the amount in major units with exactly `asset_scale` fractional
    /// digits.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::UnsupportedScale`] if the scale cannot be
    /// represented by the decimal backend.
    pub fn to_decimal(&self) -> Result<Decimal, AmountError> {
        Decimal::try_from_i128_with_scale(i128::from(self.value), u32::from(self.asset_scale))
            .map_err(|_| AmountError::UnsupportedScale(self.asset_scale))
    }

    /// Formats the amount with en-US conventions.
    ///
    /// # Errors
    ///
    /// See [`Self::to_decimal`].
    pub fn display(&self) -> Result<FormattedAmount, AmountError> {
        self.display_with(AmountFormat::EN_US)
    }

    /// Formats the amount with the given separators.
    ///
    /// # Errors
    ///
    /// See [`Self::to_decimal`].
    pub fn display_with(&self, format: AmountFormat) -> Result<FormattedAmount, AmountError> {
        let amount = self.to_decimal()?;
        let digits = format.apply(&amount.to_string());
        let symbol = currency_symbol(&self.asset_code);
        let amount_with_currency = if symbol.chars().all(|c| c.is_ascii_alphabetic()) {
            format!("{symbol}\u{a0}{digits}")
        } else {
            format!("{symbol}{digits}")
        };
        Ok(FormattedAmount {
            amount,
            amount_with_currency,
            symbol,
        })
    }
}

impl fmt::Display for FixedPointAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (scale {})",
            self.value, self.asset_code, self.asset_scale
        )
    }
}

/// An amount prepared for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedAmount {
    /// Major units, carrying exactly `asset_scale` fractional digits.
    pub amount: Decimal,
    /// The amount with grouping and currency symbol, e.g. `"$1,234.50"`.
    pub amount_with_currency: String,
    /// The bare currency symbol, e.g. `"$"`.
    pub symbol: String,
}

/// Separators used when rendering amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountFormat {
    /// Thousands separator, if grouping is wanted.
    pub group_separator: Option<char>,
    /// Separator between integer and fractional digits.
    pub decimal_separator: char,
}

impl AmountFormat {
    /// `1,234.56`
    pub const EN_US: Self = Self {
        group_separator: Some(','),
        decimal_separator: '.',
    };

    /// Re-renders a plain `1234.56` string with these separators.
    fn apply(self, plain: &str) -> String {
        let (integer, fraction) = plain
            .split_once('.')
            .map_or((plain, None), |(i, f)| (i, Some(f)));
        let mut out = String::with_capacity(plain.len() + integer.len() / 3);
        for (i, digit) in integer.chars().enumerate() {
            let remaining = integer.len() - i;
            if i > 0 && remaining % 3 == 0 {
                if let Some(sep) = self.group_separator {
                    out.push(sep);
                }
            }
            out.push(digit);
        }
        if let Some(fraction) = fraction {
            out.push(self.decimal_separator);
            out.push_str(fraction);
        }
        out
    }
}

impl Default for AmountFormat {
    fn default() -> Self {
        Self::EN_US
    }
}

/// Symbols rendered by en-US currency formatting for common asset codes.
const CURRENCY_SYMBOLS: &[(&str, &str)] = &[
    ("USD", "$"),
    ("EUR", "€"),
    ("GBP", "£"),
    ("JPY", "¥"),
    ("CNY", "CN¥"),
    ("INR", "₹"),
    ("KRW", "₩"),
    ("BRL", "R$"),
    ("CAD", "CA$"),
    ("AUD", "A$"),
    ("NZD", "NZ$"),
    ("MXN", "MX$"),
    ("HKD", "HK$"),
    ("TWD", "NT$"),
    ("ILS", "₪"),
    ("VND", "₫"),
    ("PHP", "₱"),
    ("XCD", "EC$"),
    ("XAF", "FCFA"),
];

/// Returns the display symbol for an asset code.
///
/// Codes without a dedicated symbol render as the code itself, the way locale
/// formatting does for currencies it has no symbol for.
#[must_use]
pub fn currency_symbol(asset_code: &str) -> String {
    let code = asset_code.trim().to_ascii_uppercase();
    CURRENCY_SYMBOLS
        .iter()
        .find(|(known, _)| *known == code)
        .map_or(code, |(_, symbol)| (*symbol).to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_to_fixed_point_scales() {
        let amount = decimal_to_fixed_point("10.00", "USD", 2).unwrap();
        assert_eq!(amount, FixedPointAmount::new(1000, "USD", 2));

        let zero = decimal_to_fixed_point("0", "USD", 2).unwrap();
        assert_eq!(zero.value, 0);
        assert!(zero.is_zero());

        let whole = decimal_to_fixed_point("7", "JPY", 0).unwrap();
        assert_eq!(whole.value, 7);
    }

    #[test]
    fn test_decimal_to_fixed_point_rounds_half_away_from_zero() {
        assert_eq!(decimal_to_fixed_point("0.125", "USD", 2).unwrap().value, 13);
        assert_eq!(decimal_to_fixed_point("0.124", "USD", 2).unwrap().value, 12);
        assert_eq!(decimal_to_fixed_point("2.5", "JPY", 0).unwrap().value, 3);
    }

    #[test]
    fn test_decimal_to_fixed_point_keeps_precision_across_entries() {
        let first = decimal_to_fixed_point("5.00", "USD", 2).unwrap();
        let second = decimal_to_fixed_point("7.50", "USD", 2).unwrap();
        assert_eq!(first.value, 500);
        assert_eq!(second.value, 750);

        let precise = decimal_to_fixed_point("12.34", "USD", 2).unwrap();
        assert_eq!(precise.value, 1234);
        let nano = decimal_to_fixed_point("0.000000001", "XRP", 9).unwrap();
        assert_eq!(nano.value, 1);
    }

    #[test]
    fn test_decimal_to_fixed_point_accepts_loose_input() {
        assert_eq!(decimal_to_fixed_point(" 3.10 ", "USD", 2).unwrap().value, 310);
        assert_eq!(decimal_to_fixed_point("1e2", "USD", 2).unwrap().value, 10_000);
        assert_eq!(decimal_to_fixed_point("-0", "USD", 2).unwrap().value, 0);
    }

    #[test]
    fn test_decimal_to_fixed_point_rejects_invalid() {
        assert!(matches!(
            decimal_to_fixed_point("abc", "USD", 2),
            Err(AmountError::NotNumeric { .. })
        ));
        assert!(matches!(
            decimal_to_fixed_point("", "USD", 2),
            Err(AmountError::NotNumeric { .. })
        ));
        assert!(matches!(
            decimal_to_fixed_point("1_000", "USD", 2),
            Err(AmountError::NotNumeric { .. })
        ));
        for malformed in ["1.2.3", ".", "1e", "e5", "1e+", "0x10", "1,000", "Infinity"] {
            assert!(
                matches!(parse_decimal(malformed), Err(AmountError::NotNumeric { .. })),
                "{malformed}"
            );
        }
        assert!(matches!(
            decimal_to_fixed_point("-1.00", "USD", 2),
            Err(AmountError::Negative { .. })
        ));
        assert!(matches!(
            decimal_to_fixed_point("18446744073709551616", "USD", 0),
            Err(AmountError::Overflow { .. })
        ));
        assert!(matches!(
            decimal_to_fixed_point("1", "USD", 20),
            Err(AmountError::UnsupportedScale(20))
        ));
        assert_eq!(
            decimal_to_fixed_point("x", "USD", 2).unwrap_err().kind(),
            ErrorKind::InvalidAmount
        );
    }

    #[test]
    fn test_literal_forms_accepted_like_number_coercion() {
        assert_eq!(parse_decimal("1.").unwrap(), Decimal::ONE);
        assert_eq!(parse_decimal(".5").unwrap(), Decimal::new(5, 1));
        assert_eq!(parse_decimal("+5").unwrap(), Decimal::from(5));
        assert_eq!(parse_decimal("2.5E-2").unwrap(), Decimal::new(25, 3));
        assert_eq!(parse_decimal("1e-400").unwrap(), Decimal::ZERO);
        assert_eq!(parse_decimal("0e999").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_numbers_beyond_decimal_range_overflow() {
        for huge in ["1e400", "79228162514264337593543950336", "1e99999999999"] {
            assert_eq!(
                parse_decimal(huge),
                Err(AmountError::Overflow {
                    input: huge.to_owned(),
                    asset_scale: None,
                }),
                "{huge}"
            );
        }
        assert_eq!(
            decimal_to_fixed_point("18446744073709551616", "USD", 0)
                .unwrap_err()
                .to_string(),
            "amount 18446744073709551616 is out of range for an asset of scale 0"
        );
    }

    #[test]
    fn test_display_round_trips_declared_scale() {
        for input in ["0", "0.01", "1", "10.5", "10.50", "999.99", "123456.78"] {
            let encoded = decimal_to_fixed_point(input, "USD", 2).unwrap();
            let shown = encoded.display().unwrap();
            assert_eq!(shown.amount, Decimal::from_str(input).unwrap(), "{input}");
        }
    }

    #[test]
    fn test_display_formats_with_symbol_and_grouping() {
        let shown = FixedPointAmount::new(123_456_789, "USD", 2).display().unwrap();
        assert_eq!(shown.amount.to_string(), "1234567.89");
        assert_eq!(shown.amount_with_currency, "$1,234,567.89");
        assert_eq!(shown.symbol, "$");

        let euros = FixedPointAmount::new(500, "EUR", 2).display().unwrap();
        assert_eq!(euros.amount_with_currency, "€5.00");

        let yen = FixedPointAmount::new(1500, "JPY", 0).display().unwrap();
        assert_eq!(yen.amount_with_currency, "¥1,500");
    }

    #[test]
    fn test_display_pads_fraction_to_scale() {
        let shown = FixedPointAmount::new(1000, "USD", 2).display().unwrap();
        assert_eq!(shown.amount.to_string(), "10.00");
        assert_eq!(shown.amount_with_currency, "$10.00");
    }

    #[test]
    fn test_display_unknown_code_uses_code() {
        let shown = FixedPointAmount::new(42, "ABC", 1).display().unwrap();
        assert_eq!(shown.symbol, "ABC");
        assert_eq!(shown.amount_with_currency, "ABC\u{a0}4.2");
    }

    #[test]
    fn test_display_with_custom_separators() {
        let format = AmountFormat {
            group_separator: Some('.'),
            decimal_separator: ',',
        };
        let shown = FixedPointAmount::new(123_456, "EUR", 2)
            .display_with(format)
            .unwrap();
        assert_eq!(shown.amount_with_currency, "€1.234,56");
    }

    #[test]
    fn test_currency_symbol() {
        assert_eq!(currency_symbol("USD"), "$");
        assert_eq!(currency_symbol("EUR"), "€");
        assert_eq!(currency_symbol("gbp"), "£");
        assert_eq!(currency_symbol("XYZ"), "XYZ");
    }

    #[test]
    fn test_fixed_point_wire_format() {
        let amount = FixedPointAmount::new(1000, "USD", 2);
        let json = serde_json::to_value(&amount).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "value": "1000", "assetCode": "USD", "assetScale": 2 })
        );
        let back: FixedPointAmount = serde_json::from_value(json).unwrap();
        assert_eq!(back, amount);
    }
}

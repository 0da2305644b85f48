//! Money Conversion Module
//!
//! All monetary values in the engine are `rust_decimal::Decimal`, stored as
//! PostgreSQL `NUMERIC`. This module owns the conversions at the edges:
//!
//! - client strings → amounts (strict format, no silent truncation)
//! - caller-supplied `f64` exchange rates → decimal rates
//! - debit negation (same magnitude, same scale)
//!
//! ## Usage
//! ```rust
//! use transfer_engine::money::{parse_amount, negate};
//!
//! let amount = parse_amount("10.00", 2).unwrap();
//! assert_eq!(negate(amount).to_string(), "-10.00");
//! ```

use rust_decimal::prelude::*;
use thiserror::Error;

/// Money conversion errors
#[derive(Debug, Error, PartialEq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Exchange rate {0} is not representable as a decimal")]
    RateNotRepresentable(f64),

    #[error("Exchange rate must be positive, got {0}")]
    InvalidRate(Decimal),
}

/// Parse a client amount string into a positive decimal.
///
/// Accepts plain `123` or `123.45` notation only. Signs, exponents,
/// thousands separators and bare dots (`.5`, `5.`) are rejected, and so is
/// anything with more than `max_decimals` fraction digits.
pub fn parse_amount(amount_str: &str, max_decimals: u32) -> Result<Decimal, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    if amount_str.starts_with('-') || amount_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    let parts: Vec<&str> = amount_str.split('.').collect();
    let (whole, frac) = match parts.len() {
        1 => (parts[0], ""),
        2 => {
            if parts[0].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing leading zero (e.g., use 0.5 instead of .5)".into(),
                ));
            }
            if parts[1].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
                ));
            }
            (parts[0], parts[1])
        }
        _ => return Err(MoneyError::InvalidFormat("multiple decimal points".into())),
    };

    if !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in whole part: {}",
            whole
        )));
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in fractional part: {}",
            frac
        )));
    }

    if frac.len() > max_decimals as usize {
        return Err(MoneyError::PrecisionOverflow {
            provided: frac.len() as u32,
            max: max_decimals,
        });
    }

    let amount = Decimal::from_str_exact(amount_str)
        .map_err(|e| MoneyError::InvalidFormat(e.to_string()))?;

    if amount.is_zero() {
        return Err(MoneyError::InvalidAmount);
    }

    Ok(amount)
}

/// Debit side of an amount: same magnitude and scale, opposite sign.
#[inline]
pub fn negate(amount: Decimal) -> Decimal {
    -amount
}

/// Convert a floating-point exchange rate to its stored decimal form.
///
/// The rate is taken at its shortest round-trip decimal spelling (`1.08`, not
/// `1.0800000000000000710…`) and converted exactly. NaN, infinities and values
/// that need more digits than a decimal holds are rejected, never rounded.
pub fn exchange_rate_from_f64(rate: f64) -> Result<Decimal, MoneyError> {
    if !rate.is_finite() {
        return Err(MoneyError::RateNotRepresentable(rate));
    }

    let decimal = Decimal::from_str_exact(&rate.to_string())
        .map_err(|_| MoneyError::RateNotRepresentable(rate))?;

    if decimal <= Decimal::ZERO {
        return Err(MoneyError::InvalidRate(decimal));
    }

    Ok(decimal)
}

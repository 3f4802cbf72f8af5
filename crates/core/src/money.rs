//! Monetary amount helpers.
//!
//! Amounts are exact decimals (`rust_decimal::Decimal`), never binary floats.
//! Entry amounts are limited to [`MONEY_SCALE`] fractional digits (minor units).

use core::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};

/// Number of fractional digits an entry amount may carry (cents).
pub const MONEY_SCALE: u32 = 2;

/// Check that an entry amount is non-negative and representable in minor units.
pub fn ensure_amount(field: &str, amount: Decimal) -> DomainResult<()> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(DomainError::validation(format!(
            "{field} must not be negative (got {amount})"
        )));
    }
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(DomainError::validation(format!(
            "{field} has more than {MONEY_SCALE} decimal places (got {amount})"
        )));
    }
    Ok(())
}

/// `a + b`, or a validation error naming `what` when the sum does not fit in a
/// `Decimal`.
pub fn checked_sum(what: &str, a: Decimal, b: Decimal) -> DomainResult<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| DomainError::validation(format!("{what} is out of range")))
}

/// Parse a user-entered amount such as `"1250"`, `"99.5"` or `" 0.01 "`.
///
/// Blank input is an empty column and parses as zero. The result is rescaled
/// to [`MONEY_SCALE`] so it renders as `"99.50"`.
pub fn parse_amount(input: &str) -> DomainResult<Decimal> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let mut amount = Decimal::from_str(trimmed)
        .map_err(|e| DomainError::validation(format!("invalid amount '{trimmed}': {e}")))?;
    ensure_amount("amount", amount)?;
    amount.rescale(MONEY_SCALE);
    Ok(amount)
}

//! Conversion between whole-unit decimals and on-chain base units.
//!
//! Conversions into base units round toward zero so a payout never exceeds
//! the amount the settlement decided on.

use crate::U256;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use thiserror::Error;

/// Errors converting between decimals and base units.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitsError {
	#[error("Negative amount: {0}")]
	Negative(Decimal),
	#[error("Amount {0} does not fit in {1} decimals")]
	Overflow(String, u8),
}

/// Converts a decimal amount into base units with `decimals` places,
/// truncating any extra precision.
pub fn parse_units(amount: Decimal, decimals: u8) -> Result<U256, UnitsError> {
	if amount.is_sign_negative() && !amount.is_zero() {
		return Err(UnitsError::Negative(amount));
	}

	let truncated = amount.round_dp_with_strategy(decimals as u32, RoundingStrategy::ToZero);
	let mantissa = u128::try_from(truncated.mantissa())
		.map_err(|_| UnitsError::Overflow(amount.to_string(), decimals))?;
	let missing_places = (decimals as u32).saturating_sub(truncated.scale());

	U256::from(10u8)
		.checked_pow(U256::from(missing_places))
		.and_then(|factor| U256::from(mantissa).checked_mul(factor))
		.ok_or_else(|| UnitsError::Overflow(amount.to_string(), decimals))
}

/// Converts base units into a decimal amount with `decimals` places.
pub fn format_units(units: U256, decimals: u8) -> Result<Decimal, UnitsError> {
	let overflow = || UnitsError::Overflow(units.to_string(), decimals);
	let value = u128::try_from(units).map_err(|_| overflow())?;
	let value = i128::try_from(value).map_err(|_| overflow())?;
	Decimal::try_from_i128_with_scale(value, decimals as u32)
		.map(|d| d.normalize())
		.map_err(|_| overflow())
}

/// Parses a user-supplied numeric value, accepting JSON strings and numbers.
///
/// Returns `None` for anything that is not a finite decimal.
pub fn parse_decimal(value: &serde_json::Value) -> Option<Decimal> {
	let text = match value {
		serde_json::Value::String(s) => s.trim().to_string(),
		serde_json::Value::Number(n) => n.to_string(),
		_ => return None,
	};
	if text.is_empty() {
		return None;
	}
	Decimal::from_str(&text)
		.or_else(|_| Decimal::from_scientific(&text))
		.ok()
}

//! Trimmed-mean consensus over independently fetched prices.
//!
//! Only the lowest prices are trimmed. A source quoting too high costs the
//! payout wallet nothing extra because the settlement later pays the lower
//! of the computed amount and the user's own prediction.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use shift_types::{ConsensusRate, Price};
use thiserror::Error;

/// Reasons no consensus rate could be produced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConsensusError {
	#[error("Trim fraction must be in [0, 1), got {0}")]
	InvalidTrimFraction(Decimal),
	#[error("Insufficient price data: {got} of {required} required sources available")]
	InsufficientData { got: usize, required: usize },
	#[error("Trimming {trimmed} of {count} prices leaves nothing to average")]
	AllValuesTrimmed { count: usize, trimmed: usize },
}

/// Computes the mean of `prices` after discarding the lowest
/// `floor(len * trim_fraction)` values.
///
/// At least `min_sources` prices are required, and never fewer than one.
pub fn compute_consensus(
	mut prices: Vec<Price>,
	trim_fraction: Decimal,
	min_sources: usize,
) -> Result<ConsensusRate, ConsensusError> {
	if trim_fraction < Decimal::ZERO || trim_fraction >= Decimal::ONE {
		return Err(ConsensusError::InvalidTrimFraction(trim_fraction));
	}

	let count = prices.len();
	let required = min_sources.max(1);
	if count < required {
		return Err(ConsensusError::InsufficientData {
			got: count,
			required,
		});
	}

	let trimmed = (Decimal::from(count) * trim_fraction)
		.floor()
		.to_usize()
		.unwrap_or(count);
	if trimmed >= count {
		return Err(ConsensusError::AllValuesTrimmed { count, trimmed });
	}

	prices.sort_by(|a, b| a.value.cmp(&b.value));
	let used = count - trimmed;
	let sum: Decimal = prices[trimmed..].iter().map(|price| price.value).sum();

	Ok(ConsensusRate {
		rate: sum / Decimal::from(used),
		used,
		discarded: trimmed,
		inputs: prices,
	})
}

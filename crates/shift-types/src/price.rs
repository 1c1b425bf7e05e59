//! Price and consensus types.
//!
//! Prices are arbitrary-precision decimals. A [`Price`] always carries the
//! source that produced it and when it was fetched, so a consensus result
//! can be audited back to its inputs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum number of successful sources required before a consensus rate
/// is produced.
pub const DEFAULT_MIN_SOURCES: usize = 3;

/// Trim fraction used for routes with four price sources.
pub const TRIM_FOUR_SOURCES: Decimal = Decimal::from_parts(26, 0, 0, false, 2);

/// Trim fraction used for routes with five or six price sources.
pub const TRIM_SIX_SOURCES: Decimal = Decimal::from_parts(41, 0, 0, false, 2);

/// Returns the operational trim fraction for a route with `source_count`
/// configured sources.
///
/// Routes with fewer than four sources are not trimmed.
pub fn default_trim_fraction(source_count: usize) -> Decimal {
	match source_count {
		0..=3 => Decimal::ZERO,
		4 => TRIM_FOUR_SOURCES,
		_ => TRIM_SIX_SOURCES,
	}
}

/// Identifier of a configured price source, e.g. `"binance"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for SourceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for SourceId {
	fn from(s: &str) -> Self {
		Self::new(s)
	}
}

/// A price observed from one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
	pub value: Decimal,
	pub source: SourceId,
	/// Unix timestamp (seconds) of the observation.
	pub fetched_at: u64,
}

impl Price {
	pub fn new(source: SourceId, value: Decimal, fetched_at: u64) -> Self {
		Self {
			value,
			source,
			fetched_at,
		}
	}
}

/// The aggregated exchange rate used for a single settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusRate {
	pub rate: Decimal,
	/// Number of prices that contributed to the mean (always at least one).
	pub used: usize,
	/// Number of lowest prices dropped by the trim.
	pub discarded: usize,
	/// Every price handed to the aggregator, in ascending order.
	pub inputs: Vec<Price>,
}

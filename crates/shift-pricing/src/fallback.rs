//! Fallback handling around price source fetches.
//!
//! A failed fetch is replaced, in order, by the source's last known good
//! price or its configured fallback price. Only when neither exists does the
//! failure reach the consensus step.

use crate::{fetch_quote, PriceQuote, PriceSourceError, PriceSourceInterface, SourceCache};
use rust_decimal::Decimal;
use shift_types::{current_timestamp, toml_decimal, Price, SourceId};

/// What to return when a source fails and has no cached price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FallbackPolicy {
	/// Surface the failure.
	#[default]
	None,
	/// Substitute a fixed price.
	Fixed(Decimal),
}

impl FallbackPolicy {
	/// Reads the optional `fallback_price` key of a source table.
	pub fn from_config(config: &toml::Value) -> Result<Self, PriceSourceError> {
		match config.get("fallback_price") {
			None => Ok(FallbackPolicy::None),
			Some(value) => toml_decimal(value)
				.filter(|price| !price.is_sign_negative())
				.map(FallbackPolicy::Fixed)
				.ok_or_else(|| {
					PriceSourceError::Configuration(format!(
						"fallback_price must be a non-negative decimal, got {}",
						value
					))
				}),
		}
	}
}

/// Result of a fetch after fallback handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
	Fresh(Price),
	/// The fetch failed and `price` came from the cache or the fallback.
	Substituted {
		price: Price,
		reason: PriceSourceError,
	},
	Failed {
		source: SourceId,
		reason: PriceSourceError,
	},
}

impl FetchOutcome {
	pub fn source(&self) -> &SourceId {
		match self {
			FetchOutcome::Fresh(price) | FetchOutcome::Substituted { price, .. } => &price.source,
			FetchOutcome::Failed { source, .. } => source,
		}
	}

	pub fn price(&self) -> Option<&Price> {
		match self {
			FetchOutcome::Fresh(price) | FetchOutcome::Substituted { price, .. } => Some(price),
			FetchOutcome::Failed { .. } => None,
		}
	}

	pub fn into_result(self) -> Result<Price, PriceSourceError> {
		match self {
			FetchOutcome::Fresh(price) | FetchOutcome::Substituted { price, .. } => Ok(price),
			FetchOutcome::Failed { reason, .. } => Err(reason),
		}
	}
}

/// Applies the cache and fallback policy to a fetched quote. Successful
/// quotes are written to the cache.
pub fn resolve_quote(
	quote: PriceQuote,
	cache: &SourceCache,
	fallback: FallbackPolicy,
) -> FetchOutcome {
	let (source, reason) = match quote {
		PriceQuote::Ok(price) => {
			cache.store(price.clone());
			return FetchOutcome::Fresh(price);
		},
		PriceQuote::Failed { source, reason } => (source, reason),
	};

	if let Some(price) = cache.get(&source) {
		tracing::warn!(
			source = %source,
			error = %reason,
			price = %price.value,
			fetched_at = price.fetched_at,
			"Price fetch failed, using last known price"
		);
		return FetchOutcome::Substituted { price, reason };
	}

	match fallback {
		FallbackPolicy::Fixed(value) => {
			tracing::warn!(
				source = %source,
				error = %reason,
				price = %value,
				"Price fetch failed, using configured fallback price"
			);
			FetchOutcome::Substituted {
				price: Price::new(source, value, current_timestamp()),
				reason,
			}
		},
		FallbackPolicy::None => {
			tracing::warn!(source = %source, error = %reason, "Price fetch failed, no fallback");
			FetchOutcome::Failed { source, reason }
		},
	}
}

/// Fetches a price, falling back to the cache or the fallback policy.
///
/// With [`FallbackPolicy::Fixed`] this never fails.
pub async fn fetch_with_fallback(
	source: &dyn PriceSourceInterface,
	source_id: &SourceId,
	cache: &SourceCache,
	fallback: FallbackPolicy,
) -> Result<Price, PriceSourceError> {
	let quote = fetch_quote(source, source_id, None).await;
	resolve_quote(quote, cache, fallback).into_result()
}

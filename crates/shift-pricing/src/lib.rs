//! Price module for the shift settlement backend.
//!
//! A swap route's exchange rate is the consensus of several independent
//! price sources: market-data APIs and on-chain aggregators. Each source is
//! a [`PriceSourceInterface`] implementation that yields one decimal price or
//! a typed failure. Failures are smoothed over by the last-known-good
//! [`SourceCache`] and an optional per-source fallback price, and the
//! surviving prices are combined by [`compute_consensus`] into a trimmed
//! mean.

use async_trait::async_trait;
use rust_decimal::Decimal;
use shift_types::{
	current_timestamp, ConfigSchema, ImplementationRegistry, NetworksConfig, Price, SourceId,
};
use std::time::Duration;
use thiserror::Error;

pub mod cache;
pub mod consensus;
pub mod fallback;
pub mod service;

pub mod implementations {
	pub mod binance;
	pub mod chainlink;
	pub mod coingecko;
	pub mod coinmarketcap;
	pub mod coinpaprika;
	pub mod fixed;
	pub mod ftso;
	pub(crate) mod http;
	pub mod okx;
	pub(crate) mod rpc;
}

pub use cache::SourceCache;
pub use consensus::{compute_consensus, ConsensusError};
pub use fallback::{fetch_with_fallback, resolve_quote, FallbackPolicy, FetchOutcome};
pub use service::{PriceService, PricedSource, RouteConsensus, RoutePricing};

/// Reasons a single price source can fail.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PriceSourceError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Unexpected HTTP status: {0}")]
	HttpStatus(u16),
	#[error("Missing field: {0}")]
	MissingField(String),
	#[error("Invalid price: {0}")]
	InvalidPrice(String),
	#[error("Timed out after {0}s")]
	Timeout(u64),
	#[error("Chain error: {0}")]
	Chain(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Outcome of one price source fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceQuote {
	Ok(Price),
	Failed {
		source: SourceId,
		reason: PriceSourceError,
	},
}

impl PriceQuote {
	/// Wraps an adapter result, rejecting negative prices.
	pub fn from_result(source: SourceId, result: Result<Decimal, PriceSourceError>) -> Self {
		match result {
			Ok(value) if value.is_sign_negative() && !value.is_zero() => PriceQuote::Failed {
				source,
				reason: PriceSourceError::InvalidPrice(format!("negative price {}", value)),
			},
			Ok(value) => PriceQuote::Ok(Price::new(source, value, current_timestamp())),
			Err(reason) => PriceQuote::Failed { source, reason },
		}
	}

	/// Classifies a reading from a source that reports failure as `-1`.
	/// Any negative value is a failure.
	pub fn from_legacy(source: SourceId, value: Decimal) -> Self {
		Self::from_result(source, Ok(value))
	}

	pub fn source(&self) -> &SourceId {
		match self {
			PriceQuote::Ok(price) => &price.source,
			PriceQuote::Failed { source, .. } => source,
		}
	}

	pub fn into_result(self) -> Result<Price, PriceSourceError> {
		match self {
			PriceQuote::Ok(price) => Ok(price),
			PriceQuote::Failed { reason, .. } => Err(reason),
		}
	}
}

/// Interface implemented by every price source.
#[async_trait]
pub trait PriceSourceInterface: Send + Sync {
	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Fetches the current price. Issues at most one network request or one
	/// on-chain read.
	async fn fetch_price(&self) -> Result<Decimal, PriceSourceError>;
}

/// Fetches one quote, optionally bounded by `timeout`.
pub async fn fetch_quote(
	source: &dyn PriceSourceInterface,
	source_id: &SourceId,
	timeout: Option<Duration>,
) -> PriceQuote {
	let result = match timeout {
		Some(limit) => tokio::time::timeout(limit, source.fetch_price())
			.await
			.unwrap_or(Err(PriceSourceError::Timeout(limit.as_secs()))),
		None => source.fetch_price().await,
	};
	PriceQuote::from_result(source_id.clone(), result)
}

/// Factory function creating a price source from its configuration table.
pub type PriceSourceFactory =
	fn(&toml::Value, &NetworksConfig) -> Result<Box<dyn PriceSourceInterface>, PriceSourceError>;

/// Registry trait for price source implementations.
pub trait PriceSourceRegistry: ImplementationRegistry<Factory = PriceSourceFactory> {}

/// Get all registered price source implementations.
pub fn get_all_implementations() -> Vec<(&'static str, PriceSourceFactory)> {
	use implementations::{
		binance, chainlink, coingecko, coinmarketcap, coinpaprika, fixed, ftso, okx,
	};

	vec![
		(binance::Registry::NAME, binance::Registry::factory()),
		(chainlink::Registry::NAME, chainlink::Registry::factory()),
		(coingecko::Registry::NAME, coingecko::Registry::factory()),
		(coinmarketcap::Registry::NAME, coinmarketcap::Registry::factory()),
		(coinpaprika::Registry::NAME, coinpaprika::Registry::factory()),
		(fixed::Registry::NAME, fixed::Registry::factory()),
		(ftso::Registry::NAME, ftso::Registry::factory()),
		(okx::Registry::NAME, okx::Registry::factory()),
	]
}

#[cfg(test)]
pub(crate) mod test_support {
	use super::*;
	use shift_types::Schema;
	use std::sync::Mutex;

	struct EmptySchema;

	impl ConfigSchema for EmptySchema {
		fn validate(&self, config: &toml::Value) -> Result<(), shift_types::ValidationError> {
			Schema::new(vec![], vec![]).validate(config)
		}
	}

	/// Source returning scripted results in order, repeating the last one.
	pub struct ScriptedSource {
		results: Mutex<Vec<Result<Decimal, PriceSourceError>>>,
		delay: Option<Duration>,
	}

	impl ScriptedSource {
		pub fn new(results: Vec<Result<Decimal, PriceSourceError>>) -> Self {
			Self {
				results: Mutex::new(results),
				delay: None,
			}
		}

		pub fn ok(value: Decimal) -> Self {
			Self::new(vec![Ok(value)])
		}

		pub fn failing() -> Self {
			Self::new(vec![Err(PriceSourceError::Network("connection refused".into()))])
		}

		pub fn slow(value: Decimal, delay: Duration) -> Self {
			Self {
				delay: Some(delay),
				..Self::ok(value)
			}
		}
	}

	#[async_trait]
	impl PriceSourceInterface for ScriptedSource {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(EmptySchema)
		}

		async fn fetch_price(&self) -> Result<Decimal, PriceSourceError> {
			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}
			let mut results = self.results.lock().unwrap();
			if results.len() > 1 {
				results.remove(0)
			} else {
				results[0].clone()
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::test_support::ScriptedSource;
	use super::*;
	use rust_decimal_macros::dec;

	#[test]
	fn test_legacy_sentinel_is_failure() {
		let quote = PriceQuote::from_legacy(SourceId::from("okx"), dec!(-1));
		assert!(matches!(
			quote,
			PriceQuote::Failed {
				reason: PriceSourceError::InvalidPrice(_),
				..
			}
		));

		let quote = PriceQuote::from_legacy(SourceId::from("okx"), dec!(0.42));
		assert_eq!(quote.source().as_str(), "okx");
		assert_eq!(quote.into_result().unwrap().value, dec!(0.42));
	}

	#[tokio::test]
	async fn test_fetch_quote_times_out() {
		let source = ScriptedSource::slow(dec!(1), Duration::from_secs(5));
		let quote =
			fetch_quote(&source, &SourceId::from("slow"), Some(Duration::from_millis(20))).await;
		assert!(matches!(
			quote,
			PriceQuote::Failed {
				reason: PriceSourceError::Timeout(_),
				..
			}
		));
	}

	#[test]
	fn test_all_implementations_registered() {
		let names: Vec<_> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(
			names,
			vec![
				"binance",
				"chainlink",
				"coingecko",
				"coinmarketcap",
				"coinpaprika",
				"fixed",
				"ftso",
				"okx"
			]
		);
	}
}

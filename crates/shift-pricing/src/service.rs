//! Route-level price consensus.

use crate::{
	compute_consensus, fetch_quote, resolve_quote, ConsensusError, FallbackPolicy, FetchOutcome,
	PriceQuote, PriceSourceError, PriceSourceInterface, SourceCache,
};
use futures::future::join_all;
use rust_decimal::Decimal;
use shift_types::{ConsensusRate, SourceId, SourceQuote};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A configured source together with its fallback policy.
#[derive(Clone)]
pub struct PricedSource {
	pub source: Arc<dyn PriceSourceInterface>,
	pub fallback: FallbackPolicy,
}

/// The pricing parameters of one swap route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePricing {
	pub sources: Vec<SourceId>,
	pub trim_fraction: Decimal,
	pub min_sources: usize,
}

/// A consensus rate with the per-source outcomes it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConsensus {
	pub consensus: ConsensusRate,
	pub quotes: Vec<SourceQuote>,
}

/// Fans out to a route's price sources and aggregates their prices.
pub struct PriceService {
	sources: HashMap<SourceId, PricedSource>,
	cache: Arc<SourceCache>,
	fetch_timeout: Duration,
}

impl PriceService {
	pub fn new(
		sources: HashMap<SourceId, PricedSource>,
		cache: Arc<SourceCache>,
		fetch_timeout: Duration,
	) -> Self {
		Self {
			sources,
			cache,
			fetch_timeout,
		}
	}

	pub fn cache(&self) -> &Arc<SourceCache> {
		&self.cache
	}

	/// Fetches every source of a route concurrently and computes the
	/// consensus rate from the prices that survived fallback handling.
	pub async fn consensus_for(
		&self,
		route: &RoutePricing,
	) -> Result<RouteConsensus, ConsensusError> {
		let outcomes = join_all(route.sources.iter().map(|id| self.fetch_source(id))).await;

		let quotes = outcomes.iter().map(to_source_quote).collect();
		let prices = outcomes
			.into_iter()
			.filter_map(|outcome| outcome.into_result().ok())
			.collect::<Vec<_>>();

		tracing::debug!(
			requested = route.sources.len(),
			available = prices.len(),
			"Collected route prices"
		);

		let consensus = compute_consensus(prices, route.trim_fraction, route.min_sources)?;
		tracing::info!(
			rate = %consensus.rate,
			used = consensus.used,
			discarded = consensus.discarded,
			"Computed consensus rate"
		);
		Ok(RouteConsensus { consensus, quotes })
	}

	async fn fetch_source(&self, source_id: &SourceId) -> FetchOutcome {
		let Some(priced) = self.sources.get(source_id) else {
			return FetchOutcome::Failed {
				source: source_id.clone(),
				reason: PriceSourceError::Configuration(format!(
					"Unknown price source '{}'",
					source_id
				)),
			};
		};

		let quote: PriceQuote =
			fetch_quote(priced.source.as_ref(), source_id, Some(self.fetch_timeout)).await;
		resolve_quote(quote, &self.cache, priced.fallback)
	}
}

fn to_source_quote(outcome: &FetchOutcome) -> SourceQuote {
	match outcome {
		FetchOutcome::Fresh(price) => SourceQuote {
			source: price.source.clone(),
			price: Some(price.value),
			substituted: false,
			error: None,
		},
		FetchOutcome::Substituted { price, reason } => SourceQuote {
			source: price.source.clone(),
			price: Some(price.value),
			substituted: true,
			error: Some(reason.to_string()),
		},
		FetchOutcome::Failed { source, reason } => SourceQuote {
			source: source.clone(),
			price: None,
			substituted: false,
			error: Some(reason.to_string()),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::ScriptedSource;
	use rust_decimal_macros::dec;
	use shift_types::Price;

	fn service(entries: Vec<(&str, ScriptedSource, FallbackPolicy)>) -> PriceService {
		let sources = entries
			.into_iter()
			.map(|(name, source, fallback)| {
				(
					SourceId::from(name),
					PricedSource {
						source: Arc::new(source),
						fallback,
					},
				)
			})
			.collect();
		PriceService::new(sources, Arc::new(SourceCache::new()), Duration::from_millis(200))
	}

	fn route(names: &[&str], trim_fraction: Decimal, min_sources: usize) -> RoutePricing {
		RoutePricing {
			sources: names.iter().map(|n| SourceId::from(*n)).collect(),
			trim_fraction,
			min_sources,
		}
	}

	#[tokio::test]
	async fn test_consensus_over_healthy_sources() {
		let service = service(vec![
			("a", ScriptedSource::ok(dec!(0.40)), FallbackPolicy::None),
			("b", ScriptedSource::ok(dec!(0.50)), FallbackPolicy::None),
			("c", ScriptedSource::ok(dec!(0.52)), FallbackPolicy::None),
			("d", ScriptedSource::ok(dec!(0.54)), FallbackPolicy::None),
		]);

		let result = service
			.consensus_for(&route(&["a", "b", "c", "d"], dec!(0.26), 3))
			.await
			.unwrap();

		assert_eq!(result.consensus.rate, dec!(0.52));
		assert_eq!(result.quotes.len(), 4);
		assert!(result.quotes.iter().all(|q| !q.substituted));
		assert_eq!(service.cache().len(), 4);
	}

	#[tokio::test]
	async fn test_failures_below_minimum_are_unavailable() {
		let service = service(vec![
			("a", ScriptedSource::ok(dec!(1)), FallbackPolicy::None),
			("b", ScriptedSource::failing(), FallbackPolicy::None),
			("c", ScriptedSource::failing(), FallbackPolicy::None),
		]);

		let err = service
			.consensus_for(&route(&["a", "b", "c"], Decimal::ZERO, 3))
			.await
			.unwrap_err();

		assert_eq!(err, ConsensusError::InsufficientData { got: 1, required: 3 });
	}

	#[tokio::test]
	async fn test_slow_and_failing_sources_use_substitutes() {
		let service = service(vec![
			("a", ScriptedSource::ok(dec!(2)), FallbackPolicy::None),
			(
				"slow",
				ScriptedSource::slow(dec!(100), Duration::from_secs(10)),
				FallbackPolicy::Fixed(dec!(2)),
			),
			("down", ScriptedSource::failing(), FallbackPolicy::None),
		]);
		service
			.cache()
			.store(Price::new(SourceId::from("down"), dec!(2), 1));

		let result = service
			.consensus_for(&route(&["a", "slow", "down"], Decimal::ZERO, 3))
			.await
			.unwrap();

		assert_eq!(result.consensus.rate, dec!(2));
		let substituted: Vec<_> = result
			.quotes
			.iter()
			.filter(|q| q.substituted)
			.map(|q| q.source.as_str())
			.collect();
		assert_eq!(substituted, vec!["slow", "down"]);
	}

	#[tokio::test]
	async fn test_unknown_source_reported_as_failed() {
		let service = service(vec![("a", ScriptedSource::ok(dec!(1)), FallbackPolicy::None)]);

		let err = service
			.consensus_for(&route(&["a", "missing"], Decimal::ZERO, 2))
			.await
			.unwrap_err();
		assert_eq!(err, ConsensusError::InsufficientData { got: 1, required: 2 });
	}
}

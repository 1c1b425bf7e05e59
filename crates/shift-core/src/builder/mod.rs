//! Builder for assembling a swap engine from configuration.
//!
//! Storage backends and price sources are created through factory maps so
//! the service binary decides which implementations are available. Chain
//! readers and payout wallets are always the alloy implementations, created
//! for the chains the configured routes actually use.

use crate::engine::{Route, SwapEngine};
use crate::ledger::IdempotencyLedger;
use shift_config::Config;
use shift_delivery::implementations::evm::alloy::{create_alloy_payouts, PayoutTiming};
use shift_delivery::{PayoutDispatcher, PayoutInterface};
use shift_deposit::implementations::alloy::create_readers;
use shift_deposit::DepositVerifier;
use shift_pricing::{
	FallbackPolicy, PriceService, PriceSourceError, PriceSourceInterface, PricedSource,
	SourceCache,
};
use shift_storage::{StorageError, StorageInterface, StorageService};
use shift_types::{NetworksConfig, SourceId};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while building a swap engine.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
}

/// Factory functions available to the builder, keyed by implementation name.
pub struct SwapFactories<SF, PF> {
	pub storage_factories: HashMap<String, SF>,
	pub price_factories: HashMap<String, PF>,
}

/// Builder for constructing a [`SwapEngine`].
pub struct SwapBuilder {
	config: Config,
}

impl SwapBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	pub fn build<SF, PF>(
		self,
		factories: SwapFactories<SF, PF>,
	) -> Result<SwapEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		PF: Fn(
			&toml::Value,
			&NetworksConfig,
		) -> Result<Box<dyn PriceSourceInterface>, PriceSourceError>,
	{
		let storage = Arc::new(self.build_storage(&factories.storage_factories)?);
		let prices = self.build_prices(&factories.price_factories)?;

		let source_chains: BTreeSet<u64> = self
			.config
			.routes
			.values()
			.map(|route| route.source_chain_id)
			.collect();
		let readers = create_readers(source_chains, &self.config.networks).map_err(|e| {
			tracing::error!(component = "deposit", error = %e, "Failed to create chain readers");
			BuilderError::Config(format!("Failed to create chain readers: {}", e))
		})?;
		for chain_id in readers.keys() {
			tracing::info!(component = "deposit", chain_id = chain_id, "Loaded");
		}

		let payout = &self.config.payout;
		let timing = PayoutTiming {
			confirmations: payout.confirmations,
			timeout: Duration::from_secs(payout.timeout_seconds),
			poll_interval: Duration::from_secs(payout.poll_interval_seconds),
		};
		let destination_chains: BTreeSet<u64> = self
			.config
			.routes
			.values()
			.map(|route| route.destination_chain_id)
			.collect();
		let wallets = create_alloy_payouts(
			destination_chains,
			&self.config.networks,
			&payout.private_key,
			&payout.network_keys,
			timing,
		)
		.map_err(|e| {
			tracing::error!(component = "payout", error = %e, "Failed to create payout wallets");
			BuilderError::Config(format!("Failed to create payout wallets: {}", e))
		})?;
		for (chain_id, wallet) in &wallets {
			tracing::info!(
				component = "payout",
				chain_id = chain_id,
				address = %wallet.address(),
				"Loaded"
			);
		}

		let routes = self
			.config
			.routes
			.iter()
			.map(|(name, route)| {
				let fee_rate = self.config.fee_rate_for(route);
				let route = Route::from_config(name, route, &self.config.settlement, fee_rate);
				(name.clone(), route)
			})
			.collect();

		let ledger = IdempotencyLedger::new(storage.clone(), self.config.settlement.idempotency);
		tracing::info!(
			component = "ledger",
			mode = ?self.config.settlement.idempotency,
			"Loaded"
		);

		Ok(SwapEngine::new(
			routes,
			storage,
			Arc::new(DepositVerifier::new(readers)),
			Arc::new(prices),
			Arc::new(PayoutDispatcher::new(wallets)),
			Arc::new(ledger),
			Duration::from_secs(self.config.storage.cleanup_interval_seconds),
		))
	}

	fn build_storage<SF>(
		&self,
		factories: &HashMap<String, SF>,
	) -> Result<StorageService, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			if let Some(factory) = factories.get(name) {
				match factory(config) {
					Ok(implementation) => {
						storage_impls.insert(name.clone(), implementation);
						let is_primary = &self.config.storage.primary == name;
						tracing::info!(
							component = "storage",
							implementation = %name,
							enabled = %is_primary,
							"Loaded"
						);
					}
					Err(e) => {
						tracing::error!(
							component = "storage",
							implementation = %name,
							error = %e,
							"Failed to create storage implementation"
						);
						return Err(BuilderError::Config(format!(
							"Failed to create storage implementation '{}': {}",
							name, e
						)));
					}
				}
			}
		}

		let primary_storage = &self.config.storage.primary;
		let backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' failed to load or has invalid configuration",
				primary_storage
			))
		})?;
		Ok(StorageService::new(backend))
	}

	fn build_prices<PF>(
		&self,
		factories: &HashMap<String, PF>,
	) -> Result<PriceService, BuilderError>
	where
		PF: Fn(
			&toml::Value,
			&NetworksConfig,
		) -> Result<Box<dyn PriceSourceInterface>, PriceSourceError>,
	{
		let pricing = &self.config.pricing;
		let mut sources = HashMap::new();
		for (name, config) in &pricing.sources {
			let kind = pricing.source_kind(name).ok_or_else(|| {
				BuilderError::Config(format!("Price source '{}' has no kind", name))
			})?;
			let factory = factories.get(kind).ok_or_else(|| {
				BuilderError::Config(format!(
					"Price source '{}' has unknown kind '{}'",
					name, kind
				))
			})?;

			let created = factory(config, &self.config.networks).and_then(|source| {
				FallbackPolicy::from_config(config).map(|fallback| (source, fallback))
			});
			match created {
				Ok((source, fallback)) => {
					tracing::info!(
						component = "pricing",
						implementation = %kind,
						source = %name,
						fallback = ?fallback,
						"Loaded"
					);
					sources.insert(
						SourceId::new(name.as_str()),
						PricedSource {
							source: Arc::from(source),
							fallback,
						},
					);
				}
				Err(e) => {
					tracing::error!(
						component = "pricing",
						implementation = %kind,
						source = %name,
						error = %e,
						"Failed to create price source"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create price source '{}': {}",
						name, e
					)));
				}
			}
		}

		Ok(PriceService::new(
			sources,
			Arc::new(SourceCache::new()),
			Duration::from_secs(pricing.timeout_seconds),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;
	use std::str::FromStr;

	const CONFIG: &str = r#"
[service]
id = "shift-builder-test"

[networks.42161]
rpc_url = "http://localhost:8545"

[networks.30]
rpc_url = "http://localhost:8546"

[pricing]
[pricing.sources.pinned]
kind = "fixed"
price = "0.0000155"
[pricing.sources.pinned_backup]
kind = "fixed"
price = "0.0000157"
fallback_price = "0.0000156"

[routes.usdc-rbtc]
source_chain_id = 42161
destination_chain_id = 30
direction = "multiply"
deposit_address = "0xf0f994B4A8dB86A46a1eD4F12263c795b26703Ca"
price_sources = ["pinned", "pinned_backup"]
min_sources = 2
fee_rate = "0.02"
[routes.usdc-rbtc.deposit_asset]
symbol = "USDC"
address = "0xaf88d065e77c8cC2239327C5EDb3A432268e5831"
decimals = 6
[routes.usdc-rbtc.payout_asset]
symbol = "RBTC"
decimals = 18

[payout]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"

[storage]
primary = "memory"
cleanup_interval_seconds = 0
[storage.implementations.memory]
"#;

	type Factories =
		SwapFactories<shift_storage::StorageFactory, shift_pricing::PriceSourceFactory>;

	fn factories() -> Factories {
		SwapFactories {
			storage_factories: shift_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			price_factories: shift_pricing::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	#[tokio::test]
	async fn test_builds_engine_from_config() {
		let config = Config::from_str(CONFIG).unwrap();
		let engine = SwapBuilder::new(config).build(factories()).unwrap();

		assert_eq!(engine.route_names(), vec!["usdc-rbtc"]);
		let route = engine.route("usdc-rbtc").unwrap();
		assert_eq!(route.settlement.fee_rate, dec!(0.02));
		assert_eq!(route.pricing.sources.len(), 2);
		assert_eq!(route.destination_chain_id, 30);

		let prices = engine.route_prices("usdc-rbtc").await.unwrap();
		assert_eq!(prices.consensus.rate, dec!(0.0000156));
	}

	#[test]
	fn test_unknown_source_kind_rejected() {
		let config = Config::from_str(&CONFIG.replace("kind = \"fixed\"", "kind = \"oracle\""));
		let Ok(config) = config else {
			// Rejected while loading the configuration already.
			return;
		};
		assert!(matches!(
			SwapBuilder::new(config).build(factories()),
			Err(BuilderError::Config(_))
		));
	}

	#[test]
	fn test_missing_primary_storage_rejected() {
		let config = Config::from_str(CONFIG).unwrap();
		let mut factories = factories();
		factories.storage_factories.remove("memory");

		let err = SwapBuilder::new(config).build(factories).err().unwrap();
		assert!(err.to_string().contains("Primary storage 'memory'"));
	}
}

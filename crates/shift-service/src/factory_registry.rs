//! Registry of the storage and price source implementations compiled into
//! the service.
//!
//! Configuration names implementations by string; the registry resolves
//! those names to factory functions before the engine is built, so an
//! unknown name fails at startup with the list of available ones.

use shift_config::Config;
use shift_core::{SwapBuilder, SwapEngine, SwapFactories};
use shift_pricing::PriceSourceFactory;
use shift_storage::StorageFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Global registry for all implementation factories
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub price: HashMap<String, PriceSourceFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
			price: HashMap::new(),
		}
	}

	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	pub fn register_price(&mut self, name: impl Into<String>, factory: PriceSourceFactory) {
		self.price.insert(name.into(), factory);
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Initialize the global registry with all available implementations
pub fn initialize_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in shift_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factory) in shift_pricing::get_all_implementations() {
			tracing::debug!("Registering price source implementation: {}", name);
			registry.register_price(name, factory);
		}

		registry
	})
}

pub fn get_registry() -> &'static FactoryRegistry {
	initialize_registry()
}

/// Collects the factories for `$names`, failing on the first unknown name.
macro_rules! build_factories {
	($registry:expr, $names:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $names {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.to_string(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Builds the swap engine using the registry and config.
pub fn build_engine_from_config(config: Config) -> Result<SwapEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let storage_factories = build_factories!(
		registry,
		config.storage.implementations.keys(),
		storage,
		"storage"
	);
	let price_kinds = config
		.pricing
		.sources
		.keys()
		.filter_map(|name| config.pricing.source_kind(name));
	let price_factories = build_factories!(registry, price_kinds, price, "price source");

	let factories = SwapFactories {
		storage_factories,
		price_factories,
	};
	Ok(SwapBuilder::new(config).build(factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::str::FromStr;

	#[test]
	fn test_registry_knows_every_implementation() {
		let registry = get_registry();
		assert!(registry.storage.contains_key("memory"));
		assert!(registry.storage.contains_key("file"));
		for kind in ["binance", "chainlink", "coingecko", "fixed", "ftso", "okx"] {
			assert!(registry.price.contains_key(kind), "missing {}", kind);
		}
	}

	#[test]
	fn test_unknown_storage_lists_available() {
		let config = Config::from_str(
			&crate::server::tests::CONFIG
				.replace("primary = \"memory\"", "primary = \"redis\"")
				.replace("[storage.implementations.memory]", "[storage.implementations.redis]"),
		)
		.unwrap();

		let err = build_engine_from_config(config).err().unwrap().to_string();
		assert_eq!(
			err,
			"Unknown storage implementation 'redis'. Available: [file, memory]"
		);
	}
}

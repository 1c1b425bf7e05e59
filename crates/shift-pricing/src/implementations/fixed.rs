//! Fixed price source for development and pinned pairs.

use crate::{PriceSourceError, PriceSourceInterface};
use async_trait::async_trait;
use rust_decimal::Decimal;
use shift_types::{
	toml_decimal, ConfigSchema, Field, FieldType, NetworksConfig, Schema, ValidationError,
};

/// Always returns the configured `price`.
pub struct FixedSource {
	price: Decimal,
}

impl FixedSource {
	pub fn new(price: Decimal) -> Self {
		Self { price }
	}
}

#[async_trait]
impl PriceSourceInterface for FixedSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FixedSchema)
	}

	async fn fetch_price(&self) -> Result<Decimal, PriceSourceError> {
		Ok(self.price)
	}
}

pub struct FixedSchema;

impl ConfigSchema for FixedSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let non_negative = || FieldType::Decimal {
			min: Some(Decimal::ZERO),
			max: None,
		};
		Schema::new(
			vec![Field::new("price", non_negative())],
			vec![Field::new("fallback_price", non_negative())],
		)
		.validate(config)
	}
}

pub fn create_source(
	config: &toml::Value,
	_networks: &NetworksConfig,
) -> Result<Box<dyn PriceSourceInterface>, PriceSourceError> {
	FixedSchema
		.validate(config)
		.map_err(|e| PriceSourceError::Configuration(e.to_string()))?;
	let price = config
		.get("price")
		.and_then(toml_decimal)
		.ok_or_else(|| PriceSourceError::Configuration("Missing 'price'".to_string()))?;
	Ok(Box::new(FixedSource::new(price)))
}

/// Registry for the fixed price source.
pub struct Registry;

impl shift_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "fixed";
	type Factory = crate::PriceSourceFactory;

	fn factory() -> Self::Factory {
		create_source
	}
}

impl crate::PriceSourceRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	#[tokio::test]
	async fn test_fixed_price_from_string_or_float() {
		let config: toml::Value = toml::toml! { price = "0.4975" }.into();
		let source = create_source(&config, &NetworksConfig::new()).unwrap();
		assert_eq!(source.fetch_price().await.unwrap(), dec!(0.4975));

		let config: toml::Value = toml::toml! { price = 2.5 }.into();
		let source = create_source(&config, &NetworksConfig::new()).unwrap();
		assert_eq!(source.fetch_price().await.unwrap(), dec!(2.5));
	}

	#[test]
	fn test_negative_price_rejected() {
		let config: toml::Value = toml::toml! { price = "-1" }.into();
		assert!(create_source(&config, &NetworksConfig::new()).is_err());
	}
}

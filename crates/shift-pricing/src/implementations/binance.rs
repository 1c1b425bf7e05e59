//! Binance spot ticker price source.

use super::http::{common_fields, required_str, JsonEndpoint};
use crate::{PriceSourceError, PriceSourceInterface};
use async_trait::async_trait;
use rust_decimal::Decimal;
use shift_types::{ConfigSchema, Field, FieldType, NetworksConfig, Schema, ValidationError};

const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Reads `price` (a decimal string) from `/api/v3/ticker/price`.
pub struct BinanceSource {
	endpoint: JsonEndpoint,
}

impl BinanceSource {
	pub fn new(config: &toml::Value) -> Result<Self, PriceSourceError> {
		let symbol = required_str(config, "symbol")?;
		let endpoint = JsonEndpoint::new(
			config,
			DEFAULT_BASE_URL,
			&format!("/api/v3/ticker/price?symbol={}", symbol),
			"/price".to_string(),
		)?;
		Ok(Self { endpoint })
	}
}

#[async_trait]
impl PriceSourceInterface for BinanceSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(BinanceSchema)
	}

	async fn fetch_price(&self) -> Result<Decimal, PriceSourceError> {
		self.endpoint.fetch().await
	}
}

pub struct BinanceSchema;

impl ConfigSchema for BinanceSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![Field::new("symbol", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(s) if s.chars().all(|c| c.is_ascii_alphanumeric()) && !s.is_empty() => {
						Ok(())
					},
					_ => Err("symbol must be an alphanumeric pair such as ARBUSDT".to_string()),
				}
			})],
			common_fields(),
		)
		.validate(config)
	}
}

/// Creates a Binance source from `symbol` (e.g. `ARBUSDT`).
pub fn create_source(
	config: &toml::Value,
	_networks: &NetworksConfig,
) -> Result<Box<dyn PriceSourceInterface>, PriceSourceError> {
	BinanceSchema
		.validate(config)
		.map_err(|e| PriceSourceError::Configuration(e.to_string()))?;
	Ok(Box::new(BinanceSource::new(config)?))
}

/// Registry for the Binance price source.
pub struct Registry;

impl shift_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "binance";
	type Factory = crate::PriceSourceFactory;

	fn factory() -> Self::Factory {
		create_source
	}
}

impl crate::PriceSourceRegistry for Registry {}

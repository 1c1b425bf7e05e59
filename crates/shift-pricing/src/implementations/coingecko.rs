//! CoinGecko simple price source.
//!
//! `GET /api/v3/simple/price?ids=<coin_id>&vs_currencies=<vs_currency>`
//! answers `{ "<coin_id>": { "<vs_currency>": 0.51 } }`.

use super::http::{common_fields, required_str, JsonEndpoint};
use crate::{PriceSourceError, PriceSourceInterface};
use async_trait::async_trait;
use rust_decimal::Decimal;
use shift_types::{ConfigSchema, Field, FieldType, NetworksConfig, Schema, ValidationError};

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com";

pub struct CoinGeckoSource {
	endpoint: JsonEndpoint,
}

impl CoinGeckoSource {
	pub fn new(config: &toml::Value) -> Result<Self, PriceSourceError> {
		let coin_id = required_str(config, "coin_id")?;
		let vs_currency = config
			.get("vs_currency")
			.and_then(|v| v.as_str())
			.unwrap_or("usd");

		let endpoint = JsonEndpoint::new(
			config,
			DEFAULT_BASE_URL,
			&format!(
				"/api/v3/simple/price?ids={}&vs_currencies={}",
				coin_id, vs_currency
			),
			format!("/{}/{}", coin_id, vs_currency),
		)?;
		Ok(Self { endpoint })
	}
}

#[async_trait]
impl PriceSourceInterface for CoinGeckoSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(CoinGeckoSchema)
	}

	async fn fetch_price(&self) -> Result<Decimal, PriceSourceError> {
		self.endpoint.fetch().await
	}
}

pub struct CoinGeckoSchema;

impl ConfigSchema for CoinGeckoSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let mut optional = common_fields();
		optional.push(Field::new("vs_currency", FieldType::String));
		Schema::new(vec![Field::new("coin_id", FieldType::String)], optional).validate(config)
	}
}

/// Creates a CoinGecko source.
///
/// Configuration parameters:
/// - `coin_id`: CoinGecko coin id, e.g. `arbitrum`
/// - `vs_currency`: quote currency (default `usd`)
pub fn create_source(
	config: &toml::Value,
	_networks: &NetworksConfig,
) -> Result<Box<dyn PriceSourceInterface>, PriceSourceError> {
	CoinGeckoSchema
		.validate(config)
		.map_err(|e| PriceSourceError::Configuration(e.to_string()))?;
	Ok(Box::new(CoinGeckoSource::new(config)?))
}

/// Registry for the CoinGecko price source.
pub struct Registry;

impl shift_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "coingecko";
	type Factory = crate::PriceSourceFactory;

	fn factory() -> Self::Factory {
		create_source
	}
}

impl crate::PriceSourceRegistry for Registry {}

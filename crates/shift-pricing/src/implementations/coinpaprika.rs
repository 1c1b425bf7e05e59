//! Coinpaprika ticker price source.

use super::http::{common_fields, required_str, JsonEndpoint};
use crate::{PriceSourceError, PriceSourceInterface};
use async_trait::async_trait;
use rust_decimal::Decimal;
use shift_types::{ConfigSchema, Field, FieldType, NetworksConfig, Schema, ValidationError};

const DEFAULT_BASE_URL: &str = "https://api.coinpaprika.com";

/// Reads `quotes.USD.price` from `/v1/tickers/<ticker_id>`.
pub struct CoinpaprikaSource {
	endpoint: JsonEndpoint,
}

impl CoinpaprikaSource {
	pub fn new(config: &toml::Value) -> Result<Self, PriceSourceError> {
		let ticker_id = required_str(config, "ticker_id")?;
		let endpoint = JsonEndpoint::new(
			config,
			DEFAULT_BASE_URL,
			&format!("/v1/tickers/{}", ticker_id),
			"/quotes/USD/price".to_string(),
		)?;
		Ok(Self { endpoint })
	}
}

#[async_trait]
impl PriceSourceInterface for CoinpaprikaSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(CoinpaprikaSchema)
	}

	async fn fetch_price(&self) -> Result<Decimal, PriceSourceError> {
		self.endpoint.fetch().await
	}
}

pub struct CoinpaprikaSchema;

impl ConfigSchema for CoinpaprikaSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![Field::new("ticker_id", FieldType::String)], common_fields())
			.validate(config)
	}
}

/// Creates a Coinpaprika source from `ticker_id` (e.g. `arb-arbitrum`).
pub fn create_source(
	config: &toml::Value,
	_networks: &NetworksConfig,
) -> Result<Box<dyn PriceSourceInterface>, PriceSourceError> {
	CoinpaprikaSchema
		.validate(config)
		.map_err(|e| PriceSourceError::Configuration(e.to_string()))?;
	Ok(Box::new(CoinpaprikaSource::new(config)?))
}

/// Registry for the Coinpaprika price source.
pub struct Registry;

impl shift_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "coinpaprika";
	type Factory = crate::PriceSourceFactory;

	fn factory() -> Self::Factory {
		create_source
	}
}

impl crate::PriceSourceRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::http::extract_price;
	use rust_decimal_macros::dec;
	use serde_json::json;

	#[test]
	fn test_request_and_field() {
		let config: toml::Value = toml::toml! { ticker_id = "arb-arbitrum" }.into();
		let source = CoinpaprikaSource::new(&config).unwrap();
		assert_eq!(
			source.endpoint.url(),
			"https://api.coinpaprika.com/v1/tickers/arb-arbitrum"
		);

		let body = json!({ "id": "arb-arbitrum", "quotes": { "USD": { "price": 0.5098 } } });
		assert_eq!(extract_price(&body, "/quotes/USD/price").unwrap(), dec!(0.5098));
	}
}

//! CoinMarketCap latest quotes price source.
//!
//! Requires an API key, sent as `X-CMC_PRO_API_KEY`.

use super::http::{common_fields, required_str, JsonEndpoint};
use crate::{PriceSourceError, PriceSourceInterface};
use async_trait::async_trait;
use rust_decimal::Decimal;
use shift_types::{
	ConfigSchema, Field, FieldType, NetworksConfig, Schema, SecretString, ValidationError,
};

const DEFAULT_BASE_URL: &str = "https://pro-api.coinmarketcap.com";

pub struct CoinMarketCapSource {
	endpoint: JsonEndpoint,
}

impl CoinMarketCapSource {
	pub fn new(config: &toml::Value) -> Result<Self, PriceSourceError> {
		let symbol = required_str(config, "symbol")?;
		let api_key = SecretString::from(required_str(config, "api_key")?);
		if api_key.is_empty() {
			return Err(PriceSourceError::Configuration(
				"api_key cannot be empty".to_string(),
			));
		}

		let endpoint = JsonEndpoint::new(
			config,
			DEFAULT_BASE_URL,
			&format!("/v1/cryptocurrency/quotes/latest?symbol={}", symbol),
			format!("/data/{}/quote/USD/price", symbol),
		)?
		.with_header(
			"X-CMC_PRO_API_KEY",
			api_key.with_exposed(|key| key.to_string()),
		);
		Ok(Self { endpoint })
	}
}

#[async_trait]
impl PriceSourceInterface for CoinMarketCapSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(CoinMarketCapSchema)
	}

	async fn fetch_price(&self) -> Result<Decimal, PriceSourceError> {
		self.endpoint.fetch().await
	}
}

pub struct CoinMarketCapSchema;

impl ConfigSchema for CoinMarketCapSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![
				Field::new("symbol", FieldType::String),
				Field::new("api_key", FieldType::String),
			],
			common_fields(),
		)
		.validate(config)
	}
}

/// Creates a CoinMarketCap source.
///
/// Configuration parameters:
/// - `symbol`: ticker symbol, e.g. `ARB`
/// - `api_key`: CoinMarketCap API key, normally `${CMC_API_KEY}`
pub fn create_source(
	config: &toml::Value,
	_networks: &NetworksConfig,
) -> Result<Box<dyn PriceSourceInterface>, PriceSourceError> {
	CoinMarketCapSchema
		.validate(config)
		.map_err(|e| PriceSourceError::Configuration(e.to_string()))?;
	Ok(Box::new(CoinMarketCapSource::new(config)?))
}

/// Registry for the CoinMarketCap price source.
pub struct Registry;

impl shift_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "coinmarketcap";
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
		let config: toml::Value = toml::toml! {
			symbol = "ARB"
			api_key = "test-key"
		}
		.into();
		let source = CoinMarketCapSource::new(&config).unwrap();
		assert_eq!(
			source.endpoint.url(),
			"https://pro-api.coinmarketcap.com/v1/cryptocurrency/quotes/latest?symbol=ARB"
		);

		let body = json!({
			"status": { "error_code": 0 },
			"data": { "ARB": { "quote": { "USD": { "price": 0.51172 } } } }
		});
		assert_eq!(
			extract_price(&body, "/data/ARB/quote/USD/price").unwrap(),
			dec!(0.51172)
		);
	}

	#[test]
	fn test_api_key_required() {
		let config: toml::Value = toml::toml! { symbol = "ARB" }.into();
		assert!(create_source(&config, &NetworksConfig::new()).is_err());

		let blank: toml::Value = toml::toml! {
			symbol = "ARB"
			api_key = "  "
		}
		.into();
		assert!(create_source(&blank, &NetworksConfig::new()).is_err());
	}
}

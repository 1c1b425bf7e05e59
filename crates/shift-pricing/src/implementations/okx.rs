//! OKX market ticker price source.
//!
//! The ticker endpoint wraps results in a `data` array; the last traded
//! price is `data[0].last`, encoded as a string.

use super::http::{common_fields, required_str, JsonEndpoint};
use crate::{PriceSourceError, PriceSourceInterface};
use async_trait::async_trait;
use rust_decimal::Decimal;
use shift_types::{ConfigSchema, Field, FieldType, NetworksConfig, Schema, ValidationError};

const DEFAULT_BASE_URL: &str = "https://www.okx.com";

pub struct OkxSource {
	endpoint: JsonEndpoint,
}

impl OkxSource {
	pub fn new(config: &toml::Value) -> Result<Self, PriceSourceError> {
		let inst_id = required_str(config, "inst_id")?;
		let endpoint = JsonEndpoint::new(
			config,
			DEFAULT_BASE_URL,
			&format!("/api/v5/market/ticker?instId={}", inst_id),
			"/data/0/last".to_string(),
		)?;
		Ok(Self { endpoint })
	}
}

#[async_trait]
impl PriceSourceInterface for OkxSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(OkxSchema)
	}

	async fn fetch_price(&self) -> Result<Decimal, PriceSourceError> {
		self.endpoint.fetch().await
	}
}

pub struct OkxSchema;

impl ConfigSchema for OkxSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![Field::new("inst_id", FieldType::String)], common_fields())
			.validate(config)
	}
}

/// Creates an OKX source from `inst_id` (e.g. `ARB-USDT`).
pub fn create_source(
	config: &toml::Value,
	_networks: &NetworksConfig,
) -> Result<Box<dyn PriceSourceInterface>, PriceSourceError> {
	OkxSchema
		.validate(config)
		.map_err(|e| PriceSourceError::Configuration(e.to_string()))?;
	Ok(Box::new(OkxSource::new(config)?))
}

/// Registry for the OKX price source.
pub struct Registry;

impl shift_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "okx";
	type Factory = crate::PriceSourceFactory;

	fn factory() -> Self::Factory {
		create_source
	}
}

impl crate::PriceSourceRegistry for Registry {}

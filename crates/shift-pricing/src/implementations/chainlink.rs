//! Chainlink aggregator price source.
//!
//! Reads `latestRoundData()` and `decimals()` from an AggregatorV3 contract
//! and scales the answer into a decimal price.

use super::rpc::{eth_call, network_id, provider_for, HttpProvider};
use crate::{PriceSourceError, PriceSourceInterface};
use alloy_primitives::{Address, I256, U256};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use rust_decimal::Decimal;
use shift_types::{
	current_timestamp, format_units, ConfigSchema, Field, FieldType, NetworksConfig, Schema,
	ValidationError,
};
use std::str::FromStr;

sol! {
	interface IAggregatorV3 {
		function decimals() external view returns (uint8);
		function latestRoundData() external view returns (
			uint80 roundId,
			int256 answer,
			uint256 startedAt,
			uint256 updatedAt,
			uint80 answeredInRound
		);
	}
}

pub struct ChainlinkSource {
	provider: HttpProvider,
	aggregator: Address,
	/// Answers older than this are rejected; `None` accepts any age.
	max_age_seconds: Option<u64>,
}

impl ChainlinkSource {
	pub fn new(provider: HttpProvider, aggregator: Address, max_age_seconds: Option<u64>) -> Self {
		Self {
			provider,
			aggregator,
			max_age_seconds,
		}
	}
}

/// Scales a raw aggregator answer. Non-positive answers are failures.
fn scale_answer(answer: I256, decimals: u8) -> Result<Decimal, PriceSourceError> {
	if !answer.is_positive() {
		return Err(PriceSourceError::InvalidPrice(format!(
			"non-positive aggregator answer {}",
			answer
		)));
	}
	format_units(answer.into_raw(), decimals)
		.map_err(|e| PriceSourceError::InvalidPrice(e.to_string()))
}

fn check_age(
	updated_at: U256,
	max_age_seconds: Option<u64>,
	now: u64,
) -> Result<(), PriceSourceError> {
	let Some(max_age) = max_age_seconds else {
		return Ok(());
	};
	let updated_at = u64::try_from(updated_at).unwrap_or(u64::MAX);
	let age = now.saturating_sub(updated_at);
	if age > max_age {
		return Err(PriceSourceError::InvalidPrice(format!(
			"aggregator answer is {}s old (max {}s)",
			age, max_age
		)));
	}
	Ok(())
}

#[async_trait]
impl PriceSourceInterface for ChainlinkSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(ChainlinkSchema)
	}

	async fn fetch_price(&self) -> Result<Decimal, PriceSourceError> {
		let decimals_data = eth_call(
			&self.provider,
			self.aggregator,
			IAggregatorV3::decimalsCall {}.abi_encode(),
		)
		.await?;
		let decimals = IAggregatorV3::decimalsCall::abi_decode_returns(&decimals_data, true)
			.map_err(|e| PriceSourceError::Chain(format!("Failed to decode decimals: {}", e)))?
			._0;

		let round_data = eth_call(
			&self.provider,
			self.aggregator,
			IAggregatorV3::latestRoundDataCall {}.abi_encode(),
		)
		.await?;
		let round = IAggregatorV3::latestRoundDataCall::abi_decode_returns(&round_data, true)
			.map_err(|e| {
				PriceSourceError::Chain(format!("Failed to decode latestRoundData: {}", e))
			})?;

		check_age(round.updatedAt, self.max_age_seconds, current_timestamp())?;
		scale_answer(round.answer, decimals)
	}
}

pub struct ChainlinkSchema;

impl ConfigSchema for ChainlinkSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![
				Field::new(
					"network_id",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
				Field::new("aggregator", FieldType::Address),
			],
			vec![
				Field::new(
					"max_age_seconds",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
				Field::new(
					"fallback_price",
					FieldType::Decimal {
						min: Some(Decimal::ZERO),
						max: None,
					},
				),
			],
		)
		.validate(config)
	}
}

/// Creates a Chainlink source.
///
/// Configuration parameters:
/// - `network_id`: chain id of a configured network
/// - `aggregator`: AggregatorV3 contract address
/// - `max_age_seconds`: optional staleness limit
pub fn create_source(
	config: &toml::Value,
	networks: &NetworksConfig,
) -> Result<Box<dyn PriceSourceInterface>, PriceSourceError> {
	ChainlinkSchema
		.validate(config)
		.map_err(|e| PriceSourceError::Configuration(e.to_string()))?;

	let provider = provider_for(networks, network_id(config)?)?;
	let aggregator = config
		.get("aggregator")
		.and_then(|v| v.as_str())
		.map(Address::from_str)
		.transpose()
		.map_err(|e| PriceSourceError::Configuration(format!("Invalid aggregator: {}", e)))?
		.ok_or_else(|| PriceSourceError::Configuration("Missing 'aggregator'".to_string()))?;
	let max_age_seconds = config
		.get("max_age_seconds")
		.and_then(|v| v.as_integer())
		.and_then(|v| u64::try_from(v).ok());

	Ok(Box::new(ChainlinkSource::new(
		provider,
		aggregator,
		max_age_seconds,
	)))
}

/// Registry for the Chainlink price source.
pub struct Registry;

impl shift_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "chainlink";
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
	use shift_types::NetworkConfig;

	#[test]
	fn test_scale_answer() {
		let answer = I256::from_dec_str("51234567").unwrap();
		assert_eq!(scale_answer(answer, 8).unwrap(), dec!(0.51234567));
		assert!(scale_answer(I256::ZERO, 8).is_err());
		assert!(scale_answer(I256::MINUS_ONE, 8).is_err());
	}

	#[test]
	fn test_staleness_check() {
		let now = 1_700_000_000;
		assert!(check_age(U256::from(now - 30), Some(60), now).is_ok());
		assert!(check_age(U256::from(now - 120), Some(60), now).is_err());
		assert!(check_age(U256::ZERO, None, now).is_ok());
	}

	#[test]
	fn test_factory_requires_known_network() {
		let config: toml::Value = toml::toml! {
			network_id = 42161
			aggregator = "0xb2A824043730FE05F3DA2efaFa1CBbe83fa548D6"
		}
		.into();

		assert!(create_source(&config, &NetworksConfig::new()).is_err());

		let mut networks = NetworksConfig::new();
		networks.insert(
			42161,
			NetworkConfig {
				name: None,
				rpc_url: "http://localhost:8545".to_string(),
			},
		);
		assert!(create_source(&config, &networks).is_ok());
	}
}

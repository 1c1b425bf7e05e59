//! Flare FTSO consumer price source.
//!
//! The consumer contract returns every feed in one call as parallel arrays
//! of zero-padded `bytes32` symbols, 18-decimal prices and timestamps. The
//! price of `base_symbol` in `quote_symbol` is the ratio of the two feeds.

use super::rpc::{eth_call, network_id, provider_for, HttpProvider};
use crate::{PriceSourceError, PriceSourceInterface};
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use rust_decimal::Decimal;
use shift_types::{
	format_units, ConfigSchema, Field, FieldType, NetworksConfig, Schema, ValidationError,
};
use std::str::FromStr;

const FEED_DECIMALS: u8 = 18;

sol! {
	interface IFtsoConsumer {
		function fetchAllFeeds() external view returns (
			bytes32[] memory symbols,
			uint256[] memory prices,
			uint256[] memory timestamps
		);
	}
}

pub struct FtsoSource {
	provider: HttpProvider,
	consumer: Address,
	base_symbol: String,
	quote_symbol: String,
}

impl FtsoSource {
	pub fn new(
		provider: HttpProvider,
		consumer: Address,
		base_symbol: String,
		quote_symbol: String,
	) -> Self {
		Self {
			provider,
			consumer,
			base_symbol,
			quote_symbol,
		}
	}
}

/// Decodes a zero-padded `bytes32` symbol.
fn decode_symbol(raw: &B256) -> String {
	let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
	String::from_utf8_lossy(&raw[..end]).into_owned()
}

fn feed_price(
	symbols: &[B256],
	prices: &[U256],
	wanted: &str,
) -> Result<Decimal, PriceSourceError> {
	let index = symbols
		.iter()
		.position(|raw| decode_symbol(raw) == wanted)
		.ok_or_else(|| PriceSourceError::MissingField(format!("feed {}", wanted)))?;
	let raw = prices
		.get(index)
		.ok_or_else(|| PriceSourceError::MissingField(format!("price of feed {}", wanted)))?;
	format_units(*raw, FEED_DECIMALS).map_err(|e| PriceSourceError::InvalidPrice(e.to_string()))
}

/// Computes `base / quote` from the feed arrays.
fn feed_ratio(
	symbols: &[B256],
	prices: &[U256],
	base: &str,
	quote: &str,
) -> Result<Decimal, PriceSourceError> {
	let base_price = feed_price(symbols, prices, base)?;
	let quote_price = feed_price(symbols, prices, quote)?;
	if quote_price.is_zero() {
		return Err(PriceSourceError::InvalidPrice(format!(
			"quote feed {} reports zero",
			quote
		)));
	}
	base_price
		.checked_div(quote_price)
		.ok_or_else(|| PriceSourceError::InvalidPrice("feed ratio overflow".to_string()))
}

#[async_trait]
impl PriceSourceInterface for FtsoSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FtsoSchema)
	}

	async fn fetch_price(&self) -> Result<Decimal, PriceSourceError> {
		let data = eth_call(
			&self.provider,
			self.consumer,
			IFtsoConsumer::fetchAllFeedsCall {}.abi_encode(),
		)
		.await?;
		let feeds = IFtsoConsumer::fetchAllFeedsCall::abi_decode_returns(&data, true)
			.map_err(|e| {
				PriceSourceError::Chain(format!("Failed to decode fetchAllFeeds: {}", e))
			})?;

		feed_ratio(
			&feeds.symbols,
			&feeds.prices,
			&self.base_symbol,
			&self.quote_symbol,
		)
	}
}

pub struct FtsoSchema;

impl ConfigSchema for FtsoSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let symbol = |name: &str| {
			Field::new(name, FieldType::String).with_validator(|value| match value.as_str() {
				Some(s) if !s.is_empty() && s.len() <= 32 => Ok(()),
				_ => Err("feed symbols must be 1 to 32 bytes".to_string()),
			})
		};
		Schema::new(
			vec![
				Field::new(
					"network_id",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
				Field::new("consumer", FieldType::Address),
				symbol("base_symbol"),
				symbol("quote_symbol"),
			],
			vec![Field::new(
				"fallback_price",
				FieldType::Decimal {
					min: Some(Decimal::ZERO),
					max: None,
				},
			)],
		)
		.validate(config)
	}
}

/// Creates an FTSO source.
///
/// Configuration parameters:
/// - `network_id`: chain id of a configured Flare network
/// - `consumer`: FTSO consumer contract address
/// - `base_symbol`, `quote_symbol`: feed symbols, e.g. `testARB` and `testUSDC`
pub fn create_source(
	config: &toml::Value,
	networks: &NetworksConfig,
) -> Result<Box<dyn PriceSourceInterface>, PriceSourceError> {
	FtsoSchema
		.validate(config)
		.map_err(|e| PriceSourceError::Configuration(e.to_string()))?;

	let provider = provider_for(networks, network_id(config)?)?;
	let str_field = |name: &str| {
		config
			.get(name)
			.and_then(|v| v.as_str())
			.map(str::to_string)
			.ok_or_else(|| PriceSourceError::Configuration(format!("Missing '{}'", name)))
	};
	let consumer = Address::from_str(&str_field("consumer")?)
		.map_err(|e| PriceSourceError::Configuration(format!("Invalid consumer: {}", e)))?;

	Ok(Box::new(FtsoSource::new(
		provider,
		consumer,
		str_field("base_symbol")?,
		str_field("quote_symbol")?,
	)))
}

/// Registry for the FTSO price source.
pub struct Registry;

impl shift_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "ftso";
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

	fn symbol(s: &str) -> B256 {
		let mut raw = [0u8; 32];
		raw[..s.len()].copy_from_slice(s.as_bytes());
		B256::from(raw)
	}

	fn wei(whole: &str) -> U256 {
		shift_types::parse_units(Decimal::from_str(whole).unwrap(), 18).unwrap()
	}

	#[test]
	fn test_decode_symbol_strips_padding() {
		assert_eq!(decode_symbol(&symbol("testARB")), "testARB");
		assert_eq!(decode_symbol(&B256::ZERO), "");
	}

	#[test]
	fn test_ratio_of_feeds() {
		let symbols = vec![symbol("testBTC"), symbol("testARB"), symbol("testUSDC")];
		let prices = vec![wei("60000"), wei("0.5"), wei("1.0")];

		assert_eq!(
			feed_ratio(&symbols, &prices, "testARB", "testUSDC").unwrap(),
			dec!(0.5)
		);
		assert_eq!(
			feed_ratio(&symbols, &prices, "testUSDC", "testARB").unwrap(),
			dec!(2)
		);
	}

	#[test]
	fn test_missing_or_zero_feed() {
		let symbols = vec![symbol("testARB"), symbol("testUSDC")];
		let prices = vec![wei("0.5"), U256::ZERO];

		assert!(matches!(
			feed_ratio(&symbols, &prices, "testXRP", "testUSDC"),
			Err(PriceSourceError::MissingField(_))
		));
		assert!(matches!(
			feed_ratio(&symbols, &prices, "testARB", "testUSDC"),
			Err(PriceSourceError::InvalidPrice(_))
		));
	}
}

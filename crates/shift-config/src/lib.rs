//! Configuration module for the shift settlement backend.
//!
//! Configuration is TOML. Values may reference environment variables with
//! `${VAR}` or `${VAR:-default}`, which is how payout keys and market-data
//! API keys are normally supplied. A file may split sections into other
//! files with `include = ["networks.toml", "routes.toml"]`; every top-level
//! section must then be defined exactly once across all files.
//!
//! Every swap route is described by a [`RouteConfig`]: the two networks, the
//! settlement direction, the deposit address and assets, how deposits are
//! recognised and which price sources feed its consensus rate.

mod loader;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use shift_types::{
	default_trim_fraction, deserialize_networks, Address, AssetConfig, NetworksConfig,
	SecretString, SettlementDirection, VerificationStrategy, DEFAULT_FEE_RATE,
	DEFAULT_MIN_SOURCES, DEFAULT_TOLERANCE_RATE,
};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// The full error embeds the whole input; keep only the message.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub service: ServiceConfig,
	/// RPC endpoints keyed by chain id.
	#[serde(deserialize_with = "deserialize_networks")]
	pub networks: NetworksConfig,
	pub pricing: PricingConfig,
	/// Swap routes keyed by the name used in `/api/swap/{route}`.
	pub routes: HashMap<String, RouteConfig>,
	#[serde(default)]
	pub settlement: SettlementConfig,
	pub payout: PayoutConfig,
	pub storage: StorageConfig,
	pub api: Option<ApiConfig>,
}

/// Identity of this service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	pub id: String,
}

/// Price source definitions shared by all routes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
	/// Upper bound for a single source fetch, including on-chain reads.
	#[serde(default = "default_pricing_timeout")]
	pub timeout_seconds: u64,
	/// Source name to implementation config. Each table carries a `kind`
	/// naming the implementation, plus that implementation's own fields.
	pub sources: HashMap<String, toml::Value>,
}

fn default_pricing_timeout() -> u64 {
	5
}

impl PricingConfig {
	/// Returns the implementation kind of a configured source.
	pub fn source_kind(&self, name: &str) -> Option<&str> {
		self.sources
			.get(name)
			.and_then(|v| v.get("kind"))
			.and_then(|v| v.as_str())
	}
}

/// One swap route.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
	pub source_chain_id: u64,
	pub destination_chain_id: u64,
	pub direction: SettlementDirection,
	/// Address (EOA or deposit contract) that receives user deposits.
	pub deposit_address: Address,
	pub deposit_asset: AssetConfig,
	pub payout_asset: AssetConfig,
	/// Deposit recognition strategies, tried in order.
	#[serde(default)]
	pub verification: Vec<VerificationStrategy>,
	/// Names of entries in `[pricing.sources]`.
	pub price_sources: Vec<String>,
	/// Fraction of lowest prices discarded; defaults by source count.
	#[serde(default)]
	pub trim_fraction: Option<Decimal>,
	#[serde(default = "default_min_sources")]
	pub min_sources: usize,
	/// Smallest accepted deposit in whole deposit-asset units.
	#[serde(default)]
	pub min_deposit: Option<Decimal>,
	/// Route-specific override of `settlement.fee_rate`.
	#[serde(default)]
	pub fee_rate: Option<Decimal>,
	/// Absolute cap on the prediction tolerance, in payout-asset units.
	#[serde(default)]
	pub tolerance_cap: Option<Decimal>,
}

fn default_min_sources() -> usize {
	DEFAULT_MIN_SOURCES
}

impl RouteConfig {
	/// The trim fraction in effect for this route.
	pub fn effective_trim_fraction(&self) -> Decimal {
		self.trim_fraction
			.unwrap_or_else(|| default_trim_fraction(self.price_sources.len()))
	}

	/// Verification strategies in effect; native deposits default to a
	/// value check and token deposits to the deposit event then a plain
	/// transfer.
	pub fn effective_verification(&self) -> Vec<VerificationStrategy> {
		if !self.verification.is_empty() {
			return self.verification.clone();
		}
		if self.deposit_asset.is_native() {
			vec![VerificationStrategy::NativeValue]
		} else {
			vec![
				VerificationStrategy::DepositEvent,
				VerificationStrategy::TokenTransfer,
			]
		}
	}
}

/// Idempotency handling of repeated source transaction hashes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyMode {
	/// Return the stored response of a completed swap.
	#[default]
	Replay,
	/// Reject any repeat of a known transaction hash.
	Reject,
	/// No ledger. A resubmitted hash is processed and paid again.
	Disabled,
}

/// Settlement arithmetic and idempotency settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SettlementConfig {
	#[serde(default = "default_fee_rate")]
	pub fee_rate: Decimal,
	#[serde(default = "default_tolerance_rate")]
	pub tolerance_rate: Decimal,
	#[serde(default)]
	pub idempotency: IdempotencyMode,
}

fn default_fee_rate() -> Decimal {
	DEFAULT_FEE_RATE
}

fn default_tolerance_rate() -> Decimal {
	DEFAULT_TOLERANCE_RATE
}

impl Default for SettlementConfig {
	fn default() -> Self {
		Self {
			fee_rate: DEFAULT_FEE_RATE,
			tolerance_rate: DEFAULT_TOLERANCE_RATE,
			idempotency: IdempotencyMode::default(),
		}
	}
}

/// Payout wallet settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayoutConfig {
	/// Default signing key for every destination network.
	pub private_key: SecretString,
	/// Per-network keys overriding `private_key`, keyed by chain id.
	#[serde(default, deserialize_with = "deserialize_network_keys")]
	pub network_keys: HashMap<u64, SecretString>,
	#[serde(default = "default_confirmations")]
	pub confirmations: u64,
	/// Upper bound on waiting for a payout receipt.
	#[serde(default = "default_payout_timeout")]
	pub timeout_seconds: u64,
	#[serde(default = "default_poll_interval")]
	pub poll_interval_seconds: u64,
}

fn default_confirmations() -> u64 {
	1
}

fn default_payout_timeout() -> u64 {
	180
}

fn default_poll_interval() -> u64 {
	2
}

fn deserialize_network_keys<'de, D>(deserializer: D) -> Result<HashMap<u64, SecretString>, D::Error>
where
	D: Deserializer<'de>,
{
	let string_map: HashMap<String, SecretString> = HashMap::deserialize(deserializer)?;
	string_map
		.into_iter()
		.map(|(key, value)| {
			key.parse::<u64>()
				.map(|chain_id| (chain_id, value))
				.map_err(|e| serde::de::Error::custom(format!("Invalid chain_id '{}': {}", key, e)))
		})
		.collect()
}

/// Configuration for the storage backend behind the idempotency ledger.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
	/// Interval for removing expired entries; 0 disables the sweep.
	#[serde(default)]
	pub cleanup_interval_seconds: u64,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout; must exceed the pricing and payout timeouts.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	pub cors: Option<CorsConfig>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	pub allowed_origins: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	300
}

fn default_max_request_size() -> usize {
	64 * 1024
}

/// Resolves `${VAR}` and `${VAR:-default}` references in a string.
///
/// Input is limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut missing: Option<String> = None;
	let resolved = re.replace_all(input, |caps: &regex::Captures<'_>| {
		let var_name = &caps[1];
		match (std::env::var(var_name), caps.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				missing.get_or_insert_with(|| var_name.to_string());
				String::new()
			},
		}
	});

	match missing {
		Some(var_name) => Err(ConfigError::Validation(format!(
			"Environment variable '{}' not found",
			var_name
		))),
		None => Ok(resolved.into_owned()),
	}
}

fn in_unit_interval(value: Decimal) -> bool {
	value >= Decimal::ZERO && value < Decimal::ONE
}

impl Config {
	/// Loads configuration from a file, following `include` directives and
	/// resolving environment variables.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Returns the route with the given name.
	pub fn route(&self, name: &str) -> Option<&RouteConfig> {
		self.routes.get(name)
	}

	/// Fee rate in effect for a route.
	pub fn fee_rate_for(&self, route: &RouteConfig) -> Decimal {
		route.fee_rate.unwrap_or(self.settlement.fee_rate)
	}

	/// Validates cross-section references and value ranges.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		if self.networks.is_empty() {
			return Err(ConfigError::Validation(
				"Networks configuration cannot be empty".into(),
			));
		}
		for (chain_id, network) in &self.networks {
			if network.rpc_url.trim().is_empty() {
				return Err(ConfigError::Validation(format!(
					"Network {} must have an rpc_url",
					chain_id
				)));
			}
		}

		if self.pricing.timeout_seconds == 0 || self.pricing.timeout_seconds > 60 {
			return Err(ConfigError::Validation(
				"pricing.timeout_seconds must be between 1 and 60".into(),
			));
		}
		for name in self.pricing.sources.keys() {
			if self.pricing.source_kind(name).is_none() {
				return Err(ConfigError::Validation(format!(
					"Price source '{}' missing 'kind' field",
					name
				)));
			}
		}

		if !in_unit_interval(self.settlement.fee_rate) {
			return Err(ConfigError::Validation(format!(
				"settlement.fee_rate must be in [0, 1), got {}",
				self.settlement.fee_rate
			)));
		}
		if self.settlement.tolerance_rate < Decimal::ZERO {
			return Err(ConfigError::Validation(
				"settlement.tolerance_rate cannot be negative".into(),
			));
		}

		if self.routes.is_empty() {
			return Err(ConfigError::Validation(
				"At least one route must be configured".into(),
			));
		}
		for (name, route) in &self.routes {
			self.validate_route(name, route)?;
		}

		if self.payout.private_key.is_empty() {
			return Err(ConfigError::Validation(
				"payout.private_key cannot be empty".into(),
			));
		}
		if self.payout.confirmations == 0 || self.payout.confirmations > 100 {
			return Err(ConfigError::Validation(
				"payout.confirmations must be between 1 and 100".into(),
			));
		}
		if self.payout.timeout_seconds == 0 || self.payout.poll_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"payout.timeout_seconds and payout.poll_interval_seconds must be greater than 0"
					.into(),
			));
		}
		for chain_id in self.payout.network_keys.keys() {
			if !self.networks.contains_key(chain_id) {
				return Err(ConfigError::Validation(format!(
					"payout.network_keys references network {} which doesn't exist in networks config",
					chain_id
				)));
			}
		}

		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		Ok(())
	}

	fn validate_route(&self, name: &str, route: &RouteConfig) -> Result<(), ConfigError> {
		let invalid =
			|message: String| ConfigError::Validation(format!("Route '{}': {}", name, message));

		for chain_id in [route.source_chain_id, route.destination_chain_id] {
			if !self.networks.contains_key(&chain_id) {
				return Err(invalid(format!(
					"references network {} which doesn't exist in networks config",
					chain_id
				)));
			}
		}

		if route.price_sources.is_empty() {
			return Err(invalid("price_sources cannot be empty".into()));
		}
		for source in &route.price_sources {
			if !self.pricing.sources.contains_key(source) {
				return Err(invalid(format!(
					"price source '{}' not found in pricing.sources",
					source
				)));
			}
		}
		if route.min_sources == 0 {
			return Err(invalid("min_sources must be at least 1".into()));
		}
		if route.min_sources > route.price_sources.len() {
			return Err(invalid(format!(
				"min_sources ({}) exceeds the number of price sources ({})",
				route.min_sources,
				route.price_sources.len()
			)));
		}
		if !in_unit_interval(route.effective_trim_fraction()) {
			return Err(invalid(format!(
				"trim_fraction must be in [0, 1), got {}",
				route.effective_trim_fraction()
			)));
		}
		if let Some(fee) = route.fee_rate.filter(|fee| !in_unit_interval(*fee)) {
			return Err(invalid(format!("fee_rate must be in [0, 1), got {}", fee)));
		}
		if route.min_deposit.is_some_and(|min| min < Decimal::ZERO) {
			return Err(invalid("min_deposit cannot be negative".into()));
		}
		if route.tolerance_cap.is_some_and(|cap| cap < Decimal::ZERO) {
			return Err(invalid("tolerance_cap cannot be negative".into()));
		}

		for strategy in route.effective_verification() {
			let fits_asset = match strategy {
				VerificationStrategy::NativeValue => route.deposit_asset.is_native(),
				VerificationStrategy::TokenTransfer | VerificationStrategy::DepositEvent => {
					!route.deposit_asset.is_native()
				},
			};
			if !fits_asset {
				return Err(invalid(format!(
					"verification strategy '{}' does not apply to deposit asset {}",
					strategy, route.deposit_asset.symbol
				)));
			}
		}

		Ok(())
	}
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	pub(crate) const BASE_CONFIG: &str = r#"
[service]
id = "shift-test"

[networks.42161]
name = "arbitrum"
rpc_url = "http://localhost:8545"

[networks.30]
name = "rootstock"
rpc_url = "http://localhost:8546"

[pricing]
timeout_seconds = 3
[pricing.sources.coingecko]
kind = "coingecko"
[pricing.sources.binance]
kind = "binance"
[pricing.sources.okx]
kind = "okx"
[pricing.sources.coinpaprika]
kind = "coinpaprika"

[routes.arbitrum]
source_chain_id = 42161
destination_chain_id = 42161
direction = "divide"
deposit_address = "0xf0f994B4A8dB86A46a1eD4F12263c795b26703Ca"
price_sources = ["coingecko", "binance", "okx", "coinpaprika"]
min_deposit = "0.5"
[routes.arbitrum.deposit_asset]
symbol = "USDC"
address = "0xaf88d065e77c8cC2239327C5EDb3A432268e5831"
decimals = 6
[routes.arbitrum.payout_asset]
symbol = "ARB"
address = "0x912CE59144191C1204E64559FE8253a0e49E6548"
decimals = 18

[payout]
private_key = "${TEST_PAYOUT_KEY:-0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80}"

[storage]
primary = "memory"
[storage.implementations.memory]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("SHIFT_TEST_HOST", "localhost");
		std::env::set_var("SHIFT_TEST_PORT", "8545");

		let result = resolve_env_vars("url = \"${SHIFT_TEST_HOST}:${SHIFT_TEST_PORT}\"").unwrap();
		assert_eq!(result, "url = \"localhost:8545\"");

		std::env::remove_var("SHIFT_TEST_HOST");
		std::env::remove_var("SHIFT_TEST_PORT");
	}

	#[test]
	fn test_env_var_default_and_missing() {
		let result = resolve_env_vars("value = \"${SHIFT_MISSING_VAR:-fallback}\"").unwrap();
		assert_eq!(result, "value = \"fallback\"");

		let err = resolve_env_vars("value = \"${SHIFT_MISSING_VAR}\"").unwrap_err();
		assert!(err.to_string().contains("SHIFT_MISSING_VAR"));
	}

	#[test]
	fn test_base_config_defaults() {
		let config: Config = BASE_CONFIG.parse().unwrap();
		let route = config.route("arbitrum").unwrap();

		assert_eq!(config.service.id, "shift-test");
		assert_eq!(config.settlement.fee_rate, dec!(0.01));
		assert_eq!(config.settlement.idempotency, IdempotencyMode::Replay);
		assert_eq!(config.fee_rate_for(route), dec!(0.01));
		assert_eq!(route.min_sources, 3);
		assert_eq!(route.effective_trim_fraction(), dec!(0.26));
		assert_eq!(route.min_deposit, Some(dec!(0.5)));
		assert_eq!(
			route.effective_verification(),
			vec![
				VerificationStrategy::DepositEvent,
				VerificationStrategy::TokenTransfer
			]
		);
		assert_eq!(config.pricing.source_kind("okx"), Some("okx"));
		assert!(config.payout.private_key.expose_secret().starts_with("0xac09"));
	}

	#[test]
	fn test_route_with_unknown_source_rejected() {
		let config_str = BASE_CONFIG.replace(
			"price_sources = [\"coingecko\", \"binance\", \"okx\", \"coinpaprika\"]",
			"price_sources = [\"coingecko\", \"binance\", \"kraken\"]",
		);
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("price source 'kraken' not found"));
	}

	#[test]
	fn test_min_sources_above_source_count_rejected() {
		let config_str = BASE_CONFIG.replace("min_deposit = \"0.5\"", "min_sources = 5");
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("min_sources (5) exceeds"));
	}

	#[test]
	fn test_trim_fraction_out_of_range_rejected() {
		let config_str = BASE_CONFIG.replace("min_deposit = \"0.5\"", "trim_fraction = \"1.0\"");
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("trim_fraction must be in [0, 1)"));
	}

	#[test]
	fn test_unknown_network_rejected() {
		let config_str =
			BASE_CONFIG.replace("destination_chain_id = 42161", "destination_chain_id = 1");
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("references network 1"));
	}

	#[test]
	fn test_native_strategy_on_token_route_rejected() {
		let config_str = BASE_CONFIG.replace(
			"min_deposit = \"0.5\"",
			"verification = [\"native_value\"]",
		);
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("'native_value' does not apply"));
	}

	#[test]
	fn test_settlement_overrides() {
		let config_str = format!(
			"{}\n[settlement]\nfee_rate = \"0.02\"\nidempotency = \"reject\"\n",
			BASE_CONFIG
		);
		let config = Config::from_str(&config_str).unwrap();
		assert_eq!(config.settlement.fee_rate, dec!(0.02));
		assert_eq!(config.settlement.idempotency, IdempotencyMode::Reject);

		let bad_fee = format!("{}\n[settlement]\nfee_rate = \"1.5\"\n", BASE_CONFIG);
		assert!(Config::from_str(&bad_fee).is_err());
	}

	#[test]
	fn test_network_keys_parsed_by_chain_id() {
		let config_str = BASE_CONFIG.replace(
			"[storage]",
			"[payout.network_keys]\n30 = \"0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d\"\n\n[storage]",
		);
		let config = Config::from_str(&config_str).unwrap();
		assert!(config.payout.network_keys.contains_key(&30));
	}
}

//! Network and asset configuration types.
//!
//! Networks are keyed by chain id. Assets describe either an ERC-20 token
//! (with a contract address) or the network's native coin (no address).

use crate::Address;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// An asset that can be deposited or paid out on a network.
///
/// `address` is `None` for the native coin (ETH, RBTC).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct AssetConfig {
	pub symbol: String,
	#[serde(default)]
	pub address: Option<Address>,
	pub decimals: u8,
}

impl AssetConfig {
	pub fn is_native(&self) -> bool {
		self.address.is_none()
	}
}

/// Configuration for a single blockchain network.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	/// Human readable name used in logs.
	#[serde(default)]
	pub name: Option<String>,
	/// HTTP(S) JSON-RPC endpoint.
	pub rpc_url: String,
}

/// Networks configuration mapping chain ids to their configurations.
pub type NetworksConfig = HashMap<u64, NetworkConfig>;

/// Deserializes `[networks.<chain_id>]` tables, whose keys TOML can only
/// express as strings, into a map keyed by `u64`.
pub fn deserialize_networks<'de, D>(deserializer: D) -> Result<NetworksConfig, D::Error>
where
	D: Deserializer<'de>,
{
	let string_map: HashMap<String, NetworkConfig> = HashMap::deserialize(deserializer)?;
	string_map
		.into_iter()
		.map(|(key, value)| {
			key.parse::<u64>()
				.map(|chain_id| (chain_id, value))
				.map_err(|e| serde::de::Error::custom(format!("Invalid chain_id '{}': {}", key, e)))
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Deserialize)]
	struct Wrapper {
		#[serde(deserialize_with = "deserialize_networks")]
		networks: NetworksConfig,
	}

	#[test]
	fn test_networks_keyed_by_chain_id() {
		let parsed: Wrapper = toml::from_str(
			r#"
[networks.42161]
name = "arbitrum"
rpc_url = "https://arb1.example"

[networks.30]
rpc_url = "https://rootstock.example"
"#,
		)
		.unwrap();

		assert_eq!(parsed.networks.len(), 2);
		assert_eq!(parsed.networks[&42161].name.as_deref(), Some("arbitrum"));
		assert_eq!(parsed.networks[&30].rpc_url, "https://rootstock.example");
	}

	#[test]
	fn test_invalid_chain_id_rejected() {
		let result: Result<Wrapper, _> = toml::from_str(
			r#"
[networks.arbitrum]
rpc_url = "https://arb1.example"
"#,
		);
		assert!(result.is_err());
	}

	#[test]
	fn test_native_asset_has_no_address() {
		let native: AssetConfig = toml::from_str("symbol = \"RBTC\"\ndecimals = 18").unwrap();
		assert!(native.is_native());

		let token: AssetConfig = toml::from_str(
			"symbol = \"USDC\"\naddress = \"0xaf88d065e77c8cC2239327C5EDb3A432268e5831\"\ndecimals = 6",
		)
		.unwrap();
		assert!(!token.is_native());
	}
}

//! Read-only RPC access for on-chain price sources.

use crate::PriceSourceError;
use alloy_primitives::{Address, Bytes};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types::TransactionRequest;
use alloy_transport_http::Http;
use shift_types::NetworksConfig;

pub(crate) type HttpProvider = RootProvider<Http<reqwest::Client>>;

/// Builds an HTTP provider for a configured network.
pub(crate) fn provider_for(
	networks: &NetworksConfig,
	network_id: u64,
) -> Result<HttpProvider, PriceSourceError> {
	let network = networks.get(&network_id).ok_or_else(|| {
		PriceSourceError::Configuration(format!(
			"Network {} not found in configuration",
			network_id
		))
	})?;
	let url = network.rpc_url.parse().map_err(|e| {
		PriceSourceError::Configuration(format!(
			"Invalid RPC URL for network {}: {}",
			network_id, e
		))
	})?;
	Ok(RootProvider::new_http(url))
}

/// Performs an `eth_call` and returns the raw return data.
pub(crate) async fn eth_call(
	provider: &HttpProvider,
	to: Address,
	data: Vec<u8>,
) -> Result<Bytes, PriceSourceError> {
	provider
		.call(&TransactionRequest::default().to(to).input(data.into()))
		.await
		.map_err(|e| PriceSourceError::Chain(format!("eth_call to {} failed: {}", to, e)))
}

/// Reads a required non-negative integer field as a chain id.
pub(crate) fn network_id(config: &toml::Value) -> Result<u64, PriceSourceError> {
	config
		.get("network_id")
		.and_then(|v| v.as_integer())
		.and_then(|v| u64::try_from(v).ok())
		.ok_or_else(|| PriceSourceError::Configuration("Missing 'network_id'".to_string()))
}

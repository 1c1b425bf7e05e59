//! Chain reader backed by an alloy HTTP provider.

use crate::{ChainReader, VerificationError};
use alloy_consensus::Transaction as _;
use alloy_primitives::B256;
use alloy_provider::{Provider, RootProvider};
use alloy_transport_http::Http;
use async_trait::async_trait;
use shift_types::{ChainLog, ChainReceipt, ChainTransaction, NetworksConfig};
use std::collections::HashMap;
use std::sync::Arc;

/// Reads receipts and transactions from one network over JSON-RPC.
pub struct AlloyChainReader {
	chain_id: u64,
	provider: RootProvider<Http<reqwest::Client>>,
}

impl AlloyChainReader {
	/// Creates a reader for a configured network.
	pub fn new(chain_id: u64, networks: &NetworksConfig) -> Result<Self, VerificationError> {
		let network = networks.get(&chain_id).ok_or_else(|| {
			VerificationError::Chain(format!("Network {} not found in configuration", chain_id))
		})?;
		let url = network.rpc_url.parse().map_err(|e| {
			VerificationError::Chain(format!("Invalid RPC URL for network {}: {}", chain_id, e))
		})?;

		Ok(Self {
			chain_id,
			provider: RootProvider::new_http(url),
		})
	}
}

#[async_trait]
impl ChainReader for AlloyChainReader {
	async fn get_receipt(&self, tx_hash: B256) -> Result<Option<ChainReceipt>, VerificationError> {
		let receipt = match self.provider.get_transaction_receipt(tx_hash).await {
			Ok(Some(receipt)) => receipt,
			Ok(None) => return Ok(None),
			Err(e) => {
				return Err(VerificationError::Chain(format!(
					"Failed to get receipt on chain {}: {}",
					self.chain_id, e
				)))
			}
		};

		let logs = receipt
			.inner
			.logs()
			.iter()
			.map(|log| ChainLog {
				address: log.address(),
				topics: log.topics().to_vec(),
				data: log.data().data.clone(),
			})
			.collect();

		Ok(Some(ChainReceipt {
			tx_hash: receipt.transaction_hash,
			block_number: receipt.block_number.unwrap_or(0),
			success: receipt.status(),
			logs,
		}))
	}

	async fn get_transaction(
		&self,
		tx_hash: B256,
	) -> Result<Option<ChainTransaction>, VerificationError> {
		let transaction = self
			.provider
			.get_transaction_by_hash(tx_hash)
			.await
			.map_err(|e| {
				VerificationError::Chain(format!(
					"Failed to get transaction on chain {}: {}",
					self.chain_id, e
				))
			})?;

		Ok(transaction.map(|tx| ChainTransaction {
			from: tx.from,
			to: tx.to(),
			value: tx.value(),
		}))
	}
}

/// Builds one reader per chain id.
pub fn create_readers(
	chain_ids: impl IntoIterator<Item = u64>,
	networks: &NetworksConfig,
) -> Result<HashMap<u64, Arc<dyn ChainReader>>, VerificationError> {
	let mut readers: HashMap<u64, Arc<dyn ChainReader>> = HashMap::new();
	for chain_id in chain_ids {
		if readers.contains_key(&chain_id) {
			continue;
		}
		let reader = AlloyChainReader::new(chain_id, networks)?;
		readers.insert(chain_id, Arc::new(reader));
	}
	Ok(readers)
}

#[cfg(test)]
mod tests {
	use super::*;
	use shift_types::NetworkConfig;

	#[test]
	fn test_readers_require_configured_networks() {
		let mut networks = NetworksConfig::new();
		networks.insert(
			42161,
			NetworkConfig {
				name: Some("arbitrum".to_string()),
				rpc_url: "http://localhost:8545".to_string(),
			},
		);

		let readers = create_readers([42161, 42161], &networks).unwrap();
		assert_eq!(readers.len(), 1);
		assert!(create_readers([30], &networks).is_err());
	}
}

//! Payout wallets backed by alloy.
//!
//! Each wallet signs with a local private key and talks to its network over
//! HTTP JSON-RPC. ERC-20 payouts call `transfer`; native payouts send value.

use crate::{PayoutConfirmation, PayoutError, PayoutInterface};
use alloy_network::EthereumWallet;
use alloy_primitives::{Address, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{sol, SolCall};
use alloy_transport_http::Http;
use async_trait::async_trait;
use shift_types::{truncate_id, AssetConfig, NetworksConfig, SecretString, TransactionHash};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

sol! {
	interface IERC20 {
		function balanceOf(address owner) external view returns (uint256);
		function transfer(address to, uint256 value) external returns (bool);
	}
}

/// How long and how often to wait for a payout receipt.
#[derive(Debug, Clone, Copy)]
pub struct PayoutTiming {
	pub confirmations: u64,
	pub timeout: Duration,
	pub poll_interval: Duration,
}

/// Alloy-based payout wallet for one network.
pub struct AlloyPayout {
	chain_id: u64,
	address: Address,
	provider: Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
	timing: PayoutTiming,
}

impl AlloyPayout {
	pub fn new(
		chain_id: u64,
		networks: &NetworksConfig,
		signer: PrivateKeySigner,
		timing: PayoutTiming,
	) -> Result<Self, PayoutError> {
		let network = networks.get(&chain_id).ok_or_else(|| {
			PayoutError::Configuration(format!("Network {} not found in configuration", chain_id))
		})?;
		let url = network.rpc_url.parse().map_err(|e| {
			PayoutError::Configuration(format!("Invalid RPC URL for network {}: {}", chain_id, e))
		})?;

		let address = signer.address();
		let wallet = EthereumWallet::from(signer.with_chain_id(Some(chain_id)));
		let provider = ProviderBuilder::new()
			.with_recommended_fillers()
			.wallet(wallet)
			.on_http(url);

		Ok(Self {
			chain_id,
			address,
			provider: Arc::new(provider),
			timing,
		})
	}

	fn failed(&self, tx_hash: &TransactionHash, reason: String) -> PayoutError {
		PayoutError::TransferFailed {
			tx_hash: Some(*tx_hash),
			reason,
		}
	}
}

#[async_trait]
impl PayoutInterface for AlloyPayout {
	fn address(&self) -> Address {
		self.address
	}

	async fn balance(&self, asset: &AssetConfig) -> Result<U256, PayoutError> {
		let Some(token) = asset.address else {
			return self.provider.get_balance(self.address).await.map_err(|e| {
				PayoutError::Network(format!("Failed to get balance: {}", e))
			});
		};

		let call = IERC20::balanceOfCall {
			owner: self.address,
		};
		let data = self
			.provider
			.call(
				&TransactionRequest::default()
					.to(token)
					.input(call.abi_encode().into()),
			)
			.await
			.map_err(|e| PayoutError::Network(format!("Failed to call balanceOf: {}", e)))?;

		IERC20::balanceOfCall::abi_decode_returns(&data, true)
			.map(|balance| balance._0)
			.map_err(|e| PayoutError::Network(format!("Invalid balanceOf response: {}", e)))
	}

	async fn transfer(
		&self,
		destination: Address,
		asset: &AssetConfig,
		units: U256,
	) -> Result<TransactionHash, PayoutError> {
		let request = match asset.address {
			Some(token) => {
				let call = IERC20::transferCall {
					to: destination,
					value: units,
				};
				TransactionRequest::default()
					.from(self.address)
					.to(token)
					.input(call.abi_encode().into())
			}
			None => TransactionRequest::default()
				.from(self.address)
				.to(destination)
				.value(units),
		};

		// The wallet filler signs with the configured key.
		let pending_tx = self.provider.send_transaction(request).await.map_err(|e| {
			PayoutError::TransferFailed {
				tx_hash: None,
				reason: format!("Failed to send transaction: {}", e),
			}
		})?;

		Ok(TransactionHash(*pending_tx.tx_hash()))
	}

	async fn wait(&self, tx_hash: &TransactionHash) -> Result<PayoutConfirmation, PayoutError> {
		let start_time = tokio::time::Instant::now();

		tracing::info!(
			tx_hash = %truncate_id(&tx_hash.to_string()),
			chain_id = self.chain_id,
			"Waiting for {} confirmations (timeout: {}s)",
			self.timing.confirmations,
			self.timing.timeout.as_secs()
		);

		loop {
			if start_time.elapsed() > self.timing.timeout {
				return Err(self.failed(
					tx_hash,
					format!(
						"not confirmed after {} seconds",
						self.timing.timeout.as_secs()
					),
				));
			}

			match self.provider.get_transaction_receipt(tx_hash.0).await {
				Ok(Some(receipt)) => {
					let tx_block = receipt.block_number.unwrap_or(0);
					if !receipt.status() {
						return Ok(PayoutConfirmation {
							block_number: tx_block,
							success: false,
						});
					}

					let current_block = self.provider.get_block_number().await.map_err(|e| {
						self.failed(tx_hash, format!("Failed to get block number: {}", e))
					})?;
					let confirmations = current_block.saturating_sub(tx_block) + 1;
					if confirmations >= self.timing.confirmations {
						return Ok(PayoutConfirmation {
							block_number: tx_block,
							success: true,
						});
					}
					tracing::debug!(
						"Waiting for {} more confirmations...",
						self.timing.confirmations.saturating_sub(confirmations)
					);
				}
				// Not mined yet.
				Ok(None) => {}
				Err(e) => {
					tracing::warn!(
						tx_hash = %truncate_id(&tx_hash.to_string()),
						error = %e,
						"Failed to get payout receipt, retrying"
					);
				}
			}

			tokio::time::sleep(self.timing.poll_interval).await;
		}
	}
}

fn parse_signer(key: &SecretString, label: &str) -> Result<PrivateKeySigner, PayoutError> {
	key.with_exposed(|key| {
		key.parse().map_err(|_| {
			PayoutError::Configuration(format!("Invalid private key format for {}", label))
		})
	})
}

/// Creates one payout wallet per destination chain.
///
/// `network_private_keys` override `default_private_key` for their chain.
pub fn create_alloy_payouts(
	chain_ids: impl IntoIterator<Item = u64>,
	networks: &NetworksConfig,
	default_private_key: &SecretString,
	network_private_keys: &HashMap<u64, SecretString>,
	timing: PayoutTiming,
) -> Result<HashMap<u64, Arc<dyn PayoutInterface>>, PayoutError> {
	let default_signer = parse_signer(default_private_key, "the default payout key")?;

	let mut wallets: HashMap<u64, Arc<dyn PayoutInterface>> = HashMap::new();
	for chain_id in chain_ids {
		if wallets.contains_key(&chain_id) {
			continue;
		}
		let signer = match network_private_keys.get(&chain_id) {
			Some(key) => parse_signer(key, &format!("network {}", chain_id))?,
			None => default_signer.clone(),
		};
		let wallet = AlloyPayout::new(chain_id, networks, signer, timing)?;
		tracing::debug!(chain_id, address = %wallet.address(), "Created payout wallet");
		wallets.insert(chain_id, Arc::new(wallet));
	}
	Ok(wallets)
}

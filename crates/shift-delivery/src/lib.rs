//! Payout delivery module for the shift settlement backend.
//!
//! Sends the settled amount to the user on the destination chain. Each
//! destination network has one payout wallet behind [`PayoutInterface`];
//! the [`PayoutDispatcher`] converts the decimal amount into base units,
//! checks the wallet can cover it, submits the transfer and waits for it to
//! be confirmed.

use async_trait::async_trait;
use rust_decimal::Decimal;
use shift_types::{
	format_units, parse_units, truncate_id, Address, AssetConfig, TransactionHash,
	TransferReceipt, U256,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

/// Errors that can occur while paying out.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayoutError {
	#[error("Insufficient funds: required {required}, available {available}")]
	InsufficientFunds { required: Decimal, available: Decimal },
	/// The transfer was submitted, or may have been, and did not confirm.
	#[error("Transfer failed: {reason}")]
	TransferFailed {
		tx_hash: Option<TransactionHash>,
		reason: String,
	},
	#[error("Payout amount rounds to zero")]
	ZeroAmount,
	#[error("Invalid payout amount: {0}")]
	InvalidAmount(String),
	#[error("No payout wallet for chain {0}")]
	UnsupportedChain(u64),
	#[error("Network error: {0}")]
	Network(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

impl PayoutError {
	/// Whether funds may have left the payout wallet.
	pub fn payout_attempted(&self) -> bool {
		matches!(self, PayoutError::TransferFailed { .. })
	}
}

/// Outcome of waiting for a submitted payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutConfirmation {
	pub block_number: u64,
	pub success: bool,
}

/// A payout wallet on one network.
#[async_trait]
pub trait PayoutInterface: Send + Sync {
	/// Address funds are paid from.
	fn address(&self) -> Address;

	/// Balance of `asset` held by the wallet, in base units.
	async fn balance(&self, asset: &AssetConfig) -> Result<U256, PayoutError>;

	/// Submits a transfer of `units` of `asset` and returns its hash without
	/// waiting for inclusion.
	async fn transfer(
		&self,
		destination: Address,
		asset: &AssetConfig,
		units: U256,
	) -> Result<TransactionHash, PayoutError>;

	/// Waits until the transfer is mined with the configured confirmations,
	/// or fails with [`PayoutError::TransferFailed`] on timeout.
	async fn wait(&self, tx_hash: &TransactionHash) -> Result<PayoutConfirmation, PayoutError>;
}

/// Routes payouts to the wallet of the destination network.
pub struct PayoutDispatcher {
	wallets: HashMap<u64, Arc<dyn PayoutInterface>>,
}

impl PayoutDispatcher {
	pub fn new(wallets: HashMap<u64, Arc<dyn PayoutInterface>>) -> Self {
		Self { wallets }
	}

	fn wallet(&self, chain_id: u64) -> Result<&Arc<dyn PayoutInterface>, PayoutError> {
		self.wallets
			.get(&chain_id)
			.ok_or(PayoutError::UnsupportedChain(chain_id))
	}

	pub fn wallet_address(&self, chain_id: u64) -> Result<Address, PayoutError> {
		Ok(self.wallet(chain_id)?.address())
	}

	/// Payout wallet balance of `asset`, in whole units.
	pub async fn balance(
		&self,
		chain_id: u64,
		asset: &AssetConfig,
	) -> Result<Decimal, PayoutError> {
		let units = self.wallet(chain_id)?.balance(asset).await?;
		to_decimal(units, asset)
	}

	/// Pays `amount` of `asset` to `destination`.
	///
	/// The amount is rounded down to the asset's base units. The wallet
	/// balance is checked before anything is submitted.
	pub async fn dispatch_payout(
		&self,
		chain_id: u64,
		destination: Address,
		amount: Decimal,
		asset: &AssetConfig,
	) -> Result<TransferReceipt, PayoutError> {
		let wallet = self.wallet(chain_id)?;

		let units = parse_units(amount, asset.decimals)
			.map_err(|e| PayoutError::InvalidAmount(e.to_string()))?;
		if units.is_zero() {
			return Err(PayoutError::ZeroAmount);
		}
		// Nothing fallible may run once the transfer is submitted.
		let paid = to_decimal(units, asset)?;

		let available = wallet.balance(asset).await?;
		if available < units {
			return Err(PayoutError::InsufficientFunds {
				required: paid,
				available: to_decimal(available, asset)?,
			});
		}

		let tx_hash = wallet.transfer(destination, asset, units).await?;
		tracing::info!(
			tx_hash = %truncate_id(&tx_hash.to_string()),
			chain_id = chain_id,
			destination = %destination,
			asset = %asset.symbol,
			units = %units,
			"Submitted payout"
		);

		let confirmation = wallet.wait(&tx_hash).await?;
		if !confirmation.success {
			return Err(PayoutError::TransferFailed {
				tx_hash: Some(tx_hash),
				reason: "transaction reverted".to_string(),
			});
		}

		Ok(TransferReceipt {
			tx_hash,
			block_number: confirmation.block_number,
			destination,
			asset: asset.symbol.clone(),
			amount: paid,
			units,
		})
	}
}

fn to_decimal(units: U256, asset: &AssetConfig) -> Result<Decimal, PayoutError> {
	format_units(units, asset.decimals).map_err(|e| PayoutError::InvalidAmount(e.to_string()))
}

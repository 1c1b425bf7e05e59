//! Payout transaction types.

use crate::{Address, B256, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Blockchain transaction hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionHash(pub B256);

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", hex::encode(self.0))
	}
}

impl From<B256> for TransactionHash {
	fn from(hash: B256) -> Self {
		Self(hash)
	}
}

/// Receipt of a confirmed payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
	pub tx_hash: TransactionHash,
	pub block_number: u64,
	pub destination: Address,
	pub asset: String,
	/// Amount in whole asset units, after rounding down to base units.
	pub amount: Decimal,
	/// Amount in base units as sent on-chain.
	pub units: U256,
}

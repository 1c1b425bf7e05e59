//! Deposit verification types.
//!
//! Verifiers work over plain chain data ([`ChainReceipt`], [`ChainLog`],
//! [`ChainTransaction`]) so the matching rules can be exercised without an
//! RPC endpoint. A successful verification yields an immutable
//! [`DepositEvent`].

use crate::{AssetConfig, Address, Bytes, B256, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A log entry as emitted in a transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLog {
	/// Contract that emitted the log.
	pub address: Address,
	pub topics: Vec<B256>,
	pub data: Bytes,
}

/// The parts of a mined transaction receipt the verifier needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReceipt {
	pub tx_hash: B256,
	pub block_number: u64,
	/// `false` when the transaction reverted.
	pub success: bool,
	pub logs: Vec<ChainLog>,
}

/// The parts of a transaction body the verifier needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTransaction {
	pub from: Address,
	/// `None` for contract creation.
	pub to: Option<Address>,
	pub value: U256,
}

/// A way of recognising a deposit inside a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStrategy {
	/// `DepositProcessed` emitted by the deposit contract.
	DepositEvent,
	/// ERC-20 `Transfer` from the deposit asset's contract to the deposit address.
	TokenTransfer,
	/// Native value sent directly to the deposit address.
	NativeValue,
}

impl VerificationStrategy {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::DepositEvent => "deposit_event",
			Self::TokenTransfer => "token_transfer",
			Self::NativeValue => "native_value",
		}
	}
}

impl fmt::Display for VerificationStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for VerificationStrategy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"deposit_event" => Ok(Self::DepositEvent),
			"token_transfer" => Ok(Self::TokenTransfer),
			"native_value" => Ok(Self::NativeValue),
			other => Err(format!("Unknown verification strategy '{}'", other)),
		}
	}
}

/// What a deposit for one route is expected to look like.
#[derive(Debug, Clone)]
pub struct DepositExpectation {
	pub chain_id: u64,
	pub deposit_address: Address,
	pub asset: AssetConfig,
	/// Strategies tried in order; the first that matches wins.
	pub strategies: Vec<VerificationStrategy>,
}

/// A deposit confirmed on-chain.
///
/// Only constructed by the deposit verifier; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositEvent {
	pub chain_id: u64,
	pub tx_hash: B256,
	pub block_number: u64,
	pub depositor: Address,
	/// Recipient named by the deposit contract event, when the strategy
	/// provides one.
	pub recipient: Option<Address>,
	pub deposit_address: Address,
	pub asset: String,
	/// Amount in the asset's base units.
	pub raw_amount: U256,
	/// Amount in whole asset units.
	pub amount: Decimal,
	/// Opaque proof bytes carried by the deposit contract event.
	#[serde(default)]
	pub proof: Bytes,
	pub strategy: VerificationStrategy,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_strategy_round_trips_through_config_names() {
		for strategy in [
			VerificationStrategy::DepositEvent,
			VerificationStrategy::TokenTransfer,
			VerificationStrategy::NativeValue,
		] {
			assert_eq!(strategy.as_str().parse::<VerificationStrategy>(), Ok(strategy));
		}
		assert!("events".parse::<VerificationStrategy>().is_err());
	}

	#[test]
	fn test_strategy_deserializes_snake_case() {
		let parsed: Vec<VerificationStrategy> =
			serde_json::from_str("[\"token_transfer\",\"native_value\"]").unwrap();
		assert_eq!(
			parsed,
			vec![
				VerificationStrategy::TokenTransfer,
				VerificationStrategy::NativeValue
			]
		);
	}
}

//! Deposit verification module for the shift settlement backend.
//!
//! Before any price is fetched, the source-chain transaction named by a swap
//! request must be shown to have been mined successfully and to carry a
//! deposit to the route's deposit address. Chain access sits behind the
//! [`ChainReader`] trait; the matching rules for each
//! [`VerificationStrategy`] live in [`strategies`] and work over plain
//! receipt data.

use async_trait::async_trait;
use shift_types::{
	truncate_id, ChainReceipt, ChainTransaction, DepositEvent, DepositExpectation,
	VerificationStrategy, B256,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod strategies;

pub mod implementations {
	pub mod alloy;
}

/// Errors that can occur while verifying a deposit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
	/// No receipt exists for the hash (unknown or not yet mined).
	#[error("Transaction {0} not found")]
	TxNotFound(B256),
	#[error("Transaction {0} reverted")]
	TxReverted(B256),
	#[error("Deposit event not found: {0}")]
	EventNotFound(String),
	#[error("Transfer not found: {0}")]
	TransferNotFound(String),
	#[error("No chain reader for chain {0}")]
	UnsupportedChain(u64),
	#[error("Chain error: {0}")]
	Chain(String),
}

/// Read access to a chain's mined transactions.
#[async_trait]
pub trait ChainReader: Send + Sync {
	/// Returns the receipt of a mined transaction, or `None` when the hash is
	/// unknown or still pending.
	async fn get_receipt(&self, tx_hash: B256) -> Result<Option<ChainReceipt>, VerificationError>;

	/// Returns the transaction body, or `None` when the hash is unknown.
	async fn get_transaction(
		&self,
		tx_hash: B256,
	) -> Result<Option<ChainTransaction>, VerificationError>;
}

/// Verifies deposits against per-chain readers.
pub struct DepositVerifier {
	readers: HashMap<u64, Arc<dyn ChainReader>>,
}

impl DepositVerifier {
	pub fn new(readers: HashMap<u64, Arc<dyn ChainReader>>) -> Self {
		Self { readers }
	}

	pub fn supports_chain(&self, chain_id: u64) -> bool {
		self.readers.contains_key(&chain_id)
	}

	/// Confirms that `tx_hash` was mined successfully and deposits into the
	/// expected address.
	///
	/// Strategies are attempted in the expectation's order and the first
	/// match wins. When none matches, the error of the last strategy
	/// attempted is returned.
	pub async fn verify_deposit(
		&self,
		tx_hash: B256,
		expected: &DepositExpectation,
	) -> Result<DepositEvent, VerificationError> {
		let reader = self
			.readers
			.get(&expected.chain_id)
			.ok_or(VerificationError::UnsupportedChain(expected.chain_id))?;

		let receipt = reader
			.get_receipt(tx_hash)
			.await?
			.ok_or(VerificationError::TxNotFound(tx_hash))?;
		if !receipt.success {
			return Err(VerificationError::TxReverted(tx_hash));
		}

		let mut last_error = VerificationError::TransferNotFound(format!(
			"no verification strategy configured for {}",
			expected.asset.symbol
		));

		for strategy in &expected.strategies {
			let attempt = match strategy {
				VerificationStrategy::DepositEvent => {
					strategies::match_deposit_event(&receipt, expected)
				}
				VerificationStrategy::TokenTransfer => {
					strategies::match_token_transfer(&receipt, expected)
				}
				VerificationStrategy::NativeValue => {
					let transaction = reader.get_transaction(tx_hash).await?.ok_or_else(|| {
						VerificationError::TransferNotFound(format!(
							"transaction body of {} unavailable",
							tx_hash
						))
					})?;
					strategies::match_native_value(&receipt, &transaction, expected)
				}
			};

			match attempt {
				Ok(event) => {
					tracing::info!(
						tx_hash = %truncate_id(&tx_hash.to_string()),
						chain_id = expected.chain_id,
						strategy = %strategy,
						amount = %event.amount,
						asset = %event.asset,
						"Verified deposit"
					);
					return Ok(event);
				}
				Err(e) => {
					tracing::debug!(strategy = %strategy, error = %e, "Strategy did not match");
					last_error = e;
				}
			}
		}

		Err(last_error)
	}
}


#[cfg(test)]
mod tests {
	use super::test_support::*;
	use super::*;
	use rust_decimal_macros::dec;
	use shift_types::{Address, U256};

	fn verifier(chain: FakeChain) -> DepositVerifier {
		let mut readers: HashMap<u64, Arc<dyn ChainReader>> = HashMap::new();
		readers.insert(42161, Arc::new(chain));
		DepositVerifier::new(readers)
	}

	#[tokio::test]
	async fn test_missing_receipt_is_not_found() {
		let verifier = verifier(FakeChain::default());
		let result = verifier
			.verify_deposit(
				tx_hash(),
				&expectation(usdc(), vec![VerificationStrategy::TokenTransfer]),
			)
			.await;
		assert_eq!(result, Err(VerificationError::TxNotFound(tx_hash())));
	}

	#[tokio::test]
	async fn test_reverted_transaction_rejected() {
		let log = transfer_log(
			usdc().address.unwrap(),
			Address::repeat_byte(0x01),
			deposit_address(),
			U256::from(100_000_000u64),
		);
		let verifier = verifier(FakeChain::with_receipt(receipt(false, vec![log])));
		let result = verifier
			.verify_deposit(
				tx_hash(),
				&expectation(usdc(), vec![VerificationStrategy::TokenTransfer]),
			)
			.await;
		assert_eq!(result, Err(VerificationError::TxReverted(tx_hash())));
	}

	#[tokio::test]
	async fn test_receipt_without_logs_has_no_transfer() {
		let verifier = verifier(FakeChain::with_receipt(receipt(true, vec![])));
		let result = verifier
			.verify_deposit(
				tx_hash(),
				&expectation(usdc(), vec![VerificationStrategy::TokenTransfer]),
			)
			.await;
		assert!(matches!(result, Err(VerificationError::TransferNotFound(_))));
	}

	#[tokio::test]
	async fn test_transfer_to_other_address_is_not_found() {
		let log = transfer_log(
			usdc().address.unwrap(),
			Address::repeat_byte(0x01),
			Address::repeat_byte(0xee),
			U256::from(100_000_000u64),
		);
		let verifier = verifier(FakeChain::with_receipt(receipt(true, vec![log])));
		let result = verifier
			.verify_deposit(
				tx_hash(),
				&expectation(
					usdc(),
					vec![
						VerificationStrategy::DepositEvent,
						VerificationStrategy::TokenTransfer,
					],
				),
			)
			.await;
		assert!(matches!(result, Err(VerificationError::TransferNotFound(_))));
	}

	#[tokio::test]
	async fn test_falls_through_to_token_transfer() {
		let depositor = Address::repeat_byte(0x01);
		let log = transfer_log(
			usdc().address.unwrap(),
			depositor,
			deposit_address(),
			U256::from(100_000_000u64),
		);
		let verifier = verifier(FakeChain::with_receipt(receipt(true, vec![log])));
		let event = verifier
			.verify_deposit(
				tx_hash(),
				&expectation(
					usdc(),
					vec![
						VerificationStrategy::DepositEvent,
						VerificationStrategy::TokenTransfer,
					],
				),
			)
			.await
			.unwrap();

		assert_eq!(event.strategy, VerificationStrategy::TokenTransfer);
		assert_eq!(event.amount, dec!(100));
		assert_eq!(event.depositor, depositor);
		assert_eq!(event.block_number, 1234);
	}

	#[tokio::test]
	async fn test_native_value_uses_transaction_body() {
		let chain = FakeChain::with_receipt(receipt(true, vec![]));
		chain.add_transaction(
			tx_hash(),
			ChainTransaction {
				from: Address::repeat_byte(0x02),
				to: Some(deposit_address()),
				value: U256::from(250_000_000_000_000_000u128),
			},
		);
		let verifier = verifier(chain);
		let event = verifier
			.verify_deposit(
				tx_hash(),
				&expectation(native(), vec![VerificationStrategy::NativeValue]),
			)
			.await
			.unwrap();

		assert_eq!(event.amount, dec!(0.25));
		assert_eq!(event.asset, "RBTC");
		assert_eq!(event.recipient, None);
	}

	#[tokio::test]
	async fn test_unknown_chain_and_rpc_failure() {
		let verifier = verifier(FakeChain {
			fail_with: Some("connection reset".to_string()),
			..FakeChain::default()
		});

		let mut expected = expectation(usdc(), vec![VerificationStrategy::TokenTransfer]);
		assert!(matches!(
			verifier.verify_deposit(tx_hash(), &expected).await,
			Err(VerificationError::Chain(_))
		));

		expected.chain_id = 1;
		assert_eq!(
			verifier.verify_deposit(tx_hash(), &expected).await,
			Err(VerificationError::UnsupportedChain(1))
		);
	}
}

//! Matching rules for each verification strategy.
//!
//! Logs are scanned in receipt order and the first structural match wins.
//! A log that carries the right signature but fails to decode is skipped.

use crate::VerificationError;
use alloy_sol_types::{sol, SolEvent};
use rust_decimal::Decimal;
use shift_types::{
	format_units, Bytes, ChainLog, ChainReceipt, ChainTransaction, DepositEvent,
	DepositExpectation, VerificationStrategy, U256,
};

sol! {
	/// Emitted by the deposit contract once it has accepted a deposit.
	event DepositProcessed(
		uint256 amount,
		address indexed depositor,
		address indexed recipient,
		bytes proof
	);

	/// ERC-20 transfer.
	event Transfer(address indexed from, address indexed to, uint256 value);
}

fn decode<E: SolEvent>(log: &ChainLog) -> Option<E> {
	if log.topics.first() != Some(&E::SIGNATURE_HASH) {
		return None;
	}
	match E::decode_raw_log(log.topics.iter().copied(), &log.data, true) {
		Ok(event) => Some(event),
		Err(e) => {
			tracing::debug!(
				emitter = %log.address,
				event = E::SIGNATURE,
				error = %e,
				"Skipping undecodable log"
			);
			None
		}
	}
}

fn amount_of(raw: U256, expected: &DepositExpectation) -> Result<Decimal, VerificationError> {
	format_units(raw, expected.asset.decimals).map_err(|e| {
		VerificationError::Chain(format!("deposit amount {} is not representable: {}", raw, e))
	})
}

/// Finds a `DepositProcessed` event emitted by the deposit address.
pub fn match_deposit_event(
	receipt: &ChainReceipt,
	expected: &DepositExpectation,
) -> Result<DepositEvent, VerificationError> {
	let event = receipt
		.logs
		.iter()
		.filter(|log| log.address == expected.deposit_address)
		.find_map(decode::<DepositProcessed>)
		.ok_or_else(|| {
			VerificationError::EventNotFound(format!(
				"no DepositProcessed emitted by {}",
				expected.deposit_address
			))
		})?;

	Ok(DepositEvent {
		chain_id: expected.chain_id,
		tx_hash: receipt.tx_hash,
		block_number: receipt.block_number,
		depositor: event.depositor,
		recipient: Some(event.recipient),
		deposit_address: expected.deposit_address,
		asset: expected.asset.symbol.clone(),
		raw_amount: event.amount,
		amount: amount_of(event.amount, expected)?,
		proof: event.proof,
		strategy: VerificationStrategy::DepositEvent,
	})
}

/// Finds an ERC-20 `Transfer` of the deposit asset into the deposit address.
pub fn match_token_transfer(
	receipt: &ChainReceipt,
	expected: &DepositExpectation,
) -> Result<DepositEvent, VerificationError> {
	let token = expected.asset.address.ok_or_else(|| {
		VerificationError::TransferNotFound(format!(
			"{} is a native asset and has no token contract",
			expected.asset.symbol
		))
	})?;

	let transfer = receipt
		.logs
		.iter()
		.filter(|log| log.address == token)
		.filter_map(decode::<Transfer>)
		.find(|transfer| transfer.to == expected.deposit_address)
		.ok_or_else(|| {
			VerificationError::TransferNotFound(format!(
				"no {} transfer to {}",
				expected.asset.symbol, expected.deposit_address
			))
		})?;

	Ok(DepositEvent {
		chain_id: expected.chain_id,
		tx_hash: receipt.tx_hash,
		block_number: receipt.block_number,
		depositor: transfer.from,
		recipient: None,
		deposit_address: expected.deposit_address,
		asset: expected.asset.symbol.clone(),
		raw_amount: transfer.value,
		amount: amount_of(transfer.value, expected)?,
		proof: Bytes::new(),
		strategy: VerificationStrategy::TokenTransfer,
	})
}

/// Checks that the transaction itself sent value to the deposit address.
pub fn match_native_value(
	receipt: &ChainReceipt,
	transaction: &ChainTransaction,
	expected: &DepositExpectation,
) -> Result<DepositEvent, VerificationError> {
	if transaction.to != Some(expected.deposit_address) {
		return Err(VerificationError::TransferNotFound(format!(
			"transaction is not addressed to {}",
			expected.deposit_address
		)));
	}
	if transaction.value.is_zero() {
		return Err(VerificationError::TransferNotFound(
			"transaction carries no value".to_string(),
		));
	}

	Ok(DepositEvent {
		chain_id: expected.chain_id,
		tx_hash: receipt.tx_hash,
		block_number: receipt.block_number,
		depositor: transaction.from,
		recipient: None,
		deposit_address: expected.deposit_address,
		asset: expected.asset.symbol.clone(),
		raw_amount: transaction.value,
		amount: amount_of(transaction.value, expected)?,
		proof: Bytes::new(),
		strategy: VerificationStrategy::NativeValue,
	})
}

//! Core swap engine for the shift settlement backend.
//!
//! A swap runs verify → price → settle → pay. The [`SwapEngine`] drives that
//! flow for one configured route at a time and wraps it in the
//! [`IdempotencyLedger`], so that a source transaction hash is paid out at
//! most once. The [`SwapBuilder`] assembles an engine from configuration.

use shift_delivery::PayoutError;
use shift_deposit::VerificationError;
use shift_pricing::ConsensusError;
use shift_settlement::SettlementError;
use thiserror::Error;

pub mod builder;
pub mod engine;
pub mod ledger;

pub use builder::{BuilderError, SwapBuilder, SwapFactories};
pub use engine::{Route, SwapEngine};
pub use ledger::{Claim, IdempotencyLedger, SwapOutcome, SwapRecord, SwapStage, SwapStatus};

/// Why a repeated transaction hash was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateReason {
	/// Another request for the same hash is still being processed.
	InFlight,
	/// The hash was already settled and the ledger rejects repeats.
	Completed,
	/// A previous attempt failed after the payout was submitted; the
	/// outcome needs manual reconciliation.
	PayoutAttempted,
}

impl DuplicateReason {
	pub fn as_str(&self) -> &'static str {
		match self {
			DuplicateReason::InFlight => "in_flight",
			DuplicateReason::Completed => "completed",
			DuplicateReason::PayoutAttempted => "payout_attempted",
		}
	}
}

/// Errors that can occur while processing a swap.
#[derive(Debug, Error)]
pub enum SwapError {
	#[error("Unknown route '{0}'")]
	UnknownRoute(String),
	#[error("Invalid request: {0}")]
	Input(String),
	#[error("Settlement rejected: {0}")]
	Settlement(#[from] SettlementError),
	#[error("Deposit verification failed: {0}")]
	Verification(#[from] VerificationError),
	#[error("Price consensus unavailable: {0}")]
	Consensus(#[from] ConsensusError),
	#[error("Payout failed: {0}")]
	Payout(#[from] PayoutError),
	#[error("Transaction {tx_hash} was already submitted ({})", reason.as_str())]
	Duplicate {
		tx_hash: String,
		reason: DuplicateReason,
	},
	#[error("Internal error: {0}")]
	Internal(String),
}

/// Broad classification of a [`SwapError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// The request itself is wrong; retrying it unchanged will fail again.
	InvalidRequest,
	NotFound,
	Conflict,
	/// Not enough price data right now; the request may succeed later.
	Unavailable,
	Internal,
}

impl ErrorKind {
	pub fn is_client_error(&self) -> bool {
		matches!(
			self,
			ErrorKind::InvalidRequest | ErrorKind::NotFound | ErrorKind::Conflict
		)
	}
}

impl SwapError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			SwapError::UnknownRoute(_) => ErrorKind::NotFound,
			SwapError::Settlement(SettlementError::InvalidRate(_)) => ErrorKind::Unavailable,
			SwapError::Settlement(SettlementError::InvalidFee(_))
			| SwapError::Settlement(SettlementError::Overflow(_)) => ErrorKind::Internal,
			SwapError::Input(_) | SwapError::Settlement(_) => ErrorKind::InvalidRequest,
			SwapError::Verification(VerificationError::Chain(_))
			| SwapError::Verification(VerificationError::UnsupportedChain(_)) => {
				ErrorKind::Internal
			}
			SwapError::Verification(_) => ErrorKind::InvalidRequest,
			SwapError::Consensus(ConsensusError::InvalidTrimFraction(_)) => ErrorKind::Internal,
			SwapError::Consensus(_) => ErrorKind::Unavailable,
			SwapError::Payout(_) | SwapError::Internal(_) => ErrorKind::Internal,
			SwapError::Duplicate { .. } => ErrorKind::Conflict,
		}
	}

	/// Short machine readable code for API responses.
	pub fn code(&self) -> &'static str {
		match self {
			SwapError::UnknownRoute(_) => "UNKNOWN_ROUTE",
			SwapError::Input(_) => "INVALID_REQUEST",
			SwapError::Settlement(SettlementError::BelowMinimum { .. }) => "DEPOSIT_BELOW_MINIMUM",
			SwapError::Settlement(SettlementError::InvalidPrediction(_)) => "INVALID_PREDICTION",
			SwapError::Settlement(SettlementError::InvalidRate(_)) => "INVALID_PRICE",
			SwapError::Settlement(SettlementError::InvalidFee(_))
			| SwapError::Settlement(SettlementError::Overflow(_)) => "SETTLEMENT_FAILED",
			SwapError::Settlement(_) => "SETTLEMENT_REJECTED",
			SwapError::Verification(VerificationError::TxNotFound(_)) => "TX_NOT_FOUND",
			SwapError::Verification(VerificationError::TxReverted(_)) => "TX_REVERTED",
			SwapError::Verification(VerificationError::EventNotFound(_)) => {
				"DEPOSIT_EVENT_NOT_FOUND"
			}
			SwapError::Verification(VerificationError::TransferNotFound(_)) => "TRANSFER_NOT_FOUND",
			SwapError::Verification(_) => "CHAIN_ERROR",
			SwapError::Consensus(_) => "INSUFFICIENT_PRICE_DATA",
			SwapError::Payout(PayoutError::InsufficientFunds { .. }) => "INSUFFICIENT_FUNDS",
			SwapError::Payout(_) => "PAYOUT_FAILED",
			SwapError::Duplicate { .. } => "DUPLICATE_TRANSACTION",
			SwapError::Internal(_) => "INTERNAL_ERROR",
		}
	}

	/// Structured details for API error bodies, where the error carries any.
	pub fn details(&self) -> Option<serde_json::Value> {
		match self {
			SwapError::Duplicate { tx_hash, reason } => Some(serde_json::json!({
				"txHash": tx_hash,
				"reason": reason.as_str(),
			})),
			SwapError::Settlement(SettlementError::BelowMinimum { deposited, minimum }) => {
				Some(serde_json::json!({
					"deposited": deposited.to_string(),
					"minimum": minimum.to_string(),
				}))
			}
			SwapError::Verification(VerificationError::TxNotFound(tx_hash))
			| SwapError::Verification(VerificationError::TxReverted(tx_hash)) => {
				Some(serde_json::json!({ "txHash": tx_hash.to_string() }))
			}
			_ => None,
		}
	}
}

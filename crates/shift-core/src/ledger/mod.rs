//! Idempotency ledger keyed by source transaction hash.
//!
//! Every swap claims its deposit transaction hash before any side effect.
//! The claim check and the `InFlight` mark happen under one lock, so two
//! concurrent requests for the same hash cannot both proceed. Records
//! survive restarts when the primary storage is persistent.
//!
//! Repeats are handled as follows:
//! - in flight: always rejected
//! - completed: replayed or rejected depending on [`IdempotencyMode`]
//! - failed before the payout was submitted: retried
//! - failed after the payout was submitted: rejected for manual review

use crate::{DuplicateReason, SwapError};
use serde::{Deserialize, Serialize};
use shift_config::IdempotencyMode;
use shift_storage::StorageService;
use shift_types::{
	current_timestamp, truncate_id, DepositEvent, SettlementDecision, StorageKey, TransferReceipt,
};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Step of the swap flow at which a swap stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapStage {
	Verification,
	Pricing,
	Settlement,
	Payout,
}

impl fmt::Display for SwapStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			SwapStage::Verification => "verification",
			SwapStage::Pricing => "pricing",
			SwapStage::Settlement => "settlement",
			SwapStage::Payout => "payout",
		};
		f.write_str(name)
	}
}

/// Everything produced by a completed swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapOutcome {
	pub deposit: DepositEvent,
	pub decision: SettlementDecision,
	pub payout: TransferReceipt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SwapStatus {
	InFlight,
	Completed {
		outcome: SwapOutcome,
	},
	Failed {
		stage: SwapStage,
		reason: String,
		payout_attempted: bool,
	},
}

/// Ledger entry for one source transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRecord {
	pub route: String,
	pub tx_hash: String,
	pub status: SwapStatus,
	pub created_at: u64,
	pub updated_at: u64,
}

/// Result of claiming a transaction hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
	/// The caller owns the hash and must run the swap.
	Fresh,
	/// The hash was already settled; here is what it produced.
	Replay(Box<SwapOutcome>),
}

pub struct IdempotencyLedger {
	storage: Arc<StorageService>,
	mode: IdempotencyMode,
	lock: Mutex<()>,
}

impl IdempotencyLedger {
	pub fn new(storage: Arc<StorageService>, mode: IdempotencyMode) -> Self {
		Self {
			storage,
			mode,
			lock: Mutex::new(()),
		}
	}

	pub fn mode(&self) -> IdempotencyMode {
		self.mode
	}

	/// Claims `tx_hash` for `route`, or explains why it cannot be claimed.
	pub async fn claim(&self, route: &str, tx_hash: &str) -> Result<Claim, SwapError> {
		if self.mode == IdempotencyMode::Disabled {
			return Ok(Claim::Fresh);
		}

		let _guard = self.lock.lock().await;
		let existing = self
			.storage
			.find::<SwapRecord>(StorageKey::Swaps, tx_hash)
			.await
			.map_err(|e| SwapError::Internal(format!("Failed to read ledger: {}", e)))?;

		let created_at = match existing {
			None => current_timestamp(),
			Some(record) => {
				let duplicate = |reason: DuplicateReason| {
					tracing::warn!(
						tx_hash = %truncate_id(tx_hash),
						route = %record.route,
						reason = reason.as_str(),
						"Rejected repeated transaction"
					);
					Err(SwapError::Duplicate {
						tx_hash: tx_hash.to_string(),
						reason,
					})
				};

				match &record.status {
					SwapStatus::InFlight => return duplicate(DuplicateReason::InFlight),
					SwapStatus::Completed { outcome } => {
						if self.mode == IdempotencyMode::Replay && record.route == route {
							tracing::info!(
								tx_hash = %truncate_id(tx_hash),
								"Replaying completed swap"
							);
							return Ok(Claim::Replay(Box::new(outcome.clone())));
						}
						return duplicate(DuplicateReason::Completed);
					}
					SwapStatus::Failed {
						payout_attempted: true,
						..
					} => return duplicate(DuplicateReason::PayoutAttempted),
					SwapStatus::Failed { stage, .. } => {
						tracing::info!(
							tx_hash = %truncate_id(tx_hash),
							previous_stage = %stage,
							"Retrying swap that failed before payout"
						);
						record.created_at
					}
				}
			}
		};

		self.write(route, tx_hash, SwapStatus::InFlight, created_at)
			.await
	}

	/// Marks a claimed hash as completed.
	pub async fn complete(
		&self,
		route: &str,
		tx_hash: &str,
		outcome: &SwapOutcome,
	) -> Result<(), SwapError> {
		let status = SwapStatus::Completed {
			outcome: outcome.clone(),
		};
		self.finish(route, tx_hash, status).await
	}

	/// Marks a claimed hash as failed.
	pub async fn fail(
		&self,
		route: &str,
		tx_hash: &str,
		stage: SwapStage,
		reason: String,
		payout_attempted: bool,
	) -> Result<(), SwapError> {
		let status = SwapStatus::Failed {
			stage,
			reason,
			payout_attempted,
		};
		self.finish(route, tx_hash, status).await
	}

	/// Stores the settlement decision for audit, in every mode.
	pub async fn record_decision(
		&self,
		tx_hash: &str,
		decision: &SettlementDecision,
	) -> Result<(), SwapError> {
		self.storage
			.store(StorageKey::Decisions, tx_hash, decision)
			.await
			.map_err(|e| SwapError::Internal(format!("Failed to store decision: {}", e)))
	}

	pub async fn record(&self, tx_hash: &str) -> Result<Option<SwapRecord>, SwapError> {
		self.storage
			.find(StorageKey::Swaps, tx_hash)
			.await
			.map_err(|e| SwapError::Internal(format!("Failed to read ledger: {}", e)))
	}

	async fn finish(
		&self,
		route: &str,
		tx_hash: &str,
		status: SwapStatus,
	) -> Result<(), SwapError> {
		if self.mode == IdempotencyMode::Disabled {
			return Ok(());
		}

		let _guard = self.lock.lock().await;
		let created_at = self
			.record(tx_hash)
			.await?
			.map(|record| record.created_at)
			.unwrap_or_else(current_timestamp);
		self.write(route, tx_hash, status, created_at)
			.await
			.map(|_| ())
	}

	async fn write(
		&self,
		route: &str,
		tx_hash: &str,
		status: SwapStatus,
		created_at: u64,
	) -> Result<Claim, SwapError> {
		let record = SwapRecord {
			route: route.to_string(),
			tx_hash: tx_hash.to_string(),
			status,
			created_at,
			updated_at: current_timestamp(),
		};
		self.storage
			.store(StorageKey::Swaps, tx_hash, &record)
			.await
			.map_err(|e| SwapError::Internal(format!("Failed to write ledger: {}", e)))?;
		Ok(Claim::Fresh)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::engine::tests::sample_outcome;
	use shift_storage::implementations::memory::MemoryStorage;

	const TX: &str = "0xabababababababababababababababababababababababababababababababab";

	fn ledger(mode: IdempotencyMode) -> IdempotencyLedger {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		IdempotencyLedger::new(storage, mode)
	}

	fn duplicate_reason(result: Result<Claim, SwapError>) -> Option<DuplicateReason> {
		match result {
			Err(SwapError::Duplicate { reason, .. }) => Some(reason),
			_ => None,
		}
	}

	#[tokio::test]
	async fn test_in_flight_repeat_rejected() {
		let ledger = ledger(IdempotencyMode::Replay);
		assert_eq!(ledger.claim("arbitrum", TX).await.unwrap(), Claim::Fresh);
		assert_eq!(
			duplicate_reason(ledger.claim("arbitrum", TX).await),
			Some(DuplicateReason::InFlight)
		);
	}

	#[tokio::test]
	async fn test_completed_swap_replayed_or_rejected() {
		let outcome = sample_outcome();

		let replay = ledger(IdempotencyMode::Replay);
		replay.claim("arbitrum", TX).await.unwrap();
		replay.complete("arbitrum", TX, &outcome).await.unwrap();
		assert_eq!(
			replay.claim("arbitrum", TX).await.unwrap(),
			Claim::Replay(Box::new(outcome.clone()))
		);
		// The same hash under another route is never replayed.
		assert_eq!(
			duplicate_reason(replay.claim("rootstock", TX).await),
			Some(DuplicateReason::Completed)
		);

		let reject = ledger(IdempotencyMode::Reject);
		reject.claim("arbitrum", TX).await.unwrap();
		reject.complete("arbitrum", TX, &outcome).await.unwrap();
		assert_eq!(
			duplicate_reason(reject.claim("arbitrum", TX).await),
			Some(DuplicateReason::Completed)
		);
	}

	#[tokio::test]
	async fn test_failure_before_payout_allows_retry() {
		let ledger = ledger(IdempotencyMode::Replay);
		ledger.claim("arbitrum", TX).await.unwrap();
		ledger
			.fail(
				"arbitrum",
				TX,
				SwapStage::Pricing,
				"insufficient data".into(),
				false,
			)
			.await
			.unwrap();

		let first = ledger.record(TX).await.unwrap().unwrap();
		assert_eq!(ledger.claim("arbitrum", TX).await.unwrap(), Claim::Fresh);
		let retried = ledger.record(TX).await.unwrap().unwrap();
		assert_eq!(retried.status, SwapStatus::InFlight);
		assert_eq!(retried.created_at, first.created_at);
	}

	#[tokio::test]
	async fn test_failure_after_payout_needs_reconciliation() {
		let ledger = ledger(IdempotencyMode::Replay);
		ledger.claim("arbitrum", TX).await.unwrap();
		ledger
			.fail("arbitrum", TX, SwapStage::Payout, "timeout".into(), true)
			.await
			.unwrap();
		assert_eq!(
			duplicate_reason(ledger.claim("arbitrum", TX).await),
			Some(DuplicateReason::PayoutAttempted)
		);
	}

	#[tokio::test]
	async fn test_disabled_ledger_keeps_no_records() {
		let ledger = ledger(IdempotencyMode::Disabled);
		assert_eq!(ledger.claim("arbitrum", TX).await.unwrap(), Claim::Fresh);
		ledger
			.complete("arbitrum", TX, &sample_outcome())
			.await
			.unwrap();
		assert_eq!(ledger.claim("arbitrum", TX).await.unwrap(), Claim::Fresh);
		assert!(ledger.record(TX).await.unwrap().is_none());
	}
}

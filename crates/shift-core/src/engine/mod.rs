//! Swap engine that runs one swap end to end.
//!
//! Each request is checked, claimed in the [`IdempotencyLedger`], then taken
//! through deposit verification, price consensus, settlement and payout. A
//! failure is recorded against the stage it happened in so the ledger can
//! tell retryable failures from ones that may already have moved funds.

mod request;
mod route;

pub use route::Route;

use crate::ledger::{Claim, IdempotencyLedger, SwapOutcome, SwapStage};
use crate::SwapError;
use request::SwapInput;
use shift_delivery::PayoutDispatcher;
use shift_deposit::DepositVerifier;
use shift_pricing::PriceService;
use shift_storage::StorageService;
use shift_types::{truncate_id, BalanceResponse, PriceResponse, SwapRequest, SwapResponse};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Drives swaps for every configured route.
#[derive(Clone)]
pub struct SwapEngine {
	routes: Arc<HashMap<String, Route>>,
	storage: Arc<StorageService>,
	verifier: Arc<DepositVerifier>,
	prices: Arc<PriceService>,
	payouts: Arc<PayoutDispatcher>,
	ledger: Arc<IdempotencyLedger>,
	/// Interval of the expired-entry sweep; zero disables it.
	cleanup_interval: Duration,
}

impl SwapEngine {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		routes: HashMap<String, Route>,
		storage: Arc<StorageService>,
		verifier: Arc<DepositVerifier>,
		prices: Arc<PriceService>,
		payouts: Arc<PayoutDispatcher>,
		ledger: Arc<IdempotencyLedger>,
		cleanup_interval: Duration,
	) -> Self {
		Self {
			routes: Arc::new(routes),
			storage,
			verifier,
			prices,
			payouts,
			ledger,
			cleanup_interval,
		}
	}

	pub fn route(&self, name: &str) -> Result<&Route, SwapError> {
		self.routes
			.get(name)
			.ok_or_else(|| SwapError::UnknownRoute(name.to_string()))
	}

	/// Names of the configured routes, sorted.
	pub fn route_names(&self) -> Vec<&str> {
		let mut names: Vec<_> = self.routes.keys().map(String::as_str).collect();
		names.sort_unstable();
		names
	}

	pub fn ledger(&self) -> &Arc<IdempotencyLedger> {
		&self.ledger
	}

	/// Processes one swap request on `route_name`.
	///
	/// Input errors are returned before the transaction hash is claimed, so a
	/// malformed request never blocks a later, valid one.
	#[instrument(skip_all, fields(route = %route_name))]
	pub async fn process_swap(
		&self,
		route_name: &str,
		request: &SwapRequest,
	) -> Result<SwapResponse, SwapError> {
		let route = self.route(route_name)?;
		let input = SwapInput::parse(request)?;
		if let Some(claimed) = input.claimed_deposit {
			route.settlement.check_deposit(claimed)?;
		}

		let key = input.ledger_key();
		if let Claim::Replay(outcome) = self.ledger.claim(&route.name, &key).await? {
			return Ok(to_response(route, *outcome, true));
		}

		match self.execute(route, &input, &key).await {
			Ok(outcome) => {
				if let Err(e) = self.ledger.complete(&route.name, &key, &outcome).await {
					// The payout went through; the caller still gets its receipt.
					tracing::error!(
						tx_hash = %truncate_id(&key),
						error = %e,
						"Failed to record completed swap"
					);
				}
				tracing::info!(
					tx_hash = %truncate_id(&key),
					final_amount = %outcome.payout.amount,
					payout_tx = %truncate_id(&outcome.payout.tx_hash.to_string()),
					"Swap completed"
				);
				Ok(to_response(route, outcome, false))
			}
			Err((stage, error)) => {
				let payout_attempted =
					matches!(&error, SwapError::Payout(e) if e.payout_attempted());
				tracing::warn!(
					tx_hash = %truncate_id(&key),
					stage = %stage,
					payout_attempted,
					error = %error,
					"Swap failed"
				);
				if let Err(e) = self
					.ledger
					.fail(
						&route.name,
						&key,
						stage,
						error.to_string(),
						payout_attempted,
					)
					.await
				{
					tracing::error!(
						tx_hash = %truncate_id(&key),
						error = %e,
						"Failed to record swap failure"
					);
				}
				Err(error)
			}
		}
	}

	async fn execute(
		&self,
		route: &Route,
		input: &SwapInput,
		key: &str,
	) -> Result<SwapOutcome, (SwapStage, SwapError)> {
		let deposit = self
			.verifier
			.verify_deposit(input.tx_hash, &route.deposit)
			.await
			.map_err(failed_at(SwapStage::Verification))?;
		if let Some(claimed) = input.claimed_deposit {
			if claimed != deposit.amount {
				tracing::warn!(
					%claimed,
					verified = %deposit.amount,
					"Claimed deposit differs from on-chain amount, settling the verified amount"
				);
			}
		}

		let consensus = self
			.prices
			.consensus_for(&route.pricing)
			.await
			.map_err(failed_at(SwapStage::Pricing))?
			.consensus;

		let decision = route
			.settlement
			.settle(deposit.amount, consensus.rate, Some(&input.predicted))
			.map_err(failed_at(SwapStage::Settlement))?;
		self.ledger
			.record_decision(key, &decision)
			.await
			.map_err(|e| (SwapStage::Settlement, e))?;

		let payout = self
			.payouts
			.dispatch_payout(
				route.destination_chain_id,
				input.destination,
				decision.final_amount,
				&route.payout_asset,
			)
			.await
			.map_err(failed_at(SwapStage::Payout))?;

		Ok(SwapOutcome {
			deposit,
			decision,
			payout,
		})
	}

	/// Current consensus for a route, with the per-source quotes behind it.
	pub async fn route_prices(&self, route_name: &str) -> Result<PriceResponse, SwapError> {
		let route = self.route(route_name)?;
		let result = self.prices.consensus_for(&route.pricing).await?;
		Ok(PriceResponse {
			route: route.name.clone(),
			consensus: result.consensus,
			quotes: result.quotes,
		})
	}

	/// Balance of the route's payout asset in the payout wallet.
	pub async fn payout_balance(&self, route_name: &str) -> Result<BalanceResponse, SwapError> {
		let route = self.route(route_name)?;
		let chain_id = route.destination_chain_id;
		let address = self.payouts.wallet_address(chain_id)?;
		let balance = self.payouts.balance(chain_id, &route.payout_asset).await?;
		Ok(BalanceResponse {
			route: route.name.clone(),
			chain_id,
			asset: route.payout_asset.symbol.clone(),
			address: address.to_string(),
			balance,
		})
	}

	/// Runs background maintenance until ctrl-c.
	pub async fn run(&self) -> Result<(), SwapError> {
		let cleanup_handle = (!self.cleanup_interval.is_zero()).then(|| {
			let storage = self.storage.clone();
			let mut interval = tokio::time::interval(self.cleanup_interval);
			tokio::spawn(async move {
				loop {
					interval.tick().await;
					match storage.cleanup_expired().await {
						Ok(count) if count > 0 => {
							tracing::debug!("Storage cleanup: removed {} expired entries", count);
						}
						Err(e) => {
							tracing::warn!("Storage cleanup failed: {}", e);
						}
						_ => {}
					}
				}
			})
		});

		tracing::info!(routes = ?self.route_names(), "Swap engine running");
		tokio::signal::ctrl_c()
			.await
			.map_err(|e| SwapError::Internal(format!("Failed to listen for shutdown: {}", e)))?;

		if let Some(handle) = cleanup_handle {
			handle.abort();
		}
		Ok(())
	}
}

fn failed_at<E: Into<SwapError>>(stage: SwapStage) -> impl Fn(E) -> (SwapStage, SwapError) {
	move |e| (stage, e.into())
}

fn to_response(route: &Route, outcome: SwapOutcome, replayed: bool) -> SwapResponse {
	SwapResponse {
		success: true,
		route: route.name.clone(),
		final_amount: outcome.payout.amount,
		final_tx_hash: outcome.payout.tx_hash,
		decision: outcome.decision,
		replayed,
	}
}

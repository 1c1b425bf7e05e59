//! Settlement module for the shift settlement backend.
//!
//! Turns a verified deposit, a consensus rate and the user's own estimate of
//! the payout into a [`SettlementDecision`]. The payout is the lower of the
//! computed amount and the user's prediction, less a flat fee. All
//! arithmetic is exact decimal arithmetic; nothing here touches the network.

use rust_decimal::Decimal;
use shift_types::{
	parse_decimal, LimitedBy, SettlementDecision, SettlementDirection, DEFAULT_TOLERANCE_RATE,
};
use thiserror::Error;

/// Errors that reject a settlement before any payout.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettlementError {
	#[error("Invalid predicted amount: {0}")]
	InvalidPrediction(String),
	#[error("Invalid consensus rate: {0}")]
	InvalidRate(Decimal),
	#[error("Invalid fee rate: {0}")]
	InvalidFee(Decimal),
	#[error("Invalid deposited amount: {0}")]
	InvalidDeposit(Decimal),
	#[error("Deposit of {deposited} is below the minimum of {minimum}")]
	BelowMinimum { deposited: Decimal, minimum: Decimal },
	#[error("Arithmetic overflow computing {0}")]
	Overflow(&'static str),
}

/// Per-route settlement parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPolicy {
	pub direction: SettlementDirection,
	pub fee_rate: Decimal,
	/// Relative tolerance for the prediction report.
	pub tolerance_rate: Decimal,
	/// Absolute cap on the tolerance, in payout-asset units.
	pub tolerance_cap: Option<Decimal>,
	pub min_deposit: Option<Decimal>,
}

impl SettlementPolicy {
	pub fn new(direction: SettlementDirection, fee_rate: Decimal) -> Self {
		Self {
			direction,
			fee_rate,
			tolerance_rate: DEFAULT_TOLERANCE_RATE,
			tolerance_cap: None,
			min_deposit: None,
		}
	}

	pub fn with_tolerance(mut self, rate: Decimal, cap: Option<Decimal>) -> Self {
		self.tolerance_rate = rate;
		self.tolerance_cap = cap;
		self
	}

	pub fn with_min_deposit(mut self, min_deposit: Option<Decimal>) -> Self {
		self.min_deposit = min_deposit;
		self
	}

	/// Rejects non-positive deposits and deposits under the route minimum.
	///
	/// Callable before pricing so undersized swaps never reach the price
	/// sources.
	pub fn check_deposit(&self, deposited: Decimal) -> Result<(), SettlementError> {
		if deposited <= Decimal::ZERO {
			return Err(SettlementError::InvalidDeposit(deposited));
		}
		if let Some(minimum) = self.min_deposit.filter(|minimum| deposited < *minimum) {
			return Err(SettlementError::BelowMinimum { deposited, minimum });
		}
		Ok(())
	}

	/// How far a prediction may be from the computed amount and still be
	/// reported as consistent.
	pub fn tolerance(&self, computed: Decimal) -> Decimal {
		let relative = computed.checked_mul(self.tolerance_rate).unwrap_or(Decimal::MAX);
		match self.tolerance_cap {
			Some(cap) => relative.min(cap),
			None => relative,
		}
	}

	/// Computes the payout for a deposit.
	///
	/// `user_predicted` is the raw value from the request: a JSON string or
	/// number. It must be present, numeric and positive.
	pub fn settle(
		&self,
		deposited: Decimal,
		consensus_rate: Decimal,
		user_predicted: Option<&serde_json::Value>,
	) -> Result<SettlementDecision, SettlementError> {
		let predicted = parse_prediction(user_predicted)?;
		if consensus_rate <= Decimal::ZERO {
			return Err(SettlementError::InvalidRate(consensus_rate));
		}
		if self.fee_rate < Decimal::ZERO || self.fee_rate >= Decimal::ONE {
			return Err(SettlementError::InvalidFee(self.fee_rate));
		}
		self.check_deposit(deposited)?;

		let computed = match self.direction {
			SettlementDirection::Divide => deposited.checked_div(consensus_rate),
			SettlementDirection::Multiply => deposited.checked_mul(consensus_rate),
		}
		.ok_or(SettlementError::Overflow("computed amount"))?;

		let (chosen, limited_by) = if predicted < computed {
			(predicted, LimitedBy::UserPrediction)
		} else {
			(computed, LimitedBy::Computed)
		};

		let final_amount = chosen
			.checked_mul(Decimal::ONE - self.fee_rate)
			.ok_or(SettlementError::Overflow("final amount"))?;
		let fee_amount = chosen - final_amount;
		let within_tolerance = (predicted - computed).abs() <= self.tolerance(computed);

		tracing::debug!(
			direction = %self.direction,
			%deposited,
			rate = %consensus_rate,
			%computed,
			%predicted,
			final_amount = %final_amount,
			"Computed settlement"
		);

		Ok(SettlementDecision {
			direction: self.direction,
			deposited_amount: deposited,
			consensus_rate,
			computed_amount: computed,
			user_predicted_amount: predicted,
			chosen_amount: chosen,
			limited_by,
			fee_rate: self.fee_rate,
			fee_amount,
			final_amount,
			prediction_within_tolerance: within_tolerance,
		})
	}
}

/// Parses the user's predicted payout.
pub fn parse_prediction(raw: Option<&serde_json::Value>) -> Result<Decimal, SettlementError> {
	let raw = raw
		.filter(|value| !value.is_null())
		.ok_or_else(|| SettlementError::InvalidPrediction("missing".to_string()))?;
	let predicted = parse_decimal(raw)
		.ok_or_else(|| SettlementError::InvalidPrediction(format!("not a number: {}", raw)))?;
	if predicted <= Decimal::ZERO {
		return Err(SettlementError::InvalidPrediction(format!(
			"must be positive, got {}",
			predicted
		)));
	}
	Ok(predicted)
}

/// Computes a settlement without a minimum deposit or tolerance cap.
pub fn compute_settlement(
	deposited: Decimal,
	consensus_rate: Decimal,
	user_predicted: Option<&serde_json::Value>,
	fee_rate: Decimal,
	direction: SettlementDirection,
) -> Result<SettlementDecision, SettlementError> {
	SettlementPolicy::new(direction, fee_rate).settle(deposited, consensus_rate, user_predicted)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;
	use serde_json::json;

	#[test]
	fn test_divide_limited_by_computed() {
		let decision = compute_settlement(
			dec!(100),
			dec!(2),
			Some(&json!("60")),
			dec!(0.01),
			SettlementDirection::Divide,
		)
		.unwrap();

		assert_eq!(decision.computed_amount, dec!(50));
		assert_eq!(decision.chosen_amount, dec!(50));
		assert_eq!(decision.limited_by, LimitedBy::Computed);
		assert_eq!(decision.fee_amount, dec!(0.5));
		assert_eq!(decision.final_amount, dec!(49.5));
		assert!(!decision.prediction_within_tolerance);
	}

	#[test]
	fn test_multiply_limited_by_prediction() {
		let decision = compute_settlement(
			dec!(1000),
			dec!(0.5),
			Some(&json!(499.9)),
			dec!(0.01),
			SettlementDirection::Multiply,
		)
		.unwrap();

		assert_eq!(decision.computed_amount, dec!(500));
		assert_eq!(decision.chosen_amount, dec!(499.9));
		assert_eq!(decision.limited_by, LimitedBy::UserPrediction);
		assert_eq!(decision.final_amount, dec!(494.901));
		assert!(decision.prediction_within_tolerance);
	}

	#[test]
	fn test_final_never_exceeds_either_estimate() {
		let cases = [
			(dec!(100), dec!(2), "60", dec!(0.01)),
			(dec!(3.3), dec!(0.7), "1", dec!(0.005)),
			(dec!(0.5), dec!(0.51234567), "0.97", dec!(0.3)),
			(dec!(12345.678901), dec!(1.0001), "20000", dec!(0.0001)),
		];
		for (deposited, rate, predicted, fee) in cases {
			for direction in [SettlementDirection::Divide, SettlementDirection::Multiply] {
				let decision =
					compute_settlement(deposited, rate, Some(&json!(predicted)), fee, direction)
						.unwrap();
				let bound = decision.computed_amount.min(decision.user_predicted_amount);
				assert!(decision.final_amount <= bound);
				assert!(decision.final_amount < decision.chosen_amount);
				assert_eq!(
					decision.final_amount,
					decision.chosen_amount * (Decimal::ONE - fee)
				);
			}
		}
	}

	#[test]
	fn test_invalid_predictions() {
		let settle = |predicted: Option<&serde_json::Value>| {
			compute_settlement(
				dec!(100),
				dec!(2),
				predicted,
				dec!(0.01),
				SettlementDirection::Divide,
			)
		};

		let values = [json!(null), json!("abc"), json!("0"), json!(-3)];
		assert!(matches!(settle(None), Err(SettlementError::InvalidPrediction(_))));
		for bad in &values {
			assert!(matches!(
				settle(Some(bad)),
				Err(SettlementError::InvalidPrediction(_))
			));
		}
	}

	#[test]
	fn test_invalid_inputs() {
		let predicted = json!("10");
		let settle = |deposited, rate, fee| {
			compute_settlement(
				deposited,
				rate,
				Some(&predicted),
				fee,
				SettlementDirection::Divide,
			)
		};

		assert_eq!(
			settle(dec!(100), Decimal::ZERO, dec!(0.01)),
			Err(SettlementError::InvalidRate(Decimal::ZERO))
		);
		assert_eq!(
			settle(dec!(100), dec!(2), Decimal::ONE),
			Err(SettlementError::InvalidFee(Decimal::ONE))
		);
		assert_eq!(
			settle(dec!(100), dec!(2), dec!(-0.1)),
			Err(SettlementError::InvalidFee(dec!(-0.1)))
		);
		assert_eq!(
			settle(Decimal::ZERO, dec!(2), dec!(0.01)),
			Err(SettlementError::InvalidDeposit(Decimal::ZERO))
		);
	}

	#[test]
	fn test_minimum_deposit() {
		let policy = SettlementPolicy::new(SettlementDirection::Divide, dec!(0.01))
			.with_min_deposit(Some(dec!(0.5)));

		assert_eq!(
			policy.check_deposit(dec!(0.49)),
			Err(SettlementError::BelowMinimum {
				deposited: dec!(0.49),
				minimum: dec!(0.5)
			})
		);
		assert!(policy.check_deposit(dec!(0.5)).is_ok());
	}

	#[test]
	fn test_tolerance_is_capped() {
		let policy = SettlementPolicy::new(SettlementDirection::Divide, dec!(0.01))
			.with_tolerance(dec!(0.01), Some(dec!(0.1)));

		assert_eq!(policy.tolerance(dec!(5)), dec!(0.05));
		assert_eq!(policy.tolerance(dec!(500)), dec!(0.1));

		let decision = policy.settle(dec!(1000), dec!(2), Some(&json!("500.2"))).unwrap();
		assert_eq!(decision.limited_by, LimitedBy::Computed);
		assert!(!decision.prediction_within_tolerance);
	}
}

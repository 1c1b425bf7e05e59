//! Settlement direction and decision types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Flat fee taken from every payout (1%).
pub const DEFAULT_FEE_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Relative tolerance used when reporting how far a user's prediction was
/// from the computed amount (1%).
pub const DEFAULT_TOLERANCE_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// How the deposited amount is converted with the consensus rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementDirection {
	/// `deposited / rate`: stable asset in, volatile asset out.
	Divide,
	/// `deposited * rate`: volatile asset in, stable asset out.
	Multiply,
}

impl fmt::Display for SettlementDirection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Divide => f.write_str("divide"),
			Self::Multiply => f.write_str("multiply"),
		}
	}
}

/// Which estimate bounded the payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitedBy {
	Computed,
	UserPrediction,
}

/// The auditable outcome of the settlement arithmetic for one swap.
///
/// `chosen_amount = min(computed_amount, user_predicted_amount)` and
/// `final_amount = chosen_amount * (1 - fee_rate)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementDecision {
	pub direction: SettlementDirection,
	pub deposited_amount: Decimal,
	pub consensus_rate: Decimal,
	pub computed_amount: Decimal,
	pub user_predicted_amount: Decimal,
	pub chosen_amount: Decimal,
	pub limited_by: LimitedBy,
	pub fee_rate: Decimal,
	pub fee_amount: Decimal,
	pub final_amount: Decimal,
	/// Whether the user's prediction was within the reporting tolerance of
	/// the computed amount. Informational only.
	pub prediction_within_tolerance: bool,
}

//! Validation of the raw swap request body.

use crate::SwapError;
use rust_decimal::Decimal;
use shift_settlement::parse_prediction;
use shift_types::{parse_decimal, Address, SwapRequest, B256};
use std::str::FromStr;

/// A swap request whose fields have been parsed.
#[derive(Debug, Clone)]
pub(crate) struct SwapInput {
	pub tx_hash: B256,
	pub destination: Address,
	/// Amount the client says it deposited. Informational; the verified
	/// on-chain amount is what gets settled.
	pub claimed_deposit: Option<Decimal>,
	pub predicted: serde_json::Value,
}

impl SwapInput {
	pub fn parse(request: &SwapRequest) -> Result<Self, SwapError> {
		let tx_hash = request
			.tx_hash
			.as_deref()
			.map(str::trim)
			.filter(|hash| !hash.is_empty())
			.ok_or_else(|| SwapError::Input("txHash is required".to_string()))?;
		if !tx_hash.starts_with("0x") {
			return Err(SwapError::Input("txHash must be 0x-prefixed".to_string()));
		}
		let tx_hash = B256::from_str(tx_hash)
			.map_err(|_| SwapError::Input(format!("txHash '{}' is not a 32-byte hash", tx_hash)))?;

		let destination = request
			.destination_address
			.as_deref()
			.map(str::trim)
			.filter(|address| !address.is_empty())
			.ok_or_else(|| SwapError::Input("destinationAddress is required".to_string()))?;
		let destination = Address::from_str(destination).map_err(|_| {
			SwapError::Input(format!("destinationAddress '{}' is not an address", destination))
		})?;
		if destination.is_zero() {
			return Err(SwapError::Input(
				"destinationAddress cannot be the zero address".to_string(),
			));
		}

		let claimed_deposit = match request.deposited_amount.as_ref().filter(|v| !v.is_null()) {
			None => None,
			Some(value) => Some(parse_decimal(value).ok_or_else(|| {
				SwapError::Input(format!("depositedAmount {} is not a number", value))
			})?),
		};

		// Rejected here so that a bad prediction never reaches the chain.
		parse_prediction(request.user_predicted_amount.as_ref())?;

		Ok(Self {
			tx_hash,
			destination,
			claimed_deposit,
			predicted: request
				.user_predicted_amount
				.clone()
				.unwrap_or(serde_json::Value::Null),
		})
	}

	/// Ledger key: the lowercase 0x-prefixed hash.
	pub fn ledger_key(&self) -> String {
		self.tx_hash.to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;
	use serde_json::json;

	fn request(body: serde_json::Value) -> SwapRequest {
		serde_json::from_value(body).unwrap()
	}

	#[test]
	fn test_parses_legacy_field_names() {
		let input = SwapInput::parse(&request(json!({
			"txHash": "0xABABABABABABABABABABABABABABABABABABABABABABABABABABABABABABABAB",
			"usdcAmount": "100",
			"destination": "0x4242424242424242424242424242424242424242",
			"predictedAmount": 60
		})))
		.unwrap();

		assert_eq!(input.tx_hash, B256::repeat_byte(0xab));
		assert_eq!(
			input.ledger_key(),
			"0xabababababababababababababababababababababababababababababababab"
		);
		assert_eq!(input.claimed_deposit, Some(dec!(100)));
		assert_eq!(input.predicted, json!(60));
	}

	#[test]
	fn test_rejects_malformed_fields() {
		let valid = json!({
			"txHash": format!("0x{}", "ab".repeat(32)),
			"depositedAmount": "100",
			"destinationAddress": "0x4242424242424242424242424242424242424242",
			"userPredictedAmount": "60"
		});
		assert!(SwapInput::parse(&request(valid.clone())).is_ok());

		let with = |key: &str, value: serde_json::Value| {
			let mut body = valid.clone();
			body[key] = value;
			SwapInput::parse(&request(body))
		};

		assert!(matches!(with("txHash", json!("0x1234")), Err(SwapError::Input(_))));
		assert!(matches!(with("txHash", json!("ab".repeat(32))), Err(SwapError::Input(_))));
		assert!(matches!(
			with("destinationAddress", json!("0x0000000000000000000000000000000000000000")),
			Err(SwapError::Input(_))
		));
		assert!(matches!(
			with("depositedAmount", json!("lots")),
			Err(SwapError::Input(_))
		));
		assert!(matches!(
			with("userPredictedAmount", json!("-5")),
			Err(SwapError::Settlement(_))
		));
		assert!(matches!(
			SwapInput::parse(&SwapRequest::default()),
			Err(SwapError::Input(_))
		));
	}
}

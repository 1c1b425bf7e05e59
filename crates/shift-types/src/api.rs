//! API types for the swap settlement HTTP API.
//!
//! Request fields are camelCase and accept the legacy names older clients
//! still send (`usdcAmount`, `destination`, `predictedRbtcAmount`, ...).
//! Numeric request fields are kept as raw JSON so that a missing or
//! malformed value can be reported precisely instead of failing the whole
//! body with a deserialization error. A body carrying both the current name
//! and a legacy alias of the same field is rejected as a duplicate field.

use crate::{ConsensusRate, Decimal, SettlementDecision, SourceId, TransactionHash};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request body for `POST /api/swap/{route}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
	/// Hash of the deposit transaction on the source chain.
	#[serde(default)]
	pub tx_hash: Option<String>,
	/// Amount the client claims to have deposited.
	#[serde(
		default,
		alias = "amount",
		alias = "usdcAmount",
		alias = "sourceAmount",
		alias = "arbAmount",
		alias = "ethAmount",
		alias = "rbtcAmount"
	)]
	pub deposited_amount: Option<serde_json::Value>,
	/// Address that receives the payout on the destination chain.
	#[serde(default, alias = "destination")]
	pub destination_address: Option<String>,
	/// Output amount the client displayed to the user.
	#[serde(
		default,
		alias = "predictedAmount",
		alias = "predictedArbAmount",
		alias = "predictedRbtcAmount",
		alias = "predictedUsdcAmount"
	)]
	pub user_predicted_amount: Option<serde_json::Value>,
}

/// Successful response for `POST /api/swap/{route}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapResponse {
	pub success: bool,
	pub route: String,
	/// Paid amount in whole units of the payout asset.
	pub final_amount: Decimal,
	pub final_tx_hash: TransactionHash,
	pub decision: SettlementDecision,
	/// `true` when this response was served from the idempotency ledger
	/// rather than by executing a new payout.
	#[serde(default)]
	pub replayed: bool,
}

/// Per-source outcome reported by the prices endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceQuote {
	pub source: SourceId,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub price: Option<Decimal>,
	/// `true` when `price` came from the last-known-good cache or the
	/// configured fallback instead of a fresh fetch.
	pub substituted: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// Response for `GET /api/prices/{route}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResponse {
	pub route: String,
	pub consensus: ConsensusRate,
	pub quotes: Vec<SourceQuote>,
}

/// Response for `GET /api/balance/{route}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
	pub route: String,
	pub chain_id: u64,
	pub asset: String,
	pub address: String,
	pub balance: Decimal,
}

/// API error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Machine readable error code.
	pub error: String,
	/// Human-readable description.
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Structured API error with HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Invalid input or a deposit that could not be verified (400).
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Unknown route (404).
	NotFound { error_type: String, message: String },
	/// Repeated source transaction (409).
	Conflict {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Not enough healthy price sources (503).
	ServiceUnavailable { error_type: String, message: String },
	/// Payout or internal failure (500).
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::ServiceUnavailable { .. } => 503,
			APIError::InternalServerError { .. } => 500,
		}
	}

	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message, details) = match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			}
			| APIError::Conflict {
				error_type,
				message,
				details,
			} => (error_type, message, details.clone()),
			APIError::NotFound { error_type, message }
			| APIError::ServiceUnavailable { error_type, message }
			| APIError::InternalServerError { error_type, message } => (error_type, message, None),
		};
		ErrorResponse {
			error: error.clone(),
			message: message.clone(),
			details,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let response = self.to_error_response();
		write!(f, "{} ({}): {}", response.error, self.status_code(), response.message)
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status =
			StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_swap_request_accepts_legacy_field_names() {
		let request: SwapRequest = serde_json::from_value(json!({
			"txHash": "0xabc",
			"usdcAmount": "100",
			"destination": "0xf0f994B4A8dB86A46a1eD4F12263c795b26703Ca",
			"predictedRbtcAmount": 0.0015
		}))
		.unwrap();

		assert_eq!(request.tx_hash.as_deref(), Some("0xabc"));
		assert_eq!(request.deposited_amount, Some(json!("100")));
		assert!(request.destination_address.is_some());
		assert_eq!(request.user_predicted_amount, Some(json!(0.0015)));
	}

	#[test]
	fn test_swap_request_missing_fields_default_to_none() {
		let request: SwapRequest = serde_json::from_value(json!({ "txHash": "0xabc" })).unwrap();
		assert!(request.deposited_amount.is_none());
		assert!(request.user_predicted_amount.is_none());
	}

	#[test]
	fn test_api_error_status_and_body() {
		let err = APIError::Conflict {
			error_type: "DUPLICATE_TRANSACTION".to_string(),
			message: "already processed".to_string(),
			details: Some(json!({ "txHash": "0xabc" })),
		};
		assert_eq!(err.status_code(), 409);

		let body = err.to_error_response();
		assert_eq!(body.error, "DUPLICATE_TRANSACTION");
		assert_eq!(body.details, Some(json!({ "txHash": "0xabc" })));

		let unavailable = APIError::ServiceUnavailable {
			error_type: "INSUFFICIENT_PRICE_DATA".to_string(),
			message: "2 of 3".to_string(),
		};
		assert_eq!(unavailable.status_code(), 503);
		assert!(unavailable.to_error_response().details.is_none());
	}
}

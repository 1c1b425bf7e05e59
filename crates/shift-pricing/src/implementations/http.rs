//! Shared plumbing for market-data HTTP sources.

use crate::PriceSourceError;
use rust_decimal::Decimal;
use shift_types::{parse_decimal, Field, FieldType};
use std::time::Duration;

pub(crate) const DEFAULT_TIMEOUT_SECONDS: u64 = 5;

/// A JSON endpoint returning one price at a fixed JSON pointer.
pub(crate) struct JsonEndpoint {
	client: reqwest::Client,
	url: String,
	headers: Vec<(&'static str, String)>,
	pointer: String,
}

impl JsonEndpoint {
	pub(crate) fn new(
		config: &toml::Value,
		default_base_url: &str,
		path: &str,
		pointer: String,
	) -> Result<Self, PriceSourceError> {
		let base_url = config
			.get("base_url")
			.and_then(|v| v.as_str())
			.unwrap_or(default_base_url)
			.trim_end_matches('/');
		let timeout_seconds = config
			.get("timeout_seconds")
			.and_then(|v| v.as_integer())
			.and_then(|v| u64::try_from(v).ok())
			.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

		let client = reqwest::Client::builder()
			.timeout(Duration::from_secs(timeout_seconds))
			.build()
			.map_err(|e| {
				PriceSourceError::Configuration(format!("Failed to build HTTP client: {}", e))
			})?;

		Ok(Self {
			client,
			url: format!("{}{}", base_url, path),
			headers: Vec::new(),
			pointer,
		})
	}

	pub(crate) fn with_header(mut self, name: &'static str, value: String) -> Self {
		self.headers.push((name, value));
		self
	}

	pub(crate) fn url(&self) -> &str {
		&self.url
	}

	/// Performs the request and extracts the price.
	pub(crate) async fn fetch(&self) -> Result<Decimal, PriceSourceError> {
		let mut request = self.client.get(&self.url);
		for (name, value) in &self.headers {
			request = request.header(*name, value);
		}

		let response = request
			.send()
			.await
			.map_err(|e| PriceSourceError::Network(e.to_string()))?;
		if !response.status().is_success() {
			return Err(PriceSourceError::HttpStatus(response.status().as_u16()));
		}

		let bytes = response
			.bytes()
			.await
			.map_err(|e| PriceSourceError::Network(e.to_string()))?;
		let body: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
			PriceSourceError::InvalidPrice(format!("malformed response body: {}", e))
		})?;
		extract_price(&body, &self.pointer)
	}
}

/// Reads a non-negative decimal at `pointer`, accepting JSON numbers and
/// numeric strings.
pub(crate) fn extract_price(
	body: &serde_json::Value,
	pointer: &str,
) -> Result<Decimal, PriceSourceError> {
	let value = body
		.pointer(pointer)
		.filter(|v| !v.is_null())
		.ok_or_else(|| PriceSourceError::MissingField(pointer.to_string()))?;
	let price = parse_decimal(value)
		.ok_or_else(|| PriceSourceError::InvalidPrice(format!("non-numeric value {}", value)))?;
	if price.is_sign_negative() && !price.is_zero() {
		return Err(PriceSourceError::InvalidPrice(format!("negative price {}", price)));
	}
	Ok(price)
}

/// Optional fields accepted by every HTTP source.
pub(crate) fn common_fields() -> Vec<Field> {
	vec![
		Field::new("base_url", FieldType::String),
		Field::new(
			"timeout_seconds",
			FieldType::Integer {
				min: Some(1),
				max: Some(60),
			},
		),
		Field::new(
			"fallback_price",
			FieldType::Decimal {
				min: Some(Decimal::ZERO),
				max: None,
			},
		),
	]
}

/// Reads a required string field, for use after schema validation.
pub(crate) fn required_str<'a>(
	config: &'a toml::Value,
	field: &str,
) -> Result<&'a str, PriceSourceError> {
	config
		.get(field)
		.and_then(|v| v.as_str())
		.ok_or_else(|| PriceSourceError::Configuration(format!("Missing '{}'", field)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;
	use serde_json::json;
	use tokio::io::{AsyncReadExt, AsyncWriteExt};
	use tokio::net::TcpListener;

	/// Serves one canned HTTP response on a local port and returns its base URL.
	async fn serve_once(status: &'static str, body: &'static str) -> String {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			let (mut socket, _) = listener.accept().await.unwrap();
			let mut request = [0u8; 4096];
			let _ = socket.read(&mut request).await;
			let response = format!(
				"HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\
				 connection: close\r\n\r\n{}",
				status,
				body.len(),
				body
			);
			socket.write_all(response.as_bytes()).await.unwrap();
			let _ = socket.shutdown().await;
		});
		format!("http://{}", addr)
	}

	fn endpoint(base_url: &str) -> JsonEndpoint {
		let mut table = toml::Table::new();
		table.insert("base_url".into(), toml::Value::String(base_url.to_string()));
		table.insert("timeout_seconds".into(), toml::Value::Integer(2));
		JsonEndpoint::new(
			&toml::Value::Table(table),
			"https://api.example.com",
			"/api/v3/ticker/price",
			"/price".into(),
		)
		.unwrap()
	}

	#[test]
	fn test_extract_price_variants() {
		let body = json!({
			"data": [{ "last": "0.5123" }],
			"price": 12.5,
			"bad": "n/a",
			"neg": "-1"
		});

		assert_eq!(extract_price(&body, "/data/0/last").unwrap(), dec!(0.5123));
		assert_eq!(extract_price(&body, "/price").unwrap(), dec!(12.5));
		assert!(matches!(
			extract_price(&body, "/data/1/last"),
			Err(PriceSourceError::MissingField(_))
		));
		assert!(matches!(
			extract_price(&body, "/bad"),
			Err(PriceSourceError::InvalidPrice(_))
		));
		assert!(matches!(
			extract_price(&body, "/neg"),
			Err(PriceSourceError::InvalidPrice(_))
		));
	}

	#[test]
	fn test_endpoint_url_uses_base_override() {
		let config: toml::Value = toml::toml! { base_url = "http://localhost:9000/" }.into();
		let endpoint =
			JsonEndpoint::new(&config, "https://api.example.com", "/v1/x", "/p".into()).unwrap();
		assert_eq!(endpoint.url(), "http://localhost:9000/v1/x");
	}

	#[tokio::test]
	async fn test_fetch_reads_price_from_response() {
		let base_url = serve_once("200 OK", r#"{"symbol":"ARBUSDC","price":"0.5123"}"#).await;
		assert_eq!(endpoint(&base_url).fetch().await.unwrap(), dec!(0.5123));
	}

	#[tokio::test]
	async fn test_fetch_error_status_is_failure() {
		let base_url = serve_once("500 Internal Server Error", r#"{"msg":"down"}"#).await;
		assert!(matches!(
			endpoint(&base_url).fetch().await,
			Err(PriceSourceError::HttpStatus(500))
		));
	}

	#[tokio::test]
	async fn test_fetch_malformed_body_is_failure() {
		let base_url = serve_once("200 OK", "<html>maintenance</html>").await;
		assert!(matches!(
			endpoint(&base_url).fetch().await,
			Err(PriceSourceError::InvalidPrice(_))
		));
	}

	#[tokio::test]
	async fn test_fetch_unreachable_host_is_network_failure() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		drop(listener);

		assert!(matches!(
			endpoint(&format!("http://{}", addr)).fetch().await,
			Err(PriceSourceError::Network(_))
		));
	}
}

//! HTTP server for the shift settlement API.
//!
//! Every route-scoped endpoint takes the route name from the path; the swap
//! engine resolves it against the configured routes.

use axum::{
	extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
	http::{header, HeaderValue, Method},
	response::Json,
	routing::{get, post},
	Router,
};
use serde_json::json;
use shift_config::{ApiConfig, CorsConfig};
use shift_core::{ErrorKind, SwapEngine, SwapError};
use shift_types::{APIError, BalanceResponse, PriceResponse, SwapRequest, SwapResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
	cors::{AllowOrigin, Any, CorsLayer},
	timeout::TimeoutLayer,
	trace::TraceLayer,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<SwapEngine>,
}

/// Builds the API router.
pub fn router(engine: Arc<SwapEngine>, api_config: &ApiConfig) -> Router {
	Router::new()
		.route("/health", get(handle_health))
		.nest(
			"/api",
			Router::new()
				.route("/swap/{route}", post(handle_swap))
				.route("/prices/{route}", get(handle_prices))
				.route("/balance/{route}", get(handle_balance)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(cors_layer(api_config.cors.as_ref()))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(AppState { engine })
}

/// Starts the HTTP server and serves until the listener fails.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<SwapEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(engine, &api_config);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Shift API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

fn cors_layer(cors: Option<&CorsConfig>) -> CorsLayer {
	let Some(cors) = cors else {
		return CorsLayer::permissive();
	};

	let origin = if cors.allowed_origins.iter().any(|origin| origin == "*") {
		AllowOrigin::any()
	} else {
		let origins: Vec<HeaderValue> = cors
			.allowed_origins
			.iter()
			.filter_map(|origin| match origin.parse() {
				Ok(value) => Some(value),
				Err(_) => {
					tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
					None
				}
			})
			.collect();
		AllowOrigin::list(origins)
	};

	CorsLayer::new()
		.allow_origin(origin)
		.allow_methods([Method::GET, Method::POST])
		.allow_headers(Any)
		.expose_headers([header::CONTENT_TYPE])
}

async fn handle_health(State(state): State<AppState>) -> Json<serde_json::Value> {
	Json(json!({
		"status": "ok",
		"routes": state.engine.route_names(),
	}))
}

/// Handles POST /api/swap/{route} requests.
async fn handle_swap(
	Path(route): Path<String>,
	State(state): State<AppState>,
	body: Result<Json<SwapRequest>, JsonRejection>,
) -> Result<Json<SwapResponse>, APIError> {
	let Json(request) = body.map_err(|rejection| APIError::BadRequest {
		error_type: "INVALID_REQUEST".to_string(),
		message: rejection_message(&rejection),
		details: None,
	})?;

	match state.engine.process_swap(&route, &request).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => Err(api_error(&route, e)),
	}
}

fn rejection_message(rejection: &JsonRejection) -> String {
	let text = rejection.body_text();
	if text.contains("duplicate field") {
		format!(
			"Each field may be sent once, under its current name or one legacy alias: {}",
			text
		)
	} else {
		text
	}
}

/// Handles GET /api/prices/{route} requests.
async fn handle_prices(
	Path(route): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<PriceResponse>, APIError> {
	match state.engine.route_prices(&route).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => Err(api_error(&route, e)),
	}
}

/// Handles GET /api/balance/{route} requests.
async fn handle_balance(
	Path(route): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<BalanceResponse>, APIError> {
	match state.engine.payout_balance(&route).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => Err(api_error(&route, e)),
	}
}

/// Maps a swap error to its HTTP representation.
pub fn api_error(route: &str, error: SwapError) -> APIError {
	let kind = error.kind();
	if kind.is_client_error() {
		tracing::warn!(route = %route, code = error.code(), error = %error, "Request rejected");
	} else {
		tracing::error!(route = %route, code = error.code(), error = %error, "Request failed");
	}

	let error_type = error.code().to_string();
	let details = error.details();
	let message = error.to_string();
	match kind {
		ErrorKind::InvalidRequest => APIError::BadRequest {
			error_type,
			message,
			details,
		},
		ErrorKind::NotFound => APIError::NotFound {
			error_type,
			message,
		},
		ErrorKind::Conflict => APIError::Conflict {
			error_type,
			message,
			details,
		},
		ErrorKind::Unavailable => APIError::ServiceUnavailable {
			error_type,
			message,
		},
		ErrorKind::Internal => APIError::InternalServerError {
			error_type,
			message,
		},
	}
}

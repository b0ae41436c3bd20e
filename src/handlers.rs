use crate::carrier::{Carrier, Operation};
use crate::carrier_client::HttpCarrierClient;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::errors::AppError;
use crate::formatters;
use crate::models::Envelope;
use crate::validator::SchemaValidator;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Query keys parsed as integers when an operation is called with GET.
const INTEGER_PARAMS: [&str; 2] = ["page", "limit"];
/// Query keys holding comma-separated lists.
const LIST_PARAMS: [&str; 2] = ["trackingNumbers", "labelIds"];

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Runs carrier operations.
    pub dispatcher: Dispatcher<HttpCarrierClient, SchemaValidator>,
}

/// Routes of the gateway, without middleware.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/operations", get(list_operations))
        .route(
            "/api/v1/:carrier/:operation",
            get(query_operation).post(run_operation),
        )
        .with_state(state)
}

/// Health check endpoint.
///
/// Returns the service status, version and which carriers have credentials.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let carriers: Map<String, Value> = Carrier::ALL
        .iter()
        .map(|c| (c.to_string(), json!(state.config.is_configured(*c))))
        .collect();

    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-shipping-api",
            "version": env!("CARGO_PKG_VERSION"),
            "carriers": carriers,
        })),
    )
}

/// GET /api/v1/operations
///
/// Lists the operations each carrier supports.
pub async fn list_operations() -> Json<Value> {
    let matrix: Map<String, Value> = Carrier::ALL
        .iter()
        .map(|carrier| {
            let operations: Vec<&str> = Operation::ALL
                .iter()
                .filter(|op| formatters::supports(*carrier, **op))
                .map(|op| op.as_str())
                .collect();
            (carrier.to_string(), json!(operations))
        })
        .collect();
    Json(Value::Object(matrix))
}

/// POST /api/v1/:carrier/:operation
///
/// Runs `operation` against `carrier` with the JSON body as payload.
pub async fn run_operation(
    State(state): State<Arc<AppState>>,
    Path((carrier, operation)): Path<(String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope>), AppError> {
    let Json(payload) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    dispatch(&state, &carrier, &operation, payload).await
}

/// GET /api/v1/:carrier/:operation
///
/// Same as [`run_operation`], reading the payload from the query string.
pub async fn query_operation(
    State(state): State<Arc<AppState>>,
    Path((carrier, operation)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<(StatusCode, Json<Envelope>), AppError> {
    dispatch(&state, &carrier, &operation, query_payload(params)).await
}

async fn dispatch(
    state: &AppState,
    carrier: &str,
    operation: &str,
    payload: Value,
) -> Result<(StatusCode, Json<Envelope>), AppError> {
    let operation: Operation = operation.parse()?;
    tracing::info!("Dispatching {} for carrier {}", operation, carrier);

    let envelope = state.dispatcher.dispatch(operation, carrier, &payload).await;
    let status = envelope
        .failure
        .map(|kind| kind.status_code())
        .unwrap_or(StatusCode::OK);

    Ok((status, Json(envelope)))
}

/// Builds a payload from query parameters.
pub fn query_payload(params: HashMap<String, String>) -> Value {
    let payload: Map<String, Value> = params
        .into_iter()
        .map(|(key, raw)| {
            let value = if INTEGER_PARAMS.contains(&key.as_str()) {
                raw.trim()
                    .parse::<u64>()
                    .map(Value::from)
                    .unwrap_or(Value::String(raw))
            } else if LIST_PARAMS.contains(&key.as_str()) {
                Value::Array(
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|s| Value::String(s.to_string()))
                        .collect(),
                )
            } else {
                Value::String(raw)
            };
            (key, value)
        })
        .collect();
    Value::Object(payload)
}

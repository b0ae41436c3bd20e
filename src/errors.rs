use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

use crate::carrier::{Carrier, Operation};
use crate::models::Envelope;

/// A single field-level validation failure.
///
/// `info` carries the machine-oriented description of the failed rule
/// (`must have required property 'shipTo'`), `message` the human-facing text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub info: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>, info: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            info: info.into(),
        }
    }

    /// Error for a property the payload must carry.
    pub fn missing(field: &str) -> Self {
        let property = field.rsplit('.').next().unwrap_or(field);
        let info = format!("must have required property '{}'", property);
        Self::new(field, info.clone(), info)
    }
}

/// Coarse classification of a failed call, used to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Validation,
    CarrierTransport,
    UnknownOperation,
    UnknownCarrier,
    UnsupportedOperation,
    UnknownCountry,
    InvalidAddress,
    CarrierNotConfigured,
    Internal,
}

impl FailureKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            FailureKind::Validation | FailureKind::UnknownCountry | FailureKind::InvalidAddress => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            FailureKind::UnknownOperation | FailureKind::UnknownCarrier => StatusCode::NOT_FOUND,
            FailureKind::UnsupportedOperation => StatusCode::BAD_REQUEST,
            FailureKind::CarrierTransport => StatusCode::BAD_GATEWAY,
            FailureKind::CarrierNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            FailureKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Every failure the normalization pipeline can produce.
#[derive(Debug, Error)]
pub enum ShippingError {
    /// Input failed schema validation before any network call.
    #[error("request failed validation with {} error(s)", .0.len())]
    Validation(Vec<FieldError>),

    /// The carrier call failed. `body` is set when the carrier answered with
    /// an error document; it is `None` when no usable response arrived.
    #[error("{carrier} request failed: {message}")]
    CarrierTransport {
        carrier: Carrier,
        status: Option<u16>,
        body: Option<Value>,
        message: String,
    },

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("unknown carrier '{0}'")]
    UnknownCarrier(String),

    #[error("operation '{operation}' is not supported by {carrier}")]
    UnsupportedOperation { carrier: Carrier, operation: Operation },

    #[error("unknown country code '{0}'")]
    UnknownCountry(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("carrier {0} is not configured")]
    CarrierNotConfigured(Carrier),

    /// A bundled schema failed to compile.
    #[error("schema error: {0}")]
    Schema(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ShippingError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ShippingError::Validation(_) => FailureKind::Validation,
            ShippingError::CarrierTransport { .. } => FailureKind::CarrierTransport,
            ShippingError::UnknownOperation(_) => FailureKind::UnknownOperation,
            ShippingError::UnknownCarrier(_) => FailureKind::UnknownCarrier,
            ShippingError::UnsupportedOperation { .. } => FailureKind::UnsupportedOperation,
            ShippingError::UnknownCountry(_) => FailureKind::UnknownCountry,
            ShippingError::InvalidAddress(_) => FailureKind::InvalidAddress,
            ShippingError::CarrierNotConfigured(_) => FailureKind::CarrierNotConfigured,
            ShippingError::Schema(_) | ShippingError::Internal(_) => FailureKind::Internal,
        }
    }

    /// Shorthand for a validation failure on one missing property.
    pub fn missing_field(field: &str) -> Self {
        ShippingError::Validation(vec![FieldError::missing(field)])
    }

    /// Converts the error into the envelope's `errors` sequence.
    ///
    /// Validation errors become one object per field. A carrier error body is
    /// passed through as-is (arrays are spread). Everything else becomes its
    /// display message.
    pub fn into_envelope_errors(self) -> Vec<Value> {
        match self {
            ShippingError::Validation(errors) => errors
                .into_iter()
                .map(|e| serde_json::to_value(e).unwrap_or(Value::Null))
                .collect(),
            ShippingError::CarrierTransport {
                body: Some(Value::Array(items)),
                ..
            } if !items.is_empty() => items,
            ShippingError::CarrierTransport {
                body: Some(Value::Object(map)),
                ..
            } if !map.is_empty() => vec![Value::Object(map)],
            other => vec![Value::String(other.to_string())],
        }
    }
}

/// Gateway-level error type.
#[derive(Debug)]
pub enum AppError {
    /// Resource not found error.
    NotFound(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// A failure raised by the normalization pipeline.
    Shipping(ShippingError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Shipping(e) => write!(f, "{}", e),
        }
    }
}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// The body always has the envelope shape so callers can parse success
    /// and failure the same way.
    fn into_response(self) -> Response {
        let (status, envelope) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, Envelope::message(msg)),
            AppError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, Envelope::message(msg))
            }
            AppError::Shipping(e) => {
                let status = e.kind().status_code();
                if status.is_server_error() {
                    tracing::error!("Shipping error: {}", e);
                } else {
                    tracing::warn!("Shipping error: {}", e);
                }
                (status, Envelope::from_error(e))
            }
        };

        (status, Json(json!(envelope))).into_response()
    }
}

impl From<ShippingError> for AppError {
    fn from(err: ShippingError) -> Self {
        match err {
            ShippingError::UnknownOperation(_) | ShippingError::UnknownCarrier(_) => {
                AppError::NotFound(err.to_string())
            }
            other => AppError::Shipping(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_info() {
        let err = FieldError::missing("shipment.shipTo");
        assert_eq!(err.field, "shipment.shipTo");
        assert_eq!(err.info, "must have required property 'shipTo'");
    }

    #[test]
    fn test_transport_error_with_body_passes_body_through() {
        let err = ShippingError::CarrierTransport {
            carrier: Carrier::Postmen,
            status: Some(400),
            body: Some(json!({"code": 4104, "message": "Invalid JSON"})),
            message: "400 Bad Request".to_string(),
        };
        let errors = err.into_envelope_errors();
        assert_eq!(errors, vec![json!({"code": 4104, "message": "Invalid JSON"})]);
    }

    #[test]
    fn test_transport_error_array_body_is_spread() {
        let err = ShippingError::CarrierTransport {
            carrier: Carrier::Dhl,
            status: Some(200),
            body: Some(json!([{"@code": "998"}, {"@code": "999"}])),
            message: "notification".to_string(),
        };
        assert_eq!(err.into_envelope_errors().len(), 2);
    }

    #[test]
    fn test_transport_error_with_empty_body_uses_message() {
        let err = ShippingError::CarrierTransport {
            carrier: Carrier::Shippo,
            status: Some(500),
            body: Some(json!({})),
            message: "shippo returned 500 Internal Server Error".to_string(),
        };
        assert_eq!(
            err.into_envelope_errors(),
            vec![json!("shippo request failed: shippo returned 500 Internal Server Error")]
        );
    }

    #[test]
    fn test_transport_error_without_body_uses_message() {
        let err = ShippingError::CarrierTransport {
            carrier: Carrier::Shippo,
            status: None,
            body: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(
            err.into_envelope_errors(),
            vec![json!("shippo request failed: connection refused")]
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            FailureKind::Validation.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            FailureKind::CarrierTransport.status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            FailureKind::UnknownOperation.status_code(),
            StatusCode::NOT_FOUND
        );
    }
}

//! Request and response formatters.
//!
//! Each carrier module turns canonical payloads into that carrier's wire
//! payload and turns the carrier's response back into canonical data. This
//! module picks the carrier and holds the helpers they share.
//!
//! Formatters are pure: the same input and [`RequestContext`] always produce
//! the same output. A (carrier, operation) pair the carrier does not support
//! formats to an empty mapping (`{}`), and so does an unrecognized carrier
//! name passed to [`request_for`] / [`response_for`].

pub mod dhl;
pub mod postmen;
pub mod shippo;

use chrono::{DateTime, Local, TimeZone};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::carrier::{Carrier, Operation};
use crate::errors::{FieldError, ShippingError};
use crate::models::{Document, Money};

/// Page requested when a listing does not say.
pub const DEFAULT_PAGE: u32 = 1;
/// Page size requested when a listing does not say.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

pub(crate) static NULL: Value = Value::Null;

/// Inputs a formatter needs besides the payload itself.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Wall-clock time of the request, in the machine's local zone.
    pub now: DateTime<Local>,
}

impl RequestContext {
    pub fn now() -> Self {
        Self { now: Local::now() }
    }

    /// Context pinned to a given instant.
    pub fn at<Tz: TimeZone>(instant: DateTime<Tz>) -> Self {
        Self {
            now: instant.with_timezone(&Local),
        }
    }
}

/// Whether `carrier` implements `operation` at all.
pub fn supports(carrier: Carrier, operation: Operation) -> bool {
    match carrier {
        Carrier::Dhl => dhl::supports(operation),
        Carrier::Shippo => shippo::supports(operation),
        Carrier::Postmen => postmen::supports(operation),
    }
}

/// Maps a canonical payload to `carrier`'s wire payload for `operation`.
///
/// # Errors
///
/// Fails with `InvalidAddress` / `UnknownCountry` for bad country codes and
/// with `Validation` when the payload lacks what the carrier needs.
pub fn format_request(
    carrier: Carrier,
    operation: Operation,
    payload: &Value,
    ctx: &RequestContext,
) -> Result<Value, ShippingError> {
    let wire = match carrier {
        Carrier::Dhl => dhl::format_request(operation, payload, ctx)?,
        Carrier::Shippo => shippo::format_request(operation, payload, ctx)?,
        Carrier::Postmen => postmen::format_request(operation, payload, ctx)?,
    };
    Ok(compact(wire))
}

/// Maps `carrier`'s wire response for `operation` to canonical data.
pub fn format_response(carrier: Carrier, operation: Operation, wire: &Value) -> Value {
    match carrier {
        Carrier::Dhl => dhl::format_response(operation, wire),
        Carrier::Shippo => shippo::format_response(operation, wire),
        Carrier::Postmen => postmen::format_response(operation, wire),
    }
}

/// Same as [`format_request`], keyed by carrier name.
pub fn request_for(
    carrier_name: &str,
    operation: Operation,
    payload: &Value,
    ctx: &RequestContext,
) -> Result<Value, ShippingError> {
    match carrier_name.parse::<Carrier>() {
        Ok(carrier) => format_request(carrier, operation, payload, ctx),
        Err(_) => {
            tracing::debug!("No request formatter for carrier '{}'", carrier_name);
            Ok(empty())
        }
    }
}

/// Same as [`format_response`], keyed by carrier name.
pub fn response_for(carrier_name: &str, operation: Operation, wire: &Value) -> Value {
    match carrier_name.parse::<Carrier>() {
        Ok(carrier) => format_response(carrier, operation, wire),
        Err(_) => {
            tracing::debug!("No response formatter for carrier '{}'", carrier_name);
            empty()
        }
    }
}

pub fn empty() -> Value {
    Value::Object(Map::new())
}

pub fn is_empty_mapping(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.is_empty())
}

/// Decodes a validated payload into its canonical request type.
pub(crate) fn decode<T: DeserializeOwned>(payload: &Value) -> Result<T, ShippingError> {
    T::deserialize(payload).map_err(|e| {
        let info = e.to_string();
        ShippingError::Validation(vec![FieldError::new("", info.clone(), info)])
    })
}

/// Drops `null` members from every object so carriers never see explicit nulls.
pub(crate) fn compact(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, compact(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(compact).collect()),
        other => other,
    }
}

/// Renders a number the way string-typed carrier fields expect (`10`, `2.5`).
pub(crate) fn decimal(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    format!("{}", rounded)
}

// ============ Tolerant response access ============

/// The value at `pointer`, or `null`.
pub(crate) fn at<'a>(value: &'a Value, pointer: &str) -> &'a Value {
    value.pointer(pointer).unwrap_or(&NULL)
}

/// String at `pointer`. Numbers are rendered; empty strings count as absent.
pub(crate) fn text(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Number at `pointer`, accepting numeric strings (`"5.50"`).
pub(crate) fn number(value: &Value, pointer: &str) -> Option<f64> {
    match value.pointer(pointer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn integer(value: &Value, pointer: &str) -> Option<i64> {
    match value.pointer(pointer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn boolean(value: &Value, pointer: &str) -> Option<bool> {
    match value.pointer(pointer)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Items at `pointer` as a sequence.
///
/// Arrays are returned in order, a lone object becomes a one-element list,
/// and anything absent becomes an empty list.
pub(crate) fn list<'a>(value: &'a Value, pointer: &str) -> Vec<&'a Value> {
    match value.pointer(pointer) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    }
}

/// Strings at `pointer` (see [`list`]), skipping non-string entries.
pub(crate) fn strings(value: &Value, pointer: &str) -> Vec<String> {
    match value.pointer(pointer) {
        Some(Value::Array(items)) => items.iter().filter_map(|v| text(v, "")).collect(),
        Some(single) => text(single, "").into_iter().collect(),
        None => Vec::new(),
    }
}

pub(crate) fn money(value: &Value, amount: &str, currency: &str) -> Option<Money> {
    Some(Money {
        amount: number(value, amount)?,
        currency: text(value, currency)?,
    })
}

/// Document object at `pointer`, if there is one.
pub(crate) fn document(value: &Value, pointer: &str) -> Option<Document> {
    let doc = value.pointer(pointer).filter(|d| d.is_object())?;
    Some(Document {
        url: text(doc, "/url"),
        file_type: text(doc, "/file_type"),
        paper_size: text(doc, "/paper_size"),
    })
}

/// Joins the present parts with `", "`.
pub(crate) fn join_present(parts: &[Option<String>]) -> Option<String> {
    let joined = parts
        .iter()
        .flatten()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    (!joined.is_empty()).then_some(joined)
}

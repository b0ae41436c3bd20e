//! JSON-schema validation of canonical payloads.
//!
//! Every operation validates its payload against one bundled schema before
//! any formatting or network work happens. Failures are reported per field
//! in the shape callers see in the envelope's `errors` list.

use std::collections::HashMap;
use std::fmt;

use jsonschema::error::ValidationErrorKind;
use jsonschema::ValidationError;
use serde_json::{json, Value};

use crate::carrier::{Carrier, Operation};
use crate::errors::{FieldError, ShippingError};

pub const POSTAL_CODE_MESSAGE: &str =
    "Must provide a valid postal code and it should not be less than 4 characters";
pub const PHONE_MESSAGE: &str =
    "Must provide a valid phone number and it should not be less than 10 characters";
pub const EMAIL_MESSAGE: &str = "Must provide a valid email address";
const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

/// Identifies one of the bundled schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaId {
    Shipment,
    /// Shipment for carriers that bill a shipper account on every request.
    AccountShipment,
    Address,
    RateLookup,
    LabelFromRate,
    LabelFromShipment,
    CarrierManifest,
    LabelManifest,
    ManifestLookup,
    Tracking,
    TrackingBatch,
    CancelLabel,
    Listing,
}

impl SchemaId {
    pub const ALL: [SchemaId; 13] = [
        SchemaId::Shipment,
        SchemaId::AccountShipment,
        SchemaId::Address,
        SchemaId::RateLookup,
        SchemaId::LabelFromRate,
        SchemaId::LabelFromShipment,
        SchemaId::CarrierManifest,
        SchemaId::LabelManifest,
        SchemaId::ManifestLookup,
        SchemaId::Tracking,
        SchemaId::TrackingBatch,
        SchemaId::CancelLabel,
        SchemaId::Listing,
    ];

    /// Schema the payload of `operation` must satisfy for `carrier`.
    pub fn for_operation(carrier: Carrier, operation: Operation) -> SchemaId {
        match (operation, carrier) {
            (Operation::CreateShipment, Carrier::Shippo) => SchemaId::Shipment,
            (Operation::CreateShipment, _) => SchemaId::AccountShipment,
            (Operation::Rates, Carrier::Shippo) => SchemaId::RateLookup,
            (Operation::Rates, _) => SchemaId::AccountShipment,
            (Operation::CreateLabel, Carrier::Shippo) => SchemaId::LabelFromRate,
            (Operation::CreateLabel, _) => SchemaId::LabelFromShipment,
            (Operation::CreateManifest, Carrier::Shippo) => SchemaId::CarrierManifest,
            (Operation::CreateManifest, _) => SchemaId::LabelManifest,
            (Operation::Manifest, _) => SchemaId::ManifestLookup,
            (Operation::Trackings | Operation::TrackingStatus, Carrier::Dhl) => {
                SchemaId::TrackingBatch
            }
            (Operation::Trackings, _) => SchemaId::Listing,
            (Operation::TrackingStatus | Operation::CreateTracking, _) => SchemaId::Tracking,
            (Operation::CancelOrDeleteLabel, _) => SchemaId::CancelLabel,
            (Operation::ValidateAddress | Operation::CreateAddress, _) => SchemaId::Address,
            (Operation::Shipments | Operation::Labels | Operation::Manifests, _) => {
                SchemaId::Listing
            }
        }
    }

    pub fn schema(self) -> Value {
        match self {
            SchemaId::Shipment => shipment_schema(false),
            SchemaId::AccountShipment => shipment_schema(true),
            SchemaId::Address => address_schema(),
            SchemaId::RateLookup => lookup_schema("shipmentId"),
            SchemaId::LabelFromRate => json!({
                "type": "object",
                "required": ["rateId"],
                "properties": {
                    "rateId": non_empty_string(),
                    "labelFileType": optional_string(),
                }
            }),
            SchemaId::LabelFromShipment => json!({
                "type": "object",
                "required": ["shipment"],
                "properties": {
                    "shipment": shipment_schema(true),
                    "labelFileType": optional_string(),
                }
            }),
            SchemaId::CarrierManifest => json!({
                "type": "object",
                "required": ["shipperAccount", "shipmentDate", "shipFrom"],
                "properties": {
                    "shipperAccount": shipper_account_schema(),
                    "shipmentDate": non_empty_string(),
                    "shipFrom": address_schema(),
                    "labelIds": string_list(),
                }
            }),
            SchemaId::LabelManifest => json!({
                "type": "object",
                "required": ["shipperAccount"],
                "properties": {
                    "shipperAccount": shipper_account_schema(),
                    "labelIds": string_list(),
                }
            }),
            SchemaId::ManifestLookup => lookup_schema("manifestId"),
            SchemaId::Tracking => json!({
                "type": "object",
                "required": ["trackingNumber"],
                "properties": {
                    "trackingNumber": non_empty_string(),
                    "slug": optional_string(),
                    "title": optional_string(),
                    "orderId": optional_string(),
                }
            }),
            SchemaId::TrackingBatch => json!({
                "type": "object",
                "properties": {
                    "trackingNumber": non_empty_string(),
                    "trackingNumbers": {
                        "type": "array",
                        "minItems": 1,
                        "items": non_empty_string(),
                    },
                }
            }),
            SchemaId::CancelLabel => lookup_schema("labelId"),
            SchemaId::Listing => json!({
                "type": "object",
                "properties": {
                    "page": {"type": "integer", "minimum": 1},
                    "limit": {"type": "integer", "minimum": 1, "maximum": 200},
                }
            }),
        }
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Checks payloads against a schema.
pub trait Validator: Send + Sync {
    /// Returns every violation found, or an empty list if `payload` is valid.
    fn validate(&self, schema: SchemaId, payload: &Value) -> Result<Vec<FieldError>, ShippingError>;
}

/// [`Validator`] backed by compiled JSON schemas.
pub struct SchemaValidator {
    compiled: HashMap<SchemaId, (Value, jsonschema::Validator)>,
}

impl SchemaValidator {
    /// Compiles every bundled schema.
    ///
    /// # Errors
    ///
    /// Returns `ShippingError::Schema` if a schema does not compile.
    pub fn new() -> Result<Self, ShippingError> {
        let mut compiled = HashMap::new();
        for id in SchemaId::ALL {
            let document = id.schema();
            let validator = jsonschema::options()
                .with_draft(jsonschema::Draft::Draft202012)
                .should_validate_formats(true)
                .build(&document)
                .map_err(|e| ShippingError::Schema(format!("{} schema: {}", id, e)))?;
            compiled.insert(id, (document, validator));
        }
        tracing::debug!("Compiled {} payload schemas", compiled.len());
        Ok(Self { compiled })
    }
}

impl Validator for SchemaValidator {
    fn validate(&self, schema: SchemaId, payload: &Value) -> Result<Vec<FieldError>, ShippingError> {
        let (document, validator) = self
            .compiled
            .get(&schema)
            .ok_or_else(|| ShippingError::Schema(format!("{} schema is not loaded", schema)))?;

        Ok(validator
            .iter_errors(payload)
            .map(|error| field_error(document, &error))
            .collect())
    }
}

/// `/shipTo/postalCode` -> `shipTo.postalCode`.
fn dotted(pointer: &str) -> String {
    pointer
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// The `errorMessage` declared next to the keyword that failed, if any.
fn custom_message(document: &Value, schema_path: &str) -> Option<String> {
    let parent = schema_path.rsplit_once('/').map(|(parent, _)| parent)?;
    document
        .pointer(parent)?
        .get("errorMessage")?
        .as_str()
        .map(str::to_string)
}

fn field_error(document: &Value, error: &ValidationError<'_>) -> FieldError {
    let mut field = dotted(&error.instance_path.to_string());

    let info = match &error.kind {
        ValidationErrorKind::Required { property } => {
            let name = property
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| property.to_string());
            field = if field.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", field, name)
            };
            format!("must have required property '{}'", name)
        }
        ValidationErrorKind::MinLength { limit } => {
            format!("must NOT have fewer than {} characters", limit)
        }
        ValidationErrorKind::MaxLength { limit } => {
            format!("must NOT have more than {} characters", limit)
        }
        ValidationErrorKind::MinItems { limit } => {
            format!("must NOT have fewer than {} items", limit)
        }
        ValidationErrorKind::Pattern { pattern } => format!("must match pattern \"{}\"", pattern),
        ValidationErrorKind::Format { format } => format!("must match format \"{}\"", format),
        ValidationErrorKind::Enum { .. } => "must be equal to one of the allowed values".to_string(),
        _ => error.to_string(),
    };

    let message = custom_message(document, &error.schema_path.to_string())
        .unwrap_or_else(|| info.clone());

    FieldError {
        field,
        message,
        info,
    }
}

// ============ Schemas ============

fn non_empty_string() -> Value {
    json!({"type": "string", "minLength": 1})
}

fn optional_string() -> Value {
    json!({"type": ["string", "null"]})
}

fn string_list() -> Value {
    json!({"type": "array", "items": {"type": "string"}})
}

fn lookup_schema(key: &str) -> Value {
    json!({
        "type": "object",
        "required": [key],
        "properties": { key: non_empty_string() }
    })
}

fn shipper_account_schema() -> Value {
    json!({
        "type": ["object", "null"],
        "required": ["id"],
        "properties": { "id": non_empty_string() }
    })
}

fn money_schema() -> Value {
    json!({
        "type": ["object", "null"],
        "required": ["amount", "currency"],
        "properties": {
            "amount": {"type": "number", "minimum": 0},
            "currency": {"type": "string", "minLength": 3, "maxLength": 3},
        }
    })
}

fn weight_schema() -> Value {
    json!({
        "type": ["object", "null"],
        "required": ["value", "unit"],
        "properties": {
            "value": {"type": "number", "minimum": 0},
            "unit": {"enum": ["lb", "lbs", "kg", "kgs", "oz", "g"]},
        }
    })
}

fn address_schema() -> Value {
    json!({
        "type": "object",
        "required": ["contactName", "street1", "city", "postalCode", "countryCode"],
        "properties": {
            "contactName": non_empty_string(),
            "companyName": optional_string(),
            "street1": non_empty_string(),
            "street2": optional_string(),
            "street3": optional_string(),
            "city": non_empty_string(),
            "state": optional_string(),
            "postalCode": {
                "type": "string",
                "minLength": 4,
                "errorMessage": POSTAL_CODE_MESSAGE,
            },
            "countryCode": {"type": "string"},
            "phone": {
                "type": ["string", "null"],
                "minLength": 10,
                "errorMessage": PHONE_MESSAGE,
            },
            "email": {
                "type": ["string", "null"],
                "pattern": EMAIL_PATTERN,
                "errorMessage": EMAIL_MESSAGE,
            },
            "type": {"enum": ["business", "residential", null]},
        }
    })
}

fn item_schema() -> Value {
    json!({
        "type": "object",
        "required": ["description", "quantity"],
        "properties": {
            "description": non_empty_string(),
            "quantity": {"type": "integer", "minimum": 1},
            "originCountry": optional_string(),
            "sku": optional_string(),
            "weight": weight_schema(),
            "price": money_schema(),
        }
    })
}

fn parcel_schema() -> Value {
    let dimension = json!({"type": ["number", "null"], "minimum": 0});
    json!({
        "type": "object",
        "required": ["items"],
        "properties": {
            "description": optional_string(),
            "length": dimension,
            "width": dimension,
            "height": dimension,
            "distanceUnit": {"enum": ["in", "cm", null]},
            "massUnit": {"enum": ["lb", "lbs", "kg", "kgs", "oz", "g", null]},
            "boxType": optional_string(),
            "weight": weight_schema(),
            "dimension": {
                "type": ["object", "null"],
                "properties": {
                    "length": dimension,
                    "width": dimension,
                    "height": dimension,
                    "depth": dimension,
                    "unit": {"enum": ["in", "cm", null]},
                }
            },
            "items": {"type": "array", "minItems": 1, "items": item_schema()},
        }
    })
}

fn shipment_schema(account_required: bool) -> Value {
    let mut required = json!(["shipTo", "shipFrom", "parcels", "shipmentDate", "serviceType"]);
    let mut account = shipper_account_schema();
    if account_required {
        if let Some(names) = required.as_array_mut() {
            names.push(json!("shipperAccount"));
        }
        account["type"] = json!("object");
    }

    json!({
        "type": "object",
        "required": required,
        "properties": {
            "shipFrom": address_schema(),
            "shipTo": address_schema(),
            "parcels": {"type": "array", "minItems": 1, "items": parcel_schema()},
            "shipmentDate": {"type": "string", "format": "date-time", "minLength": 1},
            "serviceType": non_empty_string(),
            "shipperAccount": account,
            "shipmentMetadata": {"type": ["object", "null"]},
        }
    })
}

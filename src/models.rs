//! Canonical data model shared by every carrier formatter.
//!
//! Request-side types are what callers send; response-side types are what the
//! formatters normalize carrier answers into. Optional fields serialize as
//! `null` so consumers always see the same keys regardless of carrier.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::{FailureKind, ShippingError};
use crate::units::{DistanceUnit, MassUnit};

// ============ Shared value types ============

/// A monetary amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

/// A weight with its unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weight {
    pub value: f64,
    pub unit: MassUnit,
}

/// Box dimensions. `depth` and `length` are synonyms across carriers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub depth: Option<f64>,
    pub unit: Option<DistanceUnit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    Business,
    Residential,
}

// ============ Request Models ============

/// A postal address with contact details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub contact_name: String,
    pub company_name: Option<String>,
    pub street1: String,
    pub street2: Option<String>,
    pub street3: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2.
    pub country_code: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "type")]
    pub address_type: Option<AddressType>,
}

/// One line item inside a parcel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub description: String,
    pub origin_country: Option<String>,
    pub quantity: u32,
    pub sku: Option<String>,
    pub weight: Option<Weight>,
    pub price: Option<Money>,
}

/// A physical package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parcel {
    pub description: Option<String>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub distance_unit: Option<DistanceUnit>,
    pub box_type: Option<String>,
    pub weight: Option<Weight>,
    pub dimension: Option<Dimension>,
    pub mass_unit: Option<MassUnit>,
    pub items: Vec<Item>,
}

impl Parcel {
    /// Parcel weight, falling back to the sum of item weights.
    ///
    /// Item weights are summed in the unit of the first weighted item; items
    /// in other units are converted.
    pub fn total_weight(&self) -> Option<Weight> {
        if let Some(weight) = &self.weight {
            return Some(weight.clone());
        }
        let unit = self
            .items
            .iter()
            .find_map(|item| item.weight.as_ref().map(|w| w.unit))
            .or(self.mass_unit)?;
        let value = self
            .items
            .iter()
            .filter_map(|item| {
                item.weight
                    .as_ref()
                    .map(|w| w.unit.convert(w.value, unit) * f64::from(item.quantity))
            })
            .sum();
        Some(Weight { value, unit })
    }

    /// Mass unit used for the parcel, preferring the explicit `massUnit`.
    pub fn effective_mass_unit(&self) -> Option<MassUnit> {
        self.mass_unit
            .or_else(|| self.weight.as_ref().map(|w| w.unit))
            .or_else(|| {
                self.items
                    .iter()
                    .find_map(|item| item.weight.as_ref().map(|w| w.unit))
            })
    }

    /// Length/width/height, reading the flat fields first and `dimension` second.
    pub fn dimensions(&self) -> (Option<f64>, Option<f64>, Option<f64>) {
        let dimension = self.dimension.clone().unwrap_or_default();
        (
            self.length.or(dimension.length).or(dimension.depth),
            self.width.or(dimension.width),
            self.height.or(dimension.height),
        )
    }

    pub fn effective_distance_unit(&self) -> Option<DistanceUnit> {
        self.distance_unit
            .or_else(|| self.dimension.as_ref().and_then(|d| d.unit))
    }
}

/// Reference to the account a carrier bills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipperAccount {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomsInfo {
    pub content: Option<String>,
    pub purpose: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternationalDetail {
    pub content: Option<String>,
    pub description: Option<String>,
    pub customs_value: Option<f64>,
}

/// Optional carrier hints attached to a shipment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentMetadata {
    pub label_type: Option<String>,
    pub label_template: Option<String>,
    pub paper_size: Option<String>,
    pub pickup_location: Option<String>,
    pub payment_info: Option<String>,
    pub currency: Option<String>,
    pub customs: Option<CustomsInfo>,
    pub international_detail: Option<InternationalDetail>,
}

/// A shipment from one address to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub ship_from: Address,
    pub ship_to: Address,
    pub parcels: Vec<Parcel>,
    pub shipment_date: DateTime<FixedOffset>,
    pub service_type: String,
    pub shipper_account: Option<ShipperAccount>,
    pub shipment_metadata: Option<ShipmentMetadata>,
}

impl Shipment {
    pub fn metadata(&self) -> ShipmentMetadata {
        self.shipment_metadata.clone().unwrap_or_default()
    }

    pub fn is_international(&self) -> bool {
        !self
            .ship_from
            .country_code
            .eq_ignore_ascii_case(&self.ship_to.country_code)
    }

    /// Sum of `price.amount * quantity` across all items.
    pub fn declared_value(&self) -> f64 {
        self.items()
            .filter_map(|item| {
                item.price
                    .as_ref()
                    .map(|p| p.amount * f64::from(item.quantity))
            })
            .sum()
    }

    /// Currency of the first priced item.
    pub fn declared_currency(&self) -> Option<String> {
        self.items()
            .find_map(|item| item.price.as_ref().map(|p| p.currency.clone()))
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.parcels.iter().flat_map(|p| p.items.iter())
    }
}

/// Label purchase. Rate-based carriers use `rateId`; the others need the
/// full `shipment`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelRequest {
    pub rate_id: Option<String>,
    pub label_file_type: Option<String>,
    pub shipment: Option<Shipment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRequest {
    pub shipper_account: Option<ShipperAccount>,
    #[serde(default)]
    pub label_ids: Vec<String>,
    pub shipment_date: Option<DateTime<FixedOffset>>,
    pub ship_from: Option<Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRequest {
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub tracking_numbers: Vec<String>,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub order_id: Option<String>,
}

impl TrackingRequest {
    /// All tracking numbers, single one first.
    pub fn all_numbers(&self) -> Vec<String> {
        let mut numbers: Vec<String> = self.tracking_number.iter().cloned().collect();
        numbers.extend(
            self.tracking_numbers
                .iter()
                .filter(|n| Some(*n) != self.tracking_number.as_ref())
                .cloned(),
        );
        numbers
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelLabelRequest {
    pub label_id: String,
}

/// Pagination for list operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentRef {
    pub shipment_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRef {
    pub manifest_id: String,
}

// ============ Response Models ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rate {
    pub id: Option<String>,
    pub status: Option<String>,
    pub service_type: Option<String>,
    pub service_name: Option<String>,
    pub provider: Option<String>,
    pub delivery_date: Option<String>,
    pub transit_time: Option<i64>,
    pub total_charge: Option<Money>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: Option<String>,
    pub status: Option<String>,
    pub label_url: Option<String>,
    /// Inline label image (base64) for carriers that do not host files.
    pub label_data: Option<String>,
    pub file_type: Option<String>,
    pub tracking_numbers: Vec<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub url: Option<String>,
    pub file_type: Option<String>,
    pub paper_size: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFiles {
    pub label: Option<Document>,
    pub invoice: Option<Document>,
    pub customs_declaration: Option<Document>,
    pub manifest: Option<Document>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: Option<String>,
    pub status: Option<String>,
    pub label_ids: Vec<String>,
    pub files: ManifestFiles,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    pub status: Option<String>,
    pub message: Option<String>,
    pub location: Option<String>,
    pub occurred_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tracking {
    pub id: Option<String>,
    pub tracking_number: Option<String>,
    pub slug: Option<String>,
    pub service_type: Option<String>,
    pub status: Option<String>,
    pub shipment_weight: Option<f64>,
    pub shipment_weight_unit: Option<String>,
    pub shipment_package_count: Option<u32>,
    pub history: Vec<TrackingEvent>,
}

/// Normalized result of shipment creation and listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentRecord {
    pub id: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<String>,
    pub tracking_numbers: Vec<String>,
    pub rates: Vec<Rate>,
    pub labels: Vec<Label>,
}

/// Normalized result of address creation and validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRecord {
    pub id: Option<String>,
    pub is_valid: Option<bool>,
    pub is_complete: Option<bool>,
    pub messages: Vec<String>,
    pub contact_name: Option<String>,
    pub company_name: Option<String>,
    pub street1: Option<String>,
    pub street2: Option<String>,
    pub street3: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country_code: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "type")]
    pub address_type: Option<AddressType>,
}

// ============ Result Envelope ============

/// Uniform wrapper returned by every dispatch, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<Value>,
    /// Why the call failed, if it did. Not part of the wire shape.
    #[serde(skip)]
    pub failure: Option<FailureKind>,
}

impl Envelope {
    pub fn success(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
            failure: None,
        }
    }

    pub fn from_error(err: ShippingError) -> Self {
        let failure = Some(err.kind());
        Self {
            data: json!({}),
            warnings: Vec::new(),
            errors: err.into_envelope_errors(),
            failure,
        }
    }

    /// Failure envelope carrying a single message.
    pub fn message(msg: impl Into<String>) -> Self {
        Self {
            data: json!({}),
            warnings: Vec::new(),
            errors: vec![Value::String(msg.into())],
            failure: Some(FailureKind::Internal),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: u32, value: f64, unit: MassUnit) -> Item {
        Item {
            description: "Widget".to_string(),
            origin_country: None,
            quantity,
            sku: None,
            weight: Some(Weight { value, unit }),
            price: Some(Money {
                amount: 10.0,
                currency: "USD".to_string(),
            }),
        }
    }

    fn parcel(items: Vec<Item>) -> Parcel {
        Parcel {
            description: None,
            length: None,
            width: None,
            height: None,
            distance_unit: None,
            box_type: None,
            weight: None,
            dimension: None,
            mass_unit: None,
            items,
        }
    }

    #[test]
    fn test_total_weight_sums_items() {
        let p = parcel(vec![item(2, 1.5, MassUnit::Kg), item(1, 500.0, MassUnit::G)]);
        let weight = p.total_weight().unwrap();
        assert_eq!(weight.unit, MassUnit::Kg);
        assert!((weight.value - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_explicit_weight_wins() {
        let mut p = parcel(vec![item(1, 1.0, MassUnit::Kg)]);
        p.weight = Some(Weight {
            value: 9.0,
            unit: MassUnit::Lb,
        });
        assert_eq!(p.total_weight().unwrap().value, 9.0);
        assert_eq!(p.effective_mass_unit(), Some(MassUnit::Lb));
    }

    #[test]
    fn test_dimensions_fall_back_to_dimension_block() {
        let mut p = parcel(vec![]);
        p.dimension = Some(Dimension {
            length: None,
            width: Some(10.0),
            height: Some(5.0),
            depth: Some(20.0),
            unit: Some(DistanceUnit::Cm),
        });
        assert_eq!(p.dimensions(), (Some(20.0), Some(10.0), Some(5.0)));
        assert_eq!(p.effective_distance_unit(), Some(DistanceUnit::Cm));
    }

    #[test]
    fn test_tracking_numbers_are_deduplicated() {
        let request = TrackingRequest {
            tracking_number: Some("A".to_string()),
            tracking_numbers: vec!["A".to_string(), "B".to_string()],
            ..Default::default()
        };
        assert_eq!(request.all_numbers(), vec!["A", "B"]);
    }

    #[test]
    fn test_envelope_failure_shape() {
        let envelope = Envelope::from_error(ShippingError::InvalidAddress("bad".to_string()));
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["data"], json!({}));
        assert_eq!(json["warnings"], json!([]));
        assert_eq!(json["errors"], json!(["invalid address: bad"]));
        assert!(json.get("failure").is_none());
        assert!(!envelope.is_success());
    }
}

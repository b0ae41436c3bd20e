//! DHL Express mapping.
//!
//! DHL's web services are SOAP operations; the gateway talks to their JSON
//! binding, which carries the same documents (`ShipmentRequest`,
//! `RateRequest`, `trackShipmentRequest`) as JSON objects. Attribute-style
//! members keep their `@` prefix (`@number`, `@type`).

use chrono::Local;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{at, decode, empty, integer, list, money, number, text, RequestContext};
use crate::carrier::Operation;
use crate::errors::ShippingError;
use crate::models::{
    Address, Label, Parcel, Rate, Shipment, ShipmentRecord, Tracking, TrackingEvent,
    TrackingRequest,
};
use crate::units::{checked_country_code, format_date_time_with_gmt_offset, MassUnit};

pub const DROP_OFF_TYPE: &str = "REGULAR_PICKUP";
pub const CONTENT: &str = "NON_DOCUMENTS";
pub const PAYMENT_INFO: &str = "DDP";
pub const LABEL_TYPE: &str = "PDF";
pub const LABEL_TEMPLATE: &str = "ECOM26_84_001";
pub const CURRENCY: &str = "USD";
pub const LEVEL_OF_DETAILS: &str = "ALL_CHECKPOINTS";
pub const PIECES_ENABLED: &str = "S";
const NEXT_BUSINESS_DAY: &str = "N";
const SLUG: &str = "dhl";

/// Notification code DHL uses for "no error".
const SUCCESS_CODE: &str = "0";

const TRACKING_ITEMS: &str =
    "/trackingResponse/TrackingResponse/AWBInfo/ArrayOfAWBInfoItem";

pub fn supports(operation: Operation) -> bool {
    matches!(
        operation,
        Operation::CreateShipment | Operation::Rates | Operation::Trackings | Operation::TrackingStatus
    )
}

pub fn format_request(
    operation: Operation,
    payload: &Value,
    ctx: &RequestContext,
) -> Result<Value, ShippingError> {
    match operation {
        Operation::CreateShipment => shipment_request(&decode(payload)?),
        Operation::Rates => rate_request(&decode(payload)?),
        Operation::Trackings | Operation::TrackingStatus => {
            tracking_request(&decode(payload)?, ctx)
        }
        Operation::Labels
        | Operation::Manifests
        | Operation::Manifest
        | Operation::Shipments
        | Operation::ValidateAddress
        | Operation::CreateLabel
        | Operation::CreateManifest
        | Operation::CreateTracking
        | Operation::CancelOrDeleteLabel
        | Operation::CreateAddress => Ok(empty()),
    }
}

pub fn format_response(operation: Operation, wire: &Value) -> Value {
    match operation {
        Operation::CreateShipment => json!({ "shipment": shipment_record(wire) }),
        Operation::Rates => json!({ "rates": rates(wire) }),
        Operation::Trackings => json!({ "trackings": trackings(wire) }),
        Operation::TrackingStatus => {
            let tracking = trackings(wire).into_iter().next().unwrap_or_default();
            json!({ "tracking": tracking })
        }
        Operation::Labels
        | Operation::Manifests
        | Operation::Manifest
        | Operation::Shipments
        | Operation::ValidateAddress
        | Operation::CreateLabel
        | Operation::CreateManifest
        | Operation::CreateTracking
        | Operation::CancelOrDeleteLabel
        | Operation::CreateAddress => empty(),
    }
}

/// Error notifications embedded in an otherwise successful DHL response.
///
/// DHL reports business failures with HTTP 200 and a `Notification` list whose
/// `@code` is not `0`. Returns those notifications, or `None` if there are none.
pub fn notification_errors(wire: &Value) -> Option<Value> {
    let mut notifications = list(wire, "/ShipmentResponse/Notification");
    for provider in list(wire, "/RateResponse/Provider") {
        notifications.extend(list(provider, "/Notification"));
    }

    let errors: Vec<Value> = notifications
        .into_iter()
        .filter(|n| text(n, "/@code").is_some_and(|code| code != SUCCESS_CODE))
        .cloned()
        .collect();

    (!errors.is_empty()).then(|| Value::Array(errors))
}

// ============ Requests ============

fn account(shipment: &Shipment) -> Result<&str, ShippingError> {
    shipment
        .shipper_account
        .as_ref()
        .map(|a| a.id.as_str())
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ShippingError::missing_field("shipperAccount"))
}

fn mass_unit(shipment: &Shipment) -> MassUnit {
    shipment
        .parcels
        .first()
        .and_then(Parcel::effective_mass_unit)
        .unwrap_or(MassUnit::Kg)
}

fn party(address: &Address) -> Result<Value, ShippingError> {
    let country = checked_country_code(&address.country_code)?;
    Ok(json!({
        "Contact": {
            "PersonName": address.contact_name,
            "CompanyName": address.company_name.as_deref().unwrap_or(&address.contact_name),
            "PhoneNumber": address.phone,
            "EmailAddress": address.email,
        },
        "Address": {
            "StreetLines": address.street1,
            "StreetLines2": address.street2,
            "StreetLines3": address.street3,
            "City": address.city,
            "StateOrProvinceCode": address.state,
            "PostalCode": address.postal_code,
            "CountryCode": country,
        }
    }))
}

fn rate_address(address: &Address) -> Result<Value, ShippingError> {
    let country = checked_country_code(&address.country_code)?;
    Ok(json!({
        "StreetLines": address.street1,
        "City": address.city,
        "PostalCode": address.postal_code,
        "CountryCode": country,
    }))
}

fn packages(shipment: &Shipment, unit: MassUnit) -> Value {
    let base = unit.dhl_base_unit();
    let requested: Vec<Value> = shipment
        .parcels
        .iter()
        .enumerate()
        .map(|(idx, parcel)| {
            let (length, width, height) = parcel.dimensions();
            let weight = parcel
                .total_weight()
                .map(|w| round3(w.unit.convert(w.value, base)));
            json!({
                "@number": idx + 1,
                "Weight": { "Value": weight },
                "Dimensions": { "Length": length, "Width": width, "Height": height },
                "CustomerReferences": parcel
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("Piece {}", idx + 1)),
            })
        })
        .collect();
    json!({ "RequestedPackages": requested })
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Shipment content type, preferring the international detail over customs.
fn content(shipment: &Shipment) -> String {
    let metadata = shipment.metadata();
    metadata
        .international_detail
        .and_then(|detail| detail.content)
        .or_else(|| metadata.customs.and_then(|customs| customs.content))
        .unwrap_or_else(|| CONTENT.to_string())
}

fn shipment_request(shipment: &Shipment) -> Result<Value, ShippingError> {
    let shipper = party(&shipment.ship_from)?;
    let recipient = party(&shipment.ship_to)?;
    let account = account(shipment)?;

    let metadata = shipment.metadata();
    let unit = mass_unit(shipment);
    let detail = metadata.international_detail.clone().unwrap_or_default();

    let description = detail.description.clone().or_else(|| {
        shipment
            .items()
            .next()
            .map(|item| item.description.clone())
    });

    Ok(json!({
        "ShipmentRequest": {
            "RequestedShipment": {
                "ShipmentInfo": {
                    "DropOffType": DROP_OFF_TYPE,
                    "ServiceType": shipment.service_type,
                    "Account": account,
                    "Currency": metadata
                        .currency
                        .clone()
                        .or_else(|| shipment.declared_currency())
                        .unwrap_or_else(|| CURRENCY.to_string()),
                    "UnitOfMeasurement": unit.dhl_unit_of_measurement(),
                    "LabelType": metadata.label_type.as_deref().unwrap_or(LABEL_TYPE),
                    "LabelTemplate": metadata.label_template.as_deref().unwrap_or(LABEL_TEMPLATE),
                },
                "ShipTimestamp": format_date_time_with_gmt_offset(
                    &shipment.shipment_date.with_timezone(&Local)
                ),
                "PickupLocation": metadata.pickup_location,
                "PaymentInfo": metadata.payment_info.as_deref().unwrap_or(PAYMENT_INFO),
                "InternationalDetail": {
                    "Commodities": {
                        "NumberOfPieces": shipment.parcels.len(),
                        "Description": description,
                        "CustomsValue": detail
                            .customs_value
                            .unwrap_or_else(|| shipment.declared_value()),
                    },
                    "Content": content(shipment),
                },
                "Ship": {
                    "Shipper": shipper,
                    "Recipient": recipient,
                },
                "Packages": packages(shipment, unit),
            }
        }
    }))
}

fn rate_request(shipment: &Shipment) -> Result<Value, ShippingError> {
    let shipper = rate_address(&shipment.ship_from)?;
    let recipient = rate_address(&shipment.ship_to)?;
    let account = account(shipment)?;

    let metadata = shipment.metadata();
    let unit = mass_unit(shipment);

    Ok(json!({
        "RateRequest": {
            "ClientDetail": {},
            "RequestedShipment": {
                "DropOffType": DROP_OFF_TYPE,
                "ShipTimestamp": format_date_time_with_gmt_offset(
                    &shipment.shipment_date.with_timezone(&Local)
                ),
                "UnitOfMeasurement": unit.dhl_unit_of_measurement(),
                "Content": content(shipment),
                "PaymentInfo": metadata.payment_info.as_deref().unwrap_or(PAYMENT_INFO),
                "NextBusinessDay": NEXT_BUSINESS_DAY,
                "Account": account,
                "Ship": {
                    "Shipper": shipper,
                    "Recipient": recipient,
                },
                "Packages": packages(shipment, unit),
            }
        }
    }))
}

/// Stable 32-character reference derived from the tracked numbers.
fn message_reference(numbers: &[String]) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, numbers.join(",").as_bytes())
        .simple()
        .to_string()
}

fn tracking_request(request: &TrackingRequest, ctx: &RequestContext) -> Result<Value, ShippingError> {
    let numbers = request.all_numbers();
    if numbers.is_empty() {
        return Err(ShippingError::missing_field("trackingNumbers"));
    }

    Ok(json!({
        "trackShipmentRequest": {
            "trackingRequest": {
                "TrackingRequest": {
                    "Request": {
                        "ServiceHeader": {
                            "MessageTime": format_date_time_with_gmt_offset(&ctx.now),
                            "MessageReference": message_reference(&numbers),
                        }
                    },
                    "AWBNumber": { "ArrayOfAWBNumberItem": numbers },
                    "LevelOfDetails": LEVEL_OF_DETAILS,
                    "PiecesEnabled": PIECES_ENABLED,
                }
            }
        }
    }))
}

// ============ Responses ============

fn shipment_record(wire: &Value) -> ShipmentRecord {
    let response = at(wire, "/ShipmentResponse");
    let id = text(response, "/ShipmentIdentificationNumber");
    let tracking_numbers: Vec<String> = list(response, "/PackagesResult/PackageResult")
        .into_iter()
        .filter_map(|package| text(package, "/TrackingNumber"))
        .collect();

    let labels = list(response, "/LabelImage")
        .into_iter()
        .map(|image| Label {
            id: id.clone(),
            label_data: text(image, "/GraphicImage"),
            file_type: text(image, "/LabelImageFormat"),
            tracking_numbers: tracking_numbers.clone(),
            ..Default::default()
        })
        .collect();

    ShipmentRecord {
        id,
        tracking_numbers,
        labels,
        ..Default::default()
    }
}

fn rates(wire: &Value) -> Vec<Rate> {
    list(wire, "/RateResponse/Provider")
        .into_iter()
        .flat_map(|provider| {
            let code = text(provider, "/@code");
            list(provider, "/Service").into_iter().map(move |service| Rate {
                service_type: text(service, "/@type"),
                service_name: text(service, "/ServiceName"),
                provider: code.clone(),
                delivery_date: text(service, "/DeliveryTime"),
                total_charge: money(service, "/TotalNet/Amount", "/TotalNet/Currency"),
                ..Default::default()
            })
        })
        .collect()
}

fn weight_unit_name(code: String) -> String {
    match code.as_str() {
        "K" => "kg".to_string(),
        "L" => "lb".to_string(),
        _ => code,
    }
}

fn tracking_event(event: &Value) -> TrackingEvent {
    let occurred_at = match (text(event, "/Date"), text(event, "/Time")) {
        (Some(date), Some(time)) => Some(format!("{}T{}", date, time)),
        (date, _) => date,
    };
    TrackingEvent {
        status: text(event, "/ServiceEvent/EventCode"),
        message: text(event, "/ServiceEvent/Description"),
        location: text(event, "/ServiceArea/Description"),
        occurred_at,
    }
}

fn trackings(wire: &Value) -> Vec<Tracking> {
    let root = wire.pointer("/trackShipmentRequestResponse").unwrap_or(wire);
    list(root, TRACKING_ITEMS)
        .into_iter()
        .map(|item| Tracking {
            tracking_number: text(item, "/AWBNumber"),
            slug: Some(SLUG.to_string()),
            service_type: text(item, "/ShipmentInfo/ProductCode"),
            status: text(item, "/Status/ActionStatus"),
            shipment_weight: number(item, "/ShipmentInfo/Weight"),
            shipment_weight_unit: text(item, "/ShipmentInfo/WeightUnit").map(weight_unit_name),
            shipment_package_count: integer(item, "/ShipmentInfo/Pieces")
                .and_then(|n| u32::try_from(n).ok()),
            history: list(item, "/ShipmentInfo/ShipmentEvent/ArrayOfShipmentEventItem")
                .into_iter()
                .map(tracking_event)
                .collect(),
            ..Default::default()
        })
        .collect()
}

//! Shippo REST mapping.

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde_json::{json, Value};

use super::{
    at, boolean, decimal, decode, empty, integer, join_present, list, money, strings, text,
    RequestContext, DEFAULT_PAGE, DEFAULT_PAGE_SIZE,
};
use crate::carrier::Operation;
use crate::errors::ShippingError;
use crate::models::{
    Address, AddressRecord, AddressType, CancelLabelRequest, Document, Label, LabelRequest,
    Listing, Manifest, ManifestFiles, ManifestRef, ManifestRequest, Parcel, Rate, Shipment,
    ShipmentRecord, ShipmentRef, Tracking, TrackingEvent, TrackingRequest,
};
use crate::units::{checked_country_code, DistanceUnit, MassUnit};

pub const LABEL_FILE_TYPE: &str = "PDF_4x6";
pub const DISTANCE_UNIT: DistanceUnit = DistanceUnit::In;
pub const MASS_UNIT: MassUnit = MassUnit::Lb;
const CONTENTS_TYPE: &str = "MERCHANDISE";
const NON_DELIVERY_OPTION: &str = "RETURN";
const INCOTERM: &str = "DDP";

pub fn supports(operation: Operation) -> bool {
    !matches!(operation, Operation::Trackings)
}

pub fn format_request(
    operation: Operation,
    payload: &Value,
    _ctx: &RequestContext,
) -> Result<Value, ShippingError> {
    match operation {
        Operation::Shipments | Operation::Labels | Operation::Manifests => {
            Ok(listing_request(&decode(payload)?))
        }
        Operation::CreateShipment => shipment_request(&decode(payload)?),
        Operation::Rates => {
            let shipment: ShipmentRef = decode(payload)?;
            Ok(json!({ "shipment_id": shipment.shipment_id }))
        }
        Operation::CreateLabel => transaction_request(&decode(payload)?),
        Operation::CancelOrDeleteLabel => {
            let cancel: CancelLabelRequest = decode(payload)?;
            Ok(json!({ "transaction": cancel.label_id, "async": false }))
        }
        Operation::Manifest => {
            let manifest: ManifestRef = decode(payload)?;
            Ok(json!({ "manifest_id": manifest.manifest_id }))
        }
        Operation::CreateManifest => manifest_request(&decode(payload)?),
        Operation::TrackingStatus => track_lookup(&decode(payload)?),
        Operation::CreateTracking => track_request(&decode(payload)?),
        Operation::ValidateAddress => address_request(&decode(payload)?, true),
        Operation::CreateAddress => address_request(&decode(payload)?, false),
        Operation::Trackings => Ok(empty()),
    }
}

pub fn format_response(operation: Operation, wire: &Value) -> Value {
    match operation {
        Operation::Shipments => json!({
            "shipments": results(wire).into_iter().map(shipment_record).collect::<Vec<_>>()
        }),
        Operation::CreateShipment => json!({ "shipment": shipment_record(wire) }),
        Operation::Rates => json!({
            "rates": results(wire).into_iter().map(rate).collect::<Vec<_>>()
        }),
        Operation::Labels => json!({
            "labels": results(wire).into_iter().map(label).collect::<Vec<_>>()
        }),
        Operation::CreateLabel => json!({ "label": label(wire) }),
        Operation::CancelOrDeleteLabel => json!({ "label": refund(wire) }),
        Operation::Manifests => json!({
            "manifests": results(wire).into_iter().map(manifest).collect::<Vec<_>>()
        }),
        Operation::Manifest | Operation::CreateManifest => json!({ "manifest": manifest(wire) }),
        Operation::TrackingStatus | Operation::CreateTracking => {
            json!({ "tracking": tracking(wire) })
        }
        Operation::ValidateAddress | Operation::CreateAddress => {
            json!({ "address": address_record(wire) })
        }
        Operation::Trackings => empty(),
    }
}

// ============ Requests ============

fn rfc3339(date: &DateTime<FixedOffset>) -> String {
    date.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Shippo address object for `address`.
pub fn address(address: &Address) -> Result<Value, ShippingError> {
    let country = checked_country_code(&address.country_code)?;
    Ok(json!({
        "name": address.contact_name,
        "company": address.company_name,
        "street1": address.street1,
        "street2": address.street2,
        "street3": address.street3,
        "city": address.city,
        "state": address.state,
        "zip": address.postal_code,
        "country": country,
        "phone": address.phone,
        "email": address.email,
        "is_residential": address.address_type.map(|t| t == AddressType::Residential),
    }))
}

fn parcel(parcel: &Parcel) -> Value {
    let (length, width, height) = parcel.dimensions();
    let mass_unit = parcel.effective_mass_unit().unwrap_or(MASS_UNIT);
    let weight = parcel
        .total_weight()
        .map(|w| decimal(w.unit.convert(w.value, mass_unit)));

    json!({
        "length": length.map(decimal),
        "width": width.map(decimal),
        "height": height.map(decimal),
        "distance_unit": parcel.effective_distance_unit().unwrap_or(DISTANCE_UNIT).as_str(),
        "weight": weight,
        "mass_unit": mass_unit.as_str(),
        "metadata": parcel.description,
    })
}

fn customs_declaration(shipment: &Shipment) -> Value {
    let metadata = shipment.metadata();
    let customs = metadata.customs.unwrap_or_default();
    let items: Vec<Value> = shipment
        .parcels
        .iter()
        .flat_map(|p| {
            let fallback_unit = p.effective_mass_unit().unwrap_or(MASS_UNIT);
            p.items.iter().map(move |item| {
                let unit = item.weight.as_ref().map(|w| w.unit).unwrap_or(fallback_unit);
                json!({
                    "description": item.description,
                    "quantity": item.quantity,
                    "net_weight": item.weight.as_ref().map(|w| decimal(w.value)),
                    "mass_unit": unit.as_str(),
                    "value_amount": item.price.as_ref().map(|p| decimal(p.amount)),
                    "value_currency": item.price.as_ref().map(|p| p.currency.clone()),
                    "origin_country": item.origin_country,
                    "sku_code": item.sku,
                })
            })
        })
        .collect();

    json!({
        "contents_type": customs
            .purpose
            .map(|p| p.to_ascii_uppercase())
            .unwrap_or_else(|| CONTENTS_TYPE.to_string()),
        "contents_explanation": customs.content,
        "non_delivery_option": NON_DELIVERY_OPTION,
        "certify": true,
        "certify_signer": shipment.ship_from.contact_name,
        "incoterm": metadata.payment_info.unwrap_or_else(|| INCOTERM.to_string()),
        "items": items,
    })
}

fn shipment_request(shipment: &Shipment) -> Result<Value, ShippingError> {
    let customs = shipment
        .is_international()
        .then(|| customs_declaration(shipment));

    Ok(json!({
        "address_from": address(&shipment.ship_from)?,
        "address_to": address(&shipment.ship_to)?,
        "parcels": shipment.parcels.iter().map(parcel).collect::<Vec<_>>(),
        "shipment_date": rfc3339(&shipment.shipment_date),
        "carrier_accounts": shipment.shipper_account.as_ref().map(|a| vec![a.id.clone()]),
        "customs_declaration": customs,
        "async": false,
    }))
}

fn listing_request(listing: &Listing) -> Value {
    json!({
        "page": listing.page.unwrap_or(DEFAULT_PAGE),
        "results": listing.limit.unwrap_or(DEFAULT_PAGE_SIZE),
    })
}

fn transaction_request(request: &LabelRequest) -> Result<Value, ShippingError> {
    let rate = request
        .rate_id
        .as_deref()
        .ok_or_else(|| ShippingError::missing_field("rateId"))?;
    Ok(json!({
        "rate": rate,
        "label_file_type": request.label_file_type.as_deref().unwrap_or(LABEL_FILE_TYPE),
        "async": false,
    }))
}

fn manifest_request(request: &ManifestRequest) -> Result<Value, ShippingError> {
    let address_from = request.ship_from.as_ref().map(address).transpose()?;
    let account = request
        .shipper_account
        .as_ref()
        .ok_or_else(|| ShippingError::missing_field("shipperAccount"))?;
    let date = request
        .shipment_date
        .as_ref()
        .ok_or_else(|| ShippingError::missing_field("shipmentDate"))?;
    let address_from = address_from.ok_or_else(|| ShippingError::missing_field("shipFrom"))?;

    Ok(json!({
        "carrier_account": account.id,
        "shipment_date": rfc3339(date),
        "address_from": address_from,
        "transactions": (!request.label_ids.is_empty()).then(|| request.label_ids.clone()),
        "async": false,
    }))
}

fn track_lookup(request: &TrackingRequest) -> Result<Value, ShippingError> {
    let carrier = request
        .slug
        .as_deref()
        .ok_or_else(|| ShippingError::missing_field("slug"))?;
    let number = request
        .tracking_number
        .as_deref()
        .ok_or_else(|| ShippingError::missing_field("trackingNumber"))?;
    Ok(json!({ "carrier": carrier, "tracking_number": number }))
}

fn track_request(request: &TrackingRequest) -> Result<Value, ShippingError> {
    let mut body = track_lookup(request)?;
    body["metadata"] = json!(request.title.as_ref().or(request.order_id.as_ref()));
    Ok(body)
}

fn address_request(canonical: &Address, validate: bool) -> Result<Value, ShippingError> {
    let mut body = address(canonical)?;
    body["validate"] = json!(validate);
    Ok(body)
}

// ============ Responses ============

/// Entries of a paginated `results` list, or the response itself if it is a bare list.
fn results(wire: &Value) -> Vec<&Value> {
    if wire.is_array() {
        list(wire, "")
    } else {
        list(wire, "/results")
    }
}

fn rate(value: &Value) -> Rate {
    Rate {
        id: text(value, "/object_id"),
        status: text(value, "/object_status"),
        service_type: text(value, "/servicelevel/token"),
        service_name: text(value, "/servicelevel/name"),
        provider: text(value, "/provider"),
        delivery_date: text(value, "/arrives_by"),
        transit_time: integer(value, "/estimated_days"),
        total_charge: money(value, "/amount", "/currency"),
    }
}

fn shipment_record(value: &Value) -> ShipmentRecord {
    ShipmentRecord {
        id: text(value, "/object_id"),
        status: text(value, "/status"),
        created_at: text(value, "/object_created"),
        tracking_numbers: Vec::new(),
        rates: list(value, "/rates").into_iter().map(rate).collect(),
        labels: Vec::new(),
    }
}

fn label(value: &Value) -> Label {
    Label {
        id: text(value, "/object_id"),
        status: text(value, "/status"),
        label_url: text(value, "/label_url"),
        label_data: None,
        file_type: text(value, "/label_file_type"),
        tracking_numbers: text(value, "/tracking_number").into_iter().collect(),
        created_at: text(value, "/object_created"),
    }
}

fn refund(value: &Value) -> Label {
    Label {
        id: text(value, "/transaction"),
        status: text(value, "/status"),
        created_at: text(value, "/object_created"),
        ..Default::default()
    }
}

fn manifest(value: &Value) -> Manifest {
    Manifest {
        id: text(value, "/object_id"),
        status: text(value, "/status"),
        label_ids: strings(value, "/transactions"),
        files: ManifestFiles {
            manifest: text(value, "/documents/0").map(|url| Document {
                url: Some(url),
                ..Default::default()
            }),
            ..Default::default()
        },
        created_at: text(value, "/object_created"),
        updated_at: text(value, "/object_updated"),
    }
}

fn location(value: &Value) -> Option<String> {
    join_present(&[
        text(value, "/city"),
        text(value, "/state"),
        text(value, "/country"),
    ])
}

fn tracking_event(value: &Value) -> TrackingEvent {
    TrackingEvent {
        status: text(value, "/status"),
        message: text(value, "/status_details"),
        location: location(at(value, "/location")),
        occurred_at: text(value, "/status_date"),
    }
}

fn tracking(value: &Value) -> Tracking {
    Tracking {
        id: text(value, "/tracking_status/object_id"),
        tracking_number: text(value, "/tracking_number"),
        slug: text(value, "/carrier"),
        service_type: text(value, "/servicelevel/token"),
        status: text(value, "/tracking_status/status"),
        history: list(value, "/tracking_history")
            .into_iter()
            .map(tracking_event)
            .collect(),
        ..Default::default()
    }
}

fn address_record(value: &Value) -> AddressRecord {
    AddressRecord {
        id: text(value, "/object_id"),
        is_valid: boolean(value, "/validation_results/is_valid"),
        is_complete: boolean(value, "/is_complete"),
        messages: list(value, "/validation_results/messages")
            .into_iter()
            .filter_map(|m| text(m, "/text"))
            .collect(),
        contact_name: text(value, "/name"),
        company_name: text(value, "/company"),
        street1: text(value, "/street1"),
        street2: text(value, "/street2"),
        street3: text(value, "/street3"),
        city: text(value, "/city"),
        state: text(value, "/state"),
        postal_code: text(value, "/zip"),
        country_code: text(value, "/country"),
        phone: text(value, "/phone"),
        email: text(value, "/email"),
        address_type: boolean(value, "/is_residential").map(|residential| {
            if residential {
                AddressType::Residential
            } else {
                AddressType::Business
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address_payload(country: &str) -> Value {
        json!({
            "contactName": "Ann Sender", "street1": "1 Main St", "city": "Austin",
            "state": "TX", "postalCode": "73301", "countryCode": country, "type": "residential"
        })
    }

    #[test]
    fn test_address_mapping() {
        let wire = format_request(
            Operation::ValidateAddress,
            &address_payload("us"),
            &RequestContext::now(),
        )
        .unwrap();
        assert_eq!(wire["name"], "Ann Sender");
        assert_eq!(wire["zip"], "73301");
        assert_eq!(wire["country"], "US");
        assert_eq!(wire["is_residential"], true);
        assert_eq!(wire["validate"], true);
    }

    #[test]
    fn test_listing_defaults() {
        let wire = format_request(Operation::Labels, &json!({}), &RequestContext::now()).unwrap();
        assert_eq!(wire, json!({"page": 1, "results": 25}));
    }

    #[test]
    fn test_label_requires_rate() {
        let err = format_request(Operation::CreateLabel, &json!({}), &RequestContext::now())
            .unwrap_err();
        assert!(matches!(err, ShippingError::Validation(ref e) if e[0].field == "rateId"));
    }

    #[test]
    fn test_label_defaults_file_type() {
        let wire = format_request(
            Operation::CreateLabel,
            &json!({"rateId": "r_1"}),
            &RequestContext::now(),
        )
        .unwrap();
        assert_eq!(wire["label_file_type"], LABEL_FILE_TYPE);
        assert_eq!(wire["async"], false);
    }

    #[test]
    fn test_parcel_dimensions_are_strings() {
        let payload = json!({
            "shipFrom": address_payload("US"),
            "shipTo": address_payload("US"),
            "parcels": [{"length": 10, "width": 5.5, "height": 2, "massUnit": "lb",
                         "items": [{"description": "Mug", "quantity": 2, "weight": {"value": 0.75, "unit": "lb"}}]}],
            "shipmentDate": "2024-03-01T10:00:00-05:00",
            "serviceType": "usps_priority"
        });
        let wire =
            format_request(Operation::CreateShipment, &payload, &RequestContext::now()).unwrap();
        let parcel = &wire["parcels"][0];
        assert_eq!(parcel["length"], "10");
        assert_eq!(parcel["width"], "5.5");
        assert_eq!(parcel["weight"], "1.5");
        assert_eq!(parcel["distance_unit"], "in");
        assert_eq!(parcel["mass_unit"], "lb");
        assert_eq!(wire["shipment_date"], "2024-03-01T15:00:00Z");
        assert!(wire["customs_declaration"].is_null());
    }

    #[test]
    fn test_rates_response_parses_amount_strings() {
        let wire = json!({"results": [
            {"object_id": "r1", "amount": "5.50", "currency": "USD", "provider": "USPS",
             "servicelevel": {"token": "usps_priority", "name": "Priority Mail"}, "estimated_days": 2},
            {"object_id": "r2", "amount": "12.00", "currency": "USD", "provider": "UPS",
             "servicelevel": {"token": "ups_ground", "name": "Ground"}}
        ]});
        let data = format_response(Operation::Rates, &wire);
        assert_eq!(data["rates"][0]["id"], "r1");
        assert_eq!(data["rates"][0]["totalCharge"]["amount"], 5.5);
        assert_eq!(data["rates"][0]["transitTime"], 2);
        assert_eq!(data["rates"][1]["serviceType"], "ups_ground");
        assert!(data["rates"][1]["transitTime"].is_null());
    }

    #[test]
    fn test_address_validation_response() {
        let wire = json!({
            "object_id": "a1", "is_complete": true, "name": "Ann", "zip": "73301", "country": "US",
            "is_residential": false,
            "validation_results": {"is_valid": false, "messages": [{"text": "Address not found"}]}
        });
        let data = format_response(Operation::ValidateAddress, &wire);
        assert_eq!(data["address"]["isValid"], false);
        assert_eq!(data["address"]["messages"], json!(["Address not found"]));
        assert_eq!(data["address"]["type"], "business");
        assert_eq!(data["address"]["postalCode"], "73301");
    }

    #[test]
    fn test_trackings_listing_is_unsupported() {
        let wire = format_request(Operation::Trackings, &json!({}), &RequestContext::now()).unwrap();
        assert_eq!(wire, json!({}));
        assert!(!supports(Operation::Trackings));
    }
}

//! Postmen mapping, with AfterShip serving the tracking operations.
//!
//! Postmen wants ISO 3166-1 alpha-3 country codes everywhere and wraps every
//! response in `{"meta": ..., "data": ...}`.

use serde_json::{json, Value};

use super::{
    at, decode, document, empty, integer, join_present, list, money, number, strings, text,
    RequestContext, DEFAULT_PAGE, DEFAULT_PAGE_SIZE,
};
use crate::carrier::Operation;
use crate::errors::ShippingError;
use crate::models::{
    Address, CancelLabelRequest, Item, Label, LabelRequest, Listing, Manifest, ManifestFiles,
    ManifestRef, ManifestRequest, Parcel, Rate, Shipment, ShipperAccount, Tracking,
    TrackingEvent, TrackingRequest,
};
use crate::units::{
    checked_country_code, country_alpha2_to_alpha3, country_alpha3_to_alpha2, DistanceUnit,
};

pub const PAPER_SIZE: &str = "4x6";
pub const BOX_TYPE: &str = "custom";
const PARCEL_DESCRIPTION: &str = "Parcel";
const CUSTOMS_PURPOSE: &str = "merchandise";
const TERMS_OF_TRADE: &str = "ddp";
const BILLING_PAID_BY: &str = "shipper";
const DISTANCE_UNIT: DistanceUnit = DistanceUnit::Cm;

pub fn supports(operation: Operation) -> bool {
    !matches!(
        operation,
        Operation::Shipments
            | Operation::CreateShipment
            | Operation::ValidateAddress
            | Operation::CreateAddress
    )
}

pub fn format_request(
    operation: Operation,
    payload: &Value,
    _ctx: &RequestContext,
) -> Result<Value, ShippingError> {
    match operation {
        Operation::Rates => rates_request(&decode(payload)?),
        Operation::CreateLabel => label_request(&decode(payload)?),
        Operation::CancelOrDeleteLabel => {
            let cancel: CancelLabelRequest = decode(payload)?;
            Ok(json!({ "label": { "id": cancel.label_id }, "async": false }))
        }
        Operation::Labels | Operation::Manifests => {
            let listing: Listing = decode(payload)?;
            Ok(json!({ "limit": listing.limit.unwrap_or(DEFAULT_PAGE_SIZE) }))
        }
        Operation::Manifest => {
            let manifest: ManifestRef = decode(payload)?;
            Ok(json!({ "manifest_id": manifest.manifest_id }))
        }
        Operation::CreateManifest => manifest_request(&decode(payload)?),
        Operation::Trackings => {
            let listing: Listing = decode(payload)?;
            Ok(json!({
                "page": listing.page.unwrap_or(DEFAULT_PAGE),
                "limit": listing.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            }))
        }
        Operation::TrackingStatus => tracking_lookup(&decode(payload)?),
        Operation::CreateTracking => tracking_request(&decode(payload)?),
        Operation::Shipments
        | Operation::CreateShipment
        | Operation::ValidateAddress
        | Operation::CreateAddress => Ok(empty()),
    }
}

pub fn format_response(operation: Operation, wire: &Value) -> Value {
    match operation {
        Operation::Rates => json!({ "rates": rates(wire) }),
        Operation::Labels => json!({
            "labels": list(wire, "/data/labels").into_iter().map(label).collect::<Vec<_>>()
        }),
        Operation::CreateLabel => json!({ "label": label(at(wire, "/data")) }),
        Operation::CancelOrDeleteLabel => json!({
            "label": Label {
                id: text(wire, "/data/label/id"),
                status: text(wire, "/data/status"),
                created_at: text(wire, "/data/created_at"),
                ..Default::default()
            }
        }),
        Operation::Manifests => json!({
            "manifests": list(wire, "/data/manifests").into_iter().map(manifest).collect::<Vec<_>>()
        }),
        Operation::Manifest | Operation::CreateManifest => {
            json!({ "manifest": manifest(at(wire, "/data")) })
        }
        Operation::Trackings => json!({
            "trackings": list(wire, "/data/trackings").into_iter().map(tracking).collect::<Vec<_>>()
        }),
        Operation::TrackingStatus | Operation::CreateTracking => {
            json!({ "tracking": tracking(at(wire, "/data/tracking")) })
        }
        Operation::Shipments
        | Operation::CreateShipment
        | Operation::ValidateAddress
        | Operation::CreateAddress => empty(),
    }
}

// ============ Requests ============

/// ISO alpha-3 code for a canonical two-letter code.
fn iso3(code: &str) -> Result<&'static str, ShippingError> {
    country_alpha2_to_alpha3(&checked_country_code(code)?)
}

/// Item origin countries may already be alpha-3.
fn origin_iso3(code: &str) -> Result<String, ShippingError> {
    let trimmed = code.trim();
    if trimmed.len() == 3 && country_alpha3_to_alpha2(trimmed).is_ok() {
        return Ok(trimmed.to_ascii_uppercase());
    }
    Ok(iso3(trimmed)?.to_string())
}

/// Postmen address object for `address`.
pub fn address(address: &Address) -> Result<Value, ShippingError> {
    Ok(json!({
        "contact_name": address.contact_name,
        "company_name": address.company_name,
        "street1": address.street1,
        "street2": address.street2,
        "street3": address.street3,
        "city": address.city,
        "state": address.state,
        "postal_code": address.postal_code,
        "country": iso3(&address.country_code)?,
        "phone": address.phone,
        "email": address.email,
        "type": address.address_type,
    }))
}

fn item(item: &Item) -> Result<Value, ShippingError> {
    let origin_country = item.origin_country.as_deref().map(origin_iso3).transpose()?;
    Ok(json!({
        "description": item.description,
        "origin_country": origin_country,
        "quantity": item.quantity,
        "sku": item.sku,
        "weight": item.weight.as_ref().map(|w| json!({ "value": w.value, "unit": w.unit })),
        "price": item.price,
    }))
}

fn parcel(parcel: &Parcel) -> Result<Value, ShippingError> {
    let (length, width, height) = parcel.dimensions();
    let weight = parcel.total_weight().map(|w| {
        let unit = parcel.effective_mass_unit().unwrap_or(w.unit);
        json!({ "value": w.unit.convert(w.value, unit), "unit": unit })
    });
    let items = parcel.items.iter().map(item).collect::<Result<Vec<_>, _>>()?;

    Ok(json!({
        "description": parcel.description.as_deref().unwrap_or(PARCEL_DESCRIPTION),
        "box_type": parcel.box_type.as_deref().unwrap_or(BOX_TYPE),
        "weight": weight,
        "dimension": {
            "width": width,
            "height": height,
            "depth": length,
            "unit": parcel.effective_distance_unit().unwrap_or(DISTANCE_UNIT),
        },
        "items": items,
    }))
}

fn shipment_body(shipment: &Shipment) -> Result<Value, ShippingError> {
    let parcels = shipment
        .parcels
        .iter()
        .map(parcel)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({
        "ship_from": address(&shipment.ship_from)?,
        "ship_to": address(&shipment.ship_to)?,
        "parcels": parcels,
    }))
}

fn shipper_account(account: Option<&ShipperAccount>) -> Result<Value, ShippingError> {
    account
        .map(|a| json!({ "id": a.id }))
        .ok_or_else(|| ShippingError::missing_field("shipperAccount"))
}

fn rates_request(shipment: &Shipment) -> Result<Value, ShippingError> {
    let body = shipment_body(shipment)?;
    Ok(json!({
        "async": false,
        "is_document": false,
        "shipper_accounts": [shipper_account(shipment.shipper_account.as_ref())?],
        "shipment": body,
    }))
}

fn label_request(request: &LabelRequest) -> Result<Value, ShippingError> {
    let shipment = request
        .shipment
        .as_ref()
        .ok_or_else(|| ShippingError::missing_field("shipment"))?;
    let body = shipment_body(shipment)?;
    let metadata = shipment.metadata();

    let customs = shipment.is_international().then(|| {
        let purpose = metadata
            .customs
            .as_ref()
            .and_then(|c| c.purpose.clone())
            .unwrap_or_else(|| CUSTOMS_PURPOSE.to_string());
        json!({
            "billing": { "paid_by": BILLING_PAID_BY },
            "purpose": purpose,
            "terms_of_trade": metadata
                .payment_info
                .as_deref()
                .map(str::to_ascii_lowercase)
                .unwrap_or_else(|| TERMS_OF_TRADE.to_string()),
        })
    });

    Ok(json!({
        "async": false,
        "return_shipment": false,
        "is_document": false,
        "service_type": shipment.service_type,
        "paper_size": metadata.paper_size.as_deref().unwrap_or(PAPER_SIZE),
        "ship_date": shipment.shipment_date.format("%Y-%m-%d").to_string(),
        "shipper_account": shipper_account(shipment.shipper_account.as_ref())?,
        "shipment": body,
        "customs": customs,
    }))
}

fn manifest_request(request: &ManifestRequest) -> Result<Value, ShippingError> {
    let labels: Vec<Value> = request
        .label_ids
        .iter()
        .map(|id| json!({ "id": id }))
        .collect();
    Ok(json!({
        "async": false,
        "shipper_account": shipper_account(request.shipper_account.as_ref())?,
        "labels": (!labels.is_empty()).then_some(labels),
    }))
}

fn tracking_lookup(request: &TrackingRequest) -> Result<Value, ShippingError> {
    let slug = request
        .slug
        .as_deref()
        .ok_or_else(|| ShippingError::missing_field("slug"))?;
    let number = request
        .tracking_number
        .as_deref()
        .ok_or_else(|| ShippingError::missing_field("trackingNumber"))?;
    Ok(json!({ "slug": slug, "tracking_number": number }))
}

fn tracking_request(request: &TrackingRequest) -> Result<Value, ShippingError> {
    let number = request
        .tracking_number
        .as_deref()
        .ok_or_else(|| ShippingError::missing_field("trackingNumber"))?;
    Ok(json!({
        "tracking": {
            "slug": request.slug,
            "tracking_number": number,
            "title": request.title,
            "order_id": request.order_id,
        }
    }))
}

// ============ Responses ============

fn rates(wire: &Value) -> Vec<Rate> {
    let status = text(wire, "/data/status");
    list(wire, "/data/rates")
        .into_iter()
        .map(|rate| Rate {
            id: None,
            status: status.clone(),
            service_type: text(rate, "/service_type"),
            service_name: text(rate, "/service_name"),
            provider: text(rate, "/shipper_account/slug"),
            delivery_date: text(rate, "/delivery_date"),
            transit_time: integer(rate, "/transit_time"),
            total_charge: money(rate, "/total_charge/amount", "/total_charge/currency"),
        })
        .collect()
}

fn label(value: &Value) -> Label {
    Label {
        id: text(value, "/id"),
        status: text(value, "/status"),
        label_url: text(value, "/files/label/url"),
        label_data: None,
        file_type: text(value, "/files/label/file_type"),
        tracking_numbers: strings(value, "/tracking_numbers"),
        created_at: text(value, "/created_at"),
    }
}

fn manifest(value: &Value) -> Manifest {
    Manifest {
        id: text(value, "/id"),
        status: text(value, "/status"),
        label_ids: list(value, "/labels")
            .into_iter()
            .filter_map(|l| text(l, "/id"))
            .collect(),
        files: ManifestFiles {
            label: document(value, "/files/label"),
            invoice: document(value, "/files/invoice"),
            customs_declaration: document(value, "/files/customs_declaration"),
            manifest: document(value, "/files/manifest"),
        },
        created_at: text(value, "/created_at"),
        updated_at: text(value, "/updated_at"),
    }
}

fn checkpoint(value: &Value) -> TrackingEvent {
    TrackingEvent {
        status: text(value, "/tag"),
        message: text(value, "/message"),
        location: text(value, "/location").or_else(|| {
            join_present(&[text(value, "/city"), text(value, "/country_iso3")])
        }),
        occurred_at: text(value, "/checkpoint_time"),
    }
}

fn tracking(value: &Value) -> Tracking {
    Tracking {
        id: text(value, "/id"),
        tracking_number: text(value, "/tracking_number"),
        slug: text(value, "/slug"),
        service_type: text(value, "/shipment_type"),
        status: text(value, "/tag"),
        shipment_weight: number(value, "/shipment_weight"),
        shipment_weight_unit: text(value, "/shipment_weight_unit"),
        shipment_package_count: integer(value, "/shipment_package_count")
            .and_then(|n| u32::try_from(n).ok()),
        history: list(value, "/checkpoints")
            .into_iter()
            .map(checkpoint)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipment(to_country: &str) -> Value {
        json!({
            "shipFrom": {
                "contactName": "Ann Sender", "street1": "1 Main St", "city": "Austin",
                "postalCode": "73301", "countryCode": "US", "type": "business"
            },
            "shipTo": {
                "contactName": "Bo Receiver", "street1": "Hauptstr. 5", "city": "Berlin",
                "postalCode": "10115", "countryCode": to_country
            },
            "parcels": [{
                "dimension": {"width": 20, "height": 10, "depth": 30, "unit": "cm"},
                "items": [{"description": "Tea", "quantity": 1, "originCountry": "CN",
                           "weight": {"value": 0.5, "unit": "kg"},
                           "price": {"amount": 9.99, "currency": "USD"}}]
            }],
            "shipmentDate": "2024-03-01T10:00:00-05:00",
            "serviceType": "dhl_express_worldwide",
            "shipperAccount": {"id": "acc_1"}
        })
    }

    #[test]
    fn test_rates_request_uses_iso3() {
        let wire = format_request(Operation::Rates, &shipment("DE"), &RequestContext::now()).unwrap();
        assert_eq!(wire["shipper_accounts"], json!([{"id": "acc_1"}]));
        assert_eq!(wire["shipment"]["ship_from"]["country"], "USA");
        assert_eq!(wire["shipment"]["ship_to"]["country"], "DEU");
        assert_eq!(wire["shipment"]["ship_from"]["type"], "business");

        let parcel = &wire["shipment"]["parcels"][0];
        assert_eq!(parcel["box_type"], BOX_TYPE);
        assert_eq!(parcel["dimension"]["depth"], 30.0);
        assert_eq!(parcel["items"][0]["origin_country"], "CHN");
        assert_eq!(parcel["weight"], json!({"value": 0.5, "unit": "kg"}));
    }

    #[test]
    fn test_unknown_country_fails() {
        let err = format_request(Operation::Rates, &shipment("XX"), &RequestContext::now())
            .unwrap_err();
        assert!(matches!(err, ShippingError::UnknownCountry(code) if code == "XX"));
    }

    #[test]
    fn test_label_request_adds_customs_when_international() {
        let payload = json!({ "shipment": shipment("DE") });
        let wire = format_request(Operation::CreateLabel, &payload, &RequestContext::now()).unwrap();
        assert_eq!(wire["paper_size"], PAPER_SIZE);
        assert_eq!(wire["ship_date"], "2024-03-01");
        assert_eq!(wire["customs"]["terms_of_trade"], TERMS_OF_TRADE);
        assert_eq!(wire["customs"]["billing"]["paid_by"], BILLING_PAID_BY);

        let domestic = json!({ "shipment": shipment("US") });
        let wire = format_request(Operation::CreateLabel, &domestic, &RequestContext::now()).unwrap();
        assert!(wire["customs"].is_null());
    }

    #[test]
    fn test_empty_manifest_listing() {
        let data = format_response(Operation::Manifests, &json!({"meta": {"code": 200}, "data": {}}));
        assert_eq!(data, json!({"manifests": []}));
    }

    #[test]
    fn test_rates_copy_parent_status() {
        let wire = json!({"meta": {"code": 200}, "data": {
            "status": "calculated",
            "rates": [
                {"service_type": "a", "shipper_account": {"slug": "dhl"},
                 "total_charge": {"amount": 10.5, "currency": "USD"}, "transit_time": 3},
                {"service_type": "b", "total_charge": {"amount": 20, "currency": "USD"}}
            ]
        }});
        let data = format_response(Operation::Rates, &wire);
        assert_eq!(data["rates"][0]["status"], "calculated");
        assert_eq!(data["rates"][1]["status"], "calculated");
        assert_eq!(data["rates"][0]["provider"], "dhl");
        assert_eq!(data["rates"][1]["totalCharge"]["amount"], 20.0);
    }

    #[test]
    fn test_tracking_checkpoints() {
        let wire = json!({"meta": {"code": 200}, "data": {"tracking": {
            "id": "t1", "slug": "usps", "tracking_number": "9400", "tag": "InTransit",
            "shipment_package_count": 1,
            "checkpoints": [{"tag": "InfoReceived", "message": "Label created",
                             "city": "Austin", "country_iso3": "USA",
                             "checkpoint_time": "2024-05-01T10:00:00Z"}]
        }}});
        let data = format_response(Operation::TrackingStatus, &wire);
        assert_eq!(data["tracking"]["status"], "InTransit");
        assert_eq!(data["tracking"]["history"][0]["location"], "Austin, USA");
    }

    #[test]
    fn test_manifest_labels_are_optional() {
        let wire = format_request(
            Operation::CreateManifest,
            &json!({"shipperAccount": {"id": "acc_1"}}),
            &RequestContext::now(),
        )
        .unwrap();
        assert!(wire["labels"].is_null());
        assert_eq!(wire["shipper_account"]["id"], "acc_1");
    }
}

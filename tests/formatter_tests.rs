/// Formatter integration tests
/// Checks the canonical <-> carrier mappings through the public formatter entry points
use chrono::{FixedOffset, TimeZone};
use rust_shipping_api::carrier::{Carrier, Operation};
use rust_shipping_api::errors::ShippingError;
use rust_shipping_api::formatters::{self, RequestContext};
use serde_json::{json, Value};

fn ctx() -> RequestContext {
    let zone = FixedOffset::east_opt(2 * 3600).unwrap();
    RequestContext::at(zone.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap())
}

fn address(country: &str) -> Value {
    json!({
        "contactName": "Ann Sender",
        "street1": "1 Main St",
        "city": "Austin",
        "state": "TX",
        "postalCode": "73301",
        "countryCode": country,
        "phone": "5125550100"
    })
}

fn shipment(to_country: &str, mass_unit: &str) -> Value {
    json!({
        "shipFrom": address("US"),
        "shipTo": address(to_country),
        "parcels": [{
            "length": 12, "width": 10, "height": 6, "massUnit": mass_unit,
            "items": [{"description": "Mug", "quantity": 2, "originCountry": "CHN",
                       "weight": {"value": 1.5, "unit": mass_unit},
                       "price": {"amount": 12.5, "currency": "USD"}}]
        }],
        "shipmentDate": "2024-03-01T10:00:00-05:00",
        "serviceType": "usps_priority",
        "shipperAccount": {"id": "acc_1"}
    })
}

#[test]
fn test_dhl_unit_of_measurement_follows_mass_unit() {
    let unit = |mass_unit: &str| {
        let wire = formatters::format_request(
            Carrier::Dhl,
            Operation::Rates,
            &shipment("DE", mass_unit),
            &ctx(),
        )
        .unwrap();
        wire["RateRequest"]["RequestedShipment"]["UnitOfMeasurement"].clone()
    };

    assert_eq!(unit("lb"), "SI");
    assert_eq!(unit("oz"), "SI");
    assert_eq!(unit("kg"), "SU");
    assert_eq!(unit("g"), "SU");
}

#[test]
fn test_postmen_label_uses_iso3_and_customs_when_international() {
    let payload = json!({"shipment": shipment("DE", "kg")});
    let wire =
        formatters::format_request(Carrier::Postmen, Operation::CreateLabel, &payload, &ctx())
            .unwrap();

    assert_eq!(wire["shipment"]["ship_from"]["country"], "USA");
    assert_eq!(wire["shipment"]["ship_to"]["country"], "DEU");
    assert_eq!(wire["shipment"]["parcels"][0]["items"][0]["origin_country"], "CHN");
    assert_eq!(wire["customs"]["purpose"], "merchandise");
    assert_eq!(wire["ship_date"], "2024-03-01");
    assert_eq!(wire["paper_size"], "4x6");
}

#[test]
fn test_domestic_label_has_no_customs_and_no_nulls() {
    let payload = json!({"shipment": shipment("US", "lb")});
    let wire =
        formatters::format_request(Carrier::Postmen, Operation::CreateLabel, &payload, &ctx())
            .unwrap();

    let object = wire.as_object().unwrap();
    assert!(!object.contains_key("customs"));
    let ship_to = wire["shipment"]["ship_to"].as_object().unwrap();
    assert!(!ship_to.contains_key("company_name"));
    assert!(!ship_to.contains_key("email"));
}

#[test]
fn test_shippo_customs_only_for_international() {
    let domestic = formatters::format_request(
        Carrier::Shippo,
        Operation::CreateShipment,
        &shipment("US", "lb"),
        &ctx(),
    )
    .unwrap();
    assert!(domestic.get("customs_declaration").is_none());

    let international = formatters::format_request(
        Carrier::Shippo,
        Operation::CreateShipment,
        &shipment("CA", "lb"),
        &ctx(),
    )
    .unwrap();
    assert!(international["customs_declaration"].is_object());
    assert_eq!(international["address_to"]["country"], "CA");
}

#[test]
fn test_unknown_country_for_postmen() {
    let result = formatters::format_request(
        Carrier::Postmen,
        Operation::Rates,
        &shipment("XX", "kg"),
        &ctx(),
    );
    assert!(matches!(result, Err(ShippingError::UnknownCountry(_))));
}

#[test]
fn test_three_letter_country_is_invalid_address() {
    for carrier in Carrier::ALL {
        let operation = match carrier {
            Carrier::Postmen => Operation::Rates,
            _ => Operation::CreateShipment,
        };
        let result =
            formatters::format_request(carrier, operation, &shipment("DEU", "kg"), &ctx());
        assert!(
            matches!(result, Err(ShippingError::InvalidAddress(_))),
            "{}",
            carrier
        );
    }
}

#[test]
fn test_same_inputs_give_same_request() {
    let payload = json!({"trackingNumbers": ["1234567890", "0987654321"]});
    let first =
        formatters::format_request(Carrier::Dhl, Operation::Trackings, &payload, &ctx()).unwrap();
    let second =
        formatters::format_request(Carrier::Dhl, Operation::Trackings, &payload, &ctx()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_unknown_carrier_name_maps_to_empty() {
    let request =
        formatters::request_for("fedex", Operation::Rates, &shipment("DE", "kg"), &ctx()).unwrap();
    assert_eq!(request, json!({}));
    assert_eq!(
        formatters::response_for("fedex", Operation::Rates, &json!({"rates": []})),
        json!({})
    );
}

#[test]
fn test_dhl_rates_keep_carrier_order() {
    let wire = json!({
        "RateResponse": {"Provider": [
            {"@code": "DHL", "Service": [
                {"@type": "P", "TotalNet": {"Currency": "USD", "Amount": "80.10"}},
                {"@type": "N", "TotalNet": {"Currency": "USD", "Amount": "45.10"}}
            ]},
            {"@code": "DHL", "Service": {"@type": "U", "TotalNet": {"Currency": "USD", "Amount": "120"}}}
        ]}
    });
    let data = formatters::format_response(Carrier::Dhl, Operation::Rates, &wire);
    let types: Vec<&str> = data["rates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["serviceType"].as_str().unwrap())
        .collect();
    assert_eq!(types, vec!["P", "N", "U"]);
}

#[test]
fn test_missing_response_sections_give_empty_lists() {
    assert_eq!(
        formatters::format_response(Carrier::Postmen, Operation::Manifests, &json!({"data": {}})),
        json!({"manifests": []})
    );
    assert_eq!(
        formatters::format_response(Carrier::Shippo, Operation::Labels, &json!({})),
        json!({"labels": []})
    );
    assert_eq!(
        formatters::format_response(Carrier::Dhl, Operation::Trackings, &json!({})),
        json!({"trackings": []})
    );
}

#[test]
fn test_support_matrix() {
    assert!(formatters::supports(Carrier::Dhl, Operation::CreateShipment));
    assert!(!formatters::supports(Carrier::Dhl, Operation::Labels));
    assert!(!formatters::supports(Carrier::Shippo, Operation::Trackings));
    assert!(formatters::supports(Carrier::Postmen, Operation::CreateTracking));
    assert!(!formatters::supports(Carrier::Postmen, Operation::ValidateAddress));
}

#[test]
fn test_cancel_label_requests() {
    let payload = json!({"labelId": "lbl_9"});
    let shippo =
        formatters::format_request(Carrier::Shippo, Operation::CancelOrDeleteLabel, &payload, &ctx())
            .unwrap();
    assert_eq!(shippo, json!({"transaction": "lbl_9", "async": false}));

    let postmen =
        formatters::format_request(Carrier::Postmen, Operation::CancelOrDeleteLabel, &payload, &ctx())
            .unwrap();
    assert_eq!(postmen, json!({"label": {"id": "lbl_9"}, "async": false}));
}

#[test]
fn test_shippo_manifest_request() {
    let payload = json!({
        "shipperAccount": {"id": "ca_1"},
        "shipmentDate": "2024-03-01T10:00:00-05:00",
        "shipFrom": address("US"),
        "labelIds": ["tx_1", "tx_2"]
    });
    let wire =
        formatters::format_request(Carrier::Shippo, Operation::CreateManifest, &payload, &ctx())
            .unwrap();

    assert_eq!(wire["carrier_account"], "ca_1");
    assert_eq!(wire["shipment_date"], "2024-03-01T15:00:00Z");
    assert_eq!(wire["transactions"], json!(["tx_1", "tx_2"]));
    assert_eq!(wire["address_from"]["zip"], "73301");
}

#[test]
fn test_create_tracking_requests() {
    let payload = json!({"slug": "usps", "trackingNumber": "9400100000000000000000", "title": "Order 7"});

    let shippo =
        formatters::format_request(Carrier::Shippo, Operation::CreateTracking, &payload, &ctx())
            .unwrap();
    assert_eq!(
        shippo,
        json!({"carrier": "usps", "tracking_number": "9400100000000000000000", "metadata": "Order 7"})
    );

    let aftership =
        formatters::format_request(Carrier::Postmen, Operation::CreateTracking, &payload, &ctx())
            .unwrap();
    assert_eq!(aftership["tracking"]["slug"], "usps");
    assert_eq!(aftership["tracking"]["title"], "Order 7");
    assert!(aftership["tracking"].get("order_id").is_none());
}

#[test]
fn test_shippo_address_requests_differ_only_in_validate_flag() {
    let payload = address("US");
    let mut validate =
        formatters::format_request(Carrier::Shippo, Operation::ValidateAddress, &payload, &ctx())
            .unwrap();
    let create =
        formatters::format_request(Carrier::Shippo, Operation::CreateAddress, &payload, &ctx())
            .unwrap();

    assert_eq!(validate["validate"], true);
    assert_eq!(create["validate"], false);
    validate["validate"] = json!(false);
    assert_eq!(validate, create);
}

#[test]
fn test_bad_country_wins_over_missing_account() {
    let mut payload = shipment("DE", "kg");
    payload["shipFrom"]["countryCode"] = json!("USA");
    payload.as_object_mut().unwrap().remove("shipperAccount");

    for (carrier, operation, body) in [
        (Carrier::Dhl, Operation::CreateShipment, payload.clone()),
        (Carrier::Dhl, Operation::Rates, payload.clone()),
        (Carrier::Postmen, Operation::Rates, payload.clone()),
        (Carrier::Postmen, Operation::CreateLabel, json!({"shipment": payload.clone()})),
    ] {
        let result = formatters::format_request(carrier, operation, &body, &ctx());
        assert!(
            matches!(result, Err(ShippingError::InvalidAddress(_))),
            "{} {}: {:?}",
            carrier,
            operation,
            result
        );
    }
}

#[test]
fn test_dhl_rate_content_matches_shipment_content() {
    let mut payload = shipment("DE", "kg");
    payload["shipmentMetadata"] = json!({"customs": {"content": "DOCUMENTS"}});

    let rate = formatters::format_request(Carrier::Dhl, Operation::Rates, &payload, &ctx()).unwrap();
    let ship =
        formatters::format_request(Carrier::Dhl, Operation::CreateShipment, &payload, &ctx()).unwrap();

    assert_eq!(rate["RateRequest"]["RequestedShipment"]["Content"], "DOCUMENTS");
    assert_eq!(
        ship["ShipmentRequest"]["RequestedShipment"]["InternationalDetail"]["Content"],
        "DOCUMENTS"
    );

    let plain = formatters::format_request(Carrier::Dhl, Operation::Rates, &shipment("DE", "kg"), &ctx())
        .unwrap();
    assert_eq!(plain["RateRequest"]["RequestedShipment"]["Content"], "NON_DOCUMENTS");
}

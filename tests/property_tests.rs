/// Property-based tests using proptest
/// Tests invariants and properties that should hold for all inputs
use chrono::{FixedOffset, TimeZone};
use proptest::prelude::*;
use rust_shipping_api::carrier::{Carrier, Operation};
use rust_shipping_api::errors::ShippingError;
use rust_shipping_api::formatters::{self, RequestContext};
use rust_shipping_api::units::{checked_country_code, format_date_time_with_gmt_offset, MassUnit};
use serde_json::{json, Value};

/// Arbitrary JSON documents, a few levels deep.
fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9@ ]{0,12}".prop_map(Value::from),
    ];
    leaf.prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::hash_map(
                prop_oneof![
                    Just("data".to_string()),
                    Just("results".to_string()),
                    Just("ShipmentResponse".to_string()),
                    Just("Notification".to_string()),
                    Just("tracking".to_string()),
                    "[a-z_]{1,8}".prop_map(String::from),
                ],
                inner,
                0..6,
            )
            .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn arb_mass_unit() -> impl Strategy<Value = MassUnit> {
    prop_oneof![
        Just(MassUnit::Lb),
        Just(MassUnit::Kg),
        Just(MassUnit::Oz),
        Just(MassUnit::G),
    ]
}

// Property: Response formatting accepts any document
proptest! {
    #[test]
    fn response_formatting_never_panics(wire in arb_json()) {
        for carrier in Carrier::ALL {
            for operation in Operation::ALL {
                let data = formatters::format_response(carrier, operation, &wire);
                prop_assert!(data.is_object());
            }
        }
    }

    #[test]
    fn unknown_carrier_maps_to_empty(name in "[a-z]{3,10}", wire in arb_json()) {
        prop_assume!(name.parse::<Carrier>().is_err());
        prop_assert_eq!(formatters::response_for(&name, Operation::Rates, &wire), json!({}));
    }
}

// Property: Request formatting is a pure function of payload and context
proptest! {
    #[test]
    fn request_formatting_is_deterministic(
        length in 1u32..200,
        weight in 1u32..500,
        carrier_idx in 0usize..3,
        secs in 0i64..2_000_000_000
    ) {
        let carrier = Carrier::ALL[carrier_idx];
        let address = |country: &str| json!({
            "contactName": "Ann", "street1": "1 Main St", "city": "Austin",
            "postalCode": "73301", "countryCode": country, "phone": "5125550100"
        });
        let payload = json!({
            "shipFrom": address("US"),
            "shipTo": address("CA"),
            "parcels": [{
                "length": length, "width": 5, "height": 5,
                "weight": {"value": weight, "unit": "kg"},
                "items": [{"description": "Tea", "quantity": 1,
                           "price": {"amount": 10, "currency": "USD"}}]
            }],
            "shipmentDate": "2024-03-01T10:00:00Z",
            "serviceType": "P",
            "shipperAccount": {"id": "acc_1"}
        });
        let instant = chrono::Utc.timestamp_opt(secs, 0).unwrap();
        let ctx = RequestContext::at(instant);

        let operation = match carrier {
            Carrier::Postmen => Operation::Rates,
            _ => Operation::CreateShipment,
        };

        let first = formatters::format_request(carrier, operation, &payload, &ctx);
        let second = formatters::format_request(carrier, operation, &payload, &ctx);
        prop_assert_eq!(first.unwrap(), second.unwrap());
    }
}

// Property: Country codes are checked by length only
proptest! {
    #[test]
    fn two_letter_codes_pass(code in "[a-zA-Z]{2}") {
        prop_assert_eq!(checked_country_code(&code).unwrap(), code.to_ascii_uppercase());
    }

    #[test]
    fn other_lengths_are_invalid(code in "[A-Z]{3,6}|[A-Z]?") {
        let is_invalid_address = matches!(
            checked_country_code(&code),
            Err(ShippingError::InvalidAddress(_))
        );
        prop_assert!(is_invalid_address);
    }
}

// Property: Date formatting and unit conversion
proptest! {
    #[test]
    fn gmt_offset_format_shape(secs in 0i64..4_000_000_000, offset_minutes in -720i32..=840) {
        let zone = FixedOffset::east_opt(offset_minutes * 60).unwrap();
        let date = zone.timestamp_opt(secs, 0).unwrap();
        let formatted = format_date_time_with_gmt_offset(&date);

        prop_assert_eq!(formatted.len(), 28);
        prop_assert_eq!(&formatted[19..22], "GMT");
        let sign = if offset_minutes >= 0 { "+" } else { "-" };
        prop_assert_eq!(&formatted[22..23], sign);
        let expected_offset = format!(
            "{:02}:{:02}",
            offset_minutes.abs() / 60,
            offset_minutes.abs() % 60
        );
        prop_assert_eq!(&formatted[23..], expected_offset.as_str());
    }

    #[test]
    fn mass_conversion_round_trips(value in 0.0f64..10_000.0, from in arb_mass_unit(), to in arb_mass_unit()) {
        let back = to.convert(from.convert(value, to), from);
        prop_assert!((back - value).abs() < 1e-6 * value.max(1.0));
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ShippingError;

/// Carriers the facade knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Carrier {
    /// DHL Express web services (SOAP operations over their JSON binding).
    Dhl,
    /// Shippo REST API.
    Shippo,
    /// Postmen shipping API, with AfterShip for trackings.
    Postmen,
}

impl Carrier {
    pub const ALL: [Carrier; 3] = [Carrier::Dhl, Carrier::Shippo, Carrier::Postmen];

    pub fn as_str(self) -> &'static str {
        match self {
            Carrier::Dhl => "dhl",
            Carrier::Shippo => "shippo",
            Carrier::Postmen => "postmen",
        }
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Carrier {
    type Err = ShippingError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "dhl" => Ok(Carrier::Dhl),
            "shippo" => Ok(Carrier::Shippo),
            "postmen" => Ok(Carrier::Postmen),
            _ => Err(ShippingError::UnknownCarrier(name.to_string())),
        }
    }
}

/// Operations exposed by the gateway.
///
/// The names match the operation names callers send over the wire
/// (`createShipment`, `cancelOrDeleteLabel`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Rates,
    Labels,
    Manifests,
    Manifest,
    Trackings,
    TrackingStatus,
    Shipments,
    CreateShipment,
    ValidateAddress,
    CreateLabel,
    CreateManifest,
    CreateTracking,
    CancelOrDeleteLabel,
    CreateAddress,
}

impl Operation {
    pub const ALL: [Operation; 14] = [
        Operation::Rates,
        Operation::Labels,
        Operation::Manifests,
        Operation::Manifest,
        Operation::Trackings,
        Operation::TrackingStatus,
        Operation::Shipments,
        Operation::CreateShipment,
        Operation::ValidateAddress,
        Operation::CreateLabel,
        Operation::CreateManifest,
        Operation::CreateTracking,
        Operation::CancelOrDeleteLabel,
        Operation::CreateAddress,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Rates => "rates",
            Operation::Labels => "labels",
            Operation::Manifests => "manifests",
            Operation::Manifest => "manifest",
            Operation::Trackings => "trackings",
            Operation::TrackingStatus => "trackingStatus",
            Operation::Shipments => "shipments",
            Operation::CreateShipment => "createShipment",
            Operation::ValidateAddress => "validateAddress",
            Operation::CreateLabel => "createLabel",
            Operation::CreateManifest => "createManifest",
            Operation::CreateTracking => "createTracking",
            Operation::CancelOrDeleteLabel => "cancelOrDeleteLabel",
            Operation::CreateAddress => "createAddress",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ShippingError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == name)
            .ok_or_else(|| ShippingError::UnknownOperation(name.to_string()))
    }
}

//! Multi-carrier Shipping API Library
//!
//! This library normalizes shipping operations (rates, labels, manifests,
//! trackings, shipments, addresses) across DHL, Shippo and Postmen. Callers
//! send one canonical payload; the library validates it, maps it to the
//! carrier's wire format, calls the carrier and maps the answer back. Every
//! outcome comes back in the same `{data, warnings, errors}` envelope.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core domain logic.
//! - `integrations`: Carrier integrations.
//! - `carrier`: Carrier and operation identifiers.
//! - `carrier_client`: HTTP client for the carrier APIs.
//! - `config`: Configuration management.
//! - `dispatch`: Validate / format / call / format pipeline.
//! - `errors`: Error handling types.
//! - `formatters`: Per-carrier request and response mapping.
//! - `handlers`: HTTP request handlers.
//! - `models`: Canonical data model and result envelope.
//! - `units`: Country codes, mass units and timestamp formatting.
//! - `validator`: JSON-schema payload validation.

pub mod api;
pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and other binaries
pub mod carrier;
pub mod carrier_client;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod formatters;
pub mod handlers;
pub mod models;
pub mod units;
pub mod validator;

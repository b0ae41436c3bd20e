//! Utility to print the wire payload a canonical request maps to.
//!
//! Usage: `format_payload <carrier> <operation> [payload.json]`
//!
//! Reads the canonical payload from the file, or from stdin when no file is
//! given, and prints the carrier request as pretty JSON. Nothing is sent.

use std::env;
use std::io::Read;

use anyhow::Context;
use rust_shipping_api::carrier::{Carrier, Operation};
use rust_shipping_api::formatters::{self, RequestContext};
use rust_shipping_api::validator::{SchemaId, SchemaValidator, Validator};

/// Main entry point for the payload formatting utility.
fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let (carrier, operation) = match args.as_slice() {
        [carrier, operation, ..] => (carrier.parse::<Carrier>()?, operation.parse::<Operation>()?),
        _ => anyhow::bail!("usage: format_payload <carrier> <operation> [payload.json]"),
    };

    let raw = match args.get(2) {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let payload: serde_json::Value = serde_json::from_str(&raw).context("payload is not JSON")?;

    if !formatters::supports(carrier, operation) {
        anyhow::bail!("{} does not support {}", carrier, operation);
    }

    let errors = SchemaValidator::new()?.validate(SchemaId::for_operation(carrier, operation), &payload)?;
    if !errors.is_empty() {
        eprintln!("Payload failed validation:");
        for error in &errors {
            eprintln!("- {}: {} ({})", error.field, error.message, error.info);
        }
        std::process::exit(2);
    }

    let wire = formatters::format_request(carrier, operation, &payload, &RequestContext::now())?;
    println!("{}", serde_json::to_string_pretty(&wire)?);

    Ok(())
}

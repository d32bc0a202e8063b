//! # Dispense-check Subcommand
//!
//! `pharmstock dispense-check <inventory> --product CODE --batch NUMBER --level NAME <qty>`
//!
//! Runs the dispensing gate against one batch without changing anything.
//! Exits 0 when the dispense would be allowed and 2 when it is refused.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use rust_decimal::Decimal;

use pharmstock_core::{DispenseError, PharmaConfig, Precision, Timestamp};
use pharmstock_state::Prescription;
use pharmstock_stock::{unit_price_for, validate_request, DispenseDelta, DispenseRequest};

use crate::{level, load_inventory, parse_timestamp, resolve_now, Inventory, EXIT_REFUSED};

/// Arguments for the `pharmstock dispense-check` subcommand.
#[derive(Args, Debug)]
pub struct DispenseCheckArgs {
    /// Inventory file (.json, .yaml, .yml).
    pub inventory: PathBuf,

    /// Product code.
    #[arg(long)]
    pub product: String,

    /// Batch number.
    #[arg(long)]
    pub batch: String,

    /// Packaging level the quantity is expressed in.
    #[arg(long)]
    pub level: String,

    /// Quantity in `--level` units.
    pub quantity: Decimal,

    /// Evaluation instant (RFC 3339 or YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub now: Option<Timestamp>,

    /// Patient name for prescription-only products.
    #[arg(long)]
    pub patient: Option<String>,

    /// Prescription number.
    #[arg(long)]
    pub prescription_number: Option<String>,

    /// Prescriber name.
    #[arg(long)]
    pub prescriber: Option<String>,

    /// Prescriber licence number.
    #[arg(long)]
    pub prescriber_license: Option<String>,
}

impl DispenseCheckArgs {
    fn prescription(&self) -> Option<Prescription> {
        if self.patient.is_none() && self.prescription_number.is_none() && self.prescriber.is_none()
        {
            return None;
        }
        Some(Prescription {
            patient_name: self.patient.clone().unwrap_or_default(),
            prescription_number: self.prescription_number.clone().unwrap_or_default(),
            prescriber_name: self.prescriber.clone().unwrap_or_default(),
            prescriber_license: self.prescriber_license.clone(),
        })
    }
}

/// Outcome of a dispense check.
#[derive(Debug)]
pub enum CheckOutcome {
    Allowed {
        delta: DispenseDelta,
        unit_price: Decimal,
        total_price: Decimal,
    },
    Refused(DispenseError),
}

/// Execute the dispense-check subcommand.
pub fn run_dispense_check(args: &DispenseCheckArgs, config: &PharmaConfig) -> Result<u8> {
    let inventory = load_inventory(&args.inventory)?;
    match check(&inventory, args, config.precision())? {
        CheckOutcome::Allowed {
            delta, total_price, ..
        } => {
            println!(
                "OK: dispense {} {} ({} base units) from batch {}, total {}",
                delta.quantity.normalize(),
                args.level,
                delta.base_units.normalize(),
                delta.batch_number,
                total_price
            );
            Ok(0)
        }
        CheckOutcome::Refused(e) => {
            tracing::warn!(batch = %args.batch, "dispense refused: {e}");
            println!("REFUSED: {e}");
            Ok(EXIT_REFUSED)
        }
    }
}

/// Resolve the request against the inventory and run the gate.
///
/// Lookup failures (unknown product, batch, or level) are errors; a gate
/// refusal is a normal outcome.
pub fn check(
    inventory: &Inventory,
    args: &DispenseCheckArgs,
    precision: Precision,
) -> Result<CheckOutcome> {
    let product = inventory.product(&args.product)?;
    let batch = inventory.batch(product, &args.batch)?;
    let lvl = level(product, &args.level)?;
    let request = DispenseRequest {
        batch_id: batch.id,
        level_id: lvl.id,
        quantity: args.quantity,
        unit_price: None,
        prescription: args.prescription(),
    };
    let now = resolve_now(args.now);
    let delta = match validate_request(product, batch, &request, precision, now) {
        Ok(delta) => delta,
        Err(e) => return Ok(CheckOutcome::Refused(e)),
    };
    let unit_price = unit_price_for(lvl, &request);
    Ok(match unit_price.checked_mul(delta.quantity) {
        Some(total) => CheckOutcome::Allowed {
            delta,
            unit_price,
            total_price: total.normalize(),
        },
        None => CheckOutcome::Refused(DispenseError::InvalidQuantity {
            quantity: delta.quantity,
            reason: format!("total price at {unit_price} per unit overflows"),
        }),
    })
}

//! # Catalog Subcommand
//!
//! - `pharmstock catalog check <inventory>`: validate every product's
//!   packaging hierarchy, list levels with their conversion factors, report
//!   cost-per-base-unit mismatches, and flag batches that reference unknown
//!   products or levels.
//!
//! Products that fail validation are rejected while the file is loaded, so
//! a file that loads at all has structurally valid hierarchies.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use rust_decimal::Decimal;

use pharmstock_core::PharmaConfig;

use crate::{load_inventory, Inventory};

/// Arguments for the `pharmstock catalog` subcommand.
#[derive(Args, Debug)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommand,
}

/// Catalog subcommands.
#[derive(Subcommand, Debug)]
pub enum CatalogCommand {
    /// Validate products and report pricing warnings.
    Check {
        /// Inventory file (.json, .yaml, .yml).
        inventory: PathBuf,

        /// Cost-per-base-unit tolerance. Defaults to the configured value.
        #[arg(long)]
        tolerance: Option<Decimal>,
    },
}

/// Execute the catalog subcommand.
pub fn run_catalog(args: &CatalogArgs, config: &PharmaConfig) -> Result<u8> {
    match &args.command {
        CatalogCommand::Check {
            inventory,
            tolerance,
        } => {
            let inventory = load_inventory(inventory)?;
            let tolerance = tolerance.unwrap_or(config.cost_tolerance);
            let check = check_catalog(&inventory, tolerance);
            print!("{}", check.output);
            Ok(if check.errors == 0 { 0 } else { 1 })
        }
    }
}

/// Result of a catalog check.
pub struct CatalogCheck {
    pub output: String,
    pub warnings: usize,
    pub errors: usize,
}

/// Check products and batch references; render a report.
pub fn check_catalog(inventory: &Inventory, tolerance: Decimal) -> CatalogCheck {
    let mut out = String::new();
    let mut warnings = 0;
    let mut errors = 0;

    for product in &inventory.products {
        let base = product.packaging().base_level();
        let _ = writeln!(
            out,
            "OK: {} {} [{}] ({} levels, base unit: {})",
            product.product_code,
            product.display_name(),
            status_label(product),
            product.packaging().levels().len(),
            base.level_name
        );
        for level in product.packaging().levels() {
            let mut flags = Vec::new();
            if level.can_dispense {
                flags.push("dispense");
            }
            if level.can_purchase {
                flags.push("purchase");
            }
            let _ = writeln!(
                out,
                "  {:<12} = {} {}  [{}]",
                level.level_name,
                level.base_unit_quantity.normalize(),
                base.level_name,
                flags.join(", ")
            );
        }
        for warning in product.pricing_warnings(tolerance) {
            warnings += 1;
            let _ = writeln!(out, "  WARN: {warning}");
        }
    }

    for batch in &inventory.batches {
        match inventory.products.iter().find(|p| p.id == batch.product_id) {
            None => {
                errors += 1;
                let _ = writeln!(
                    out,
                    "ERROR: batch {} references unknown product {}",
                    batch.batch_number, batch.product_id
                );
            }
            Some(product) if product.level(batch.receipt_level).is_none() => {
                errors += 1;
                let _ = writeln!(
                    out,
                    "ERROR: batch {} references level {} not defined for {}",
                    batch.batch_number, batch.receipt_level, product.product_code
                );
            }
            Some(_) => {}
        }
    }

    let _ = writeln!(
        out,
        "{} products, {} batches, {warnings} warnings, {errors} errors",
        inventory.products.len(),
        inventory.batches.len()
    );
    CatalogCheck {
        output: out,
        warnings,
        errors,
    }
}

fn status_label(product: &pharmstock_catalog::DrugProduct) -> String {
    let mut label = serde_json::to_value(product.status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    if product.requires_prescription {
        label.push_str(", Rx");
    }
    if product.requires_cold_chain {
        label.push_str(", cold chain");
    }
    label
}

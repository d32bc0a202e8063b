//! # Convert Subcommand
//!
//! `pharmstock convert <inventory> --product PARA-500 --from strip [--to box] <qty>`
//!
//! Converts between two packaging levels of one product through base
//! units. Without `--to` the result is in base units. Conversions that are
//! not exact at the configured precision fail.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use rust_decimal::Decimal;

use pharmstock_catalog::{convert_between, to_base_units};
use pharmstock_core::PharmaConfig;

use crate::{level, load_inventory, Inventory};

/// Arguments for the `pharmstock convert` subcommand.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Inventory file (.json, .yaml, .yml).
    pub inventory: PathBuf,

    /// Product code.
    #[arg(long)]
    pub product: String,

    /// Level the quantity is expressed in.
    #[arg(long)]
    pub from: String,

    /// Target level. Defaults to the base unit.
    #[arg(long)]
    pub to: Option<String>,

    /// Quantity in `--from` units.
    pub quantity: Decimal,
}

/// Execute the convert subcommand.
pub fn run_convert(args: &ConvertArgs, config: &PharmaConfig) -> Result<u8> {
    let inventory = load_inventory(&args.inventory)?;
    println!("{}", convert(&inventory, args, config)?);
    Ok(0)
}

/// Perform the conversion and render it, e.g. `3 strip = 30 tablet`.
pub fn convert(inventory: &Inventory, args: &ConvertArgs, config: &PharmaConfig) -> Result<String> {
    let product = inventory.product(&args.product)?;
    let from = level(product, &args.from)?;
    let (to, result) = match &args.to {
        Some(name) => {
            let to = level(product, name)?;
            (to, convert_between(from, to, args.quantity, config.precision())?)
        }
        None => {
            let base = product.packaging().base_level();
            (base, to_base_units(from, args.quantity)?)
        }
    };
    Ok(format!(
        "{} {} = {} {}",
        args.quantity.normalize(),
        from.level_name,
        result.normalize(),
        to.level_name
    ))
}

//! # FEFO Subcommand
//!
//! `pharmstock fefo <inventory> --product CODE --level NAME <qty> [--now DATE] [--json]`
//!
//! Proposes which batches should cover a dispense, earliest expiry first.
//! Nothing is written back to the inventory file.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use rust_decimal::Decimal;

use pharmstock_core::{PharmaConfig, Timestamp};
use pharmstock_stock::{plan_fefo, DispenseDelta};

use crate::{level, load_inventory, parse_timestamp, resolve_now, Inventory};

/// Arguments for the `pharmstock fefo` subcommand.
#[derive(Args, Debug)]
pub struct FefoArgs {
    /// Inventory file (.json, .yaml, .yml).
    pub inventory: PathBuf,

    /// Product code.
    #[arg(long)]
    pub product: String,

    /// Packaging level the quantity is expressed in.
    #[arg(long)]
    pub level: String,

    /// Quantity in `--level` units.
    pub quantity: Decimal,

    /// Evaluation instant (RFC 3339 or YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub now: Option<Timestamp>,

    /// Emit JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Execute the fefo subcommand.
pub fn run_fefo(args: &FefoArgs, config: &PharmaConfig) -> Result<u8> {
    let inventory = load_inventory(&args.inventory)?;
    let plan = plan(&inventory, args, config)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", render_text(&inventory, args, &plan)?);
    }
    Ok(0)
}

/// Build the allocation plan.
pub fn plan(inventory: &Inventory, args: &FefoArgs, config: &PharmaConfig) -> Result<Vec<DispenseDelta>> {
    let product = inventory.product(&args.product)?;
    let lvl = level(product, &args.level)?;
    let now = resolve_now(args.now);
    Ok(plan_fefo(
        inventory.batches_of(product),
        lvl,
        args.quantity,
        config.precision(),
        now,
    )?)
}

/// Render a plan as text.
pub fn render_text(inventory: &Inventory, args: &FefoArgs, plan: &[DispenseDelta]) -> Result<String> {
    let product = inventory.product(&args.product)?;
    let base = &product.packaging().base_level().level_name;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "FEFO plan for {} {} of {}:",
        args.quantity.normalize(),
        args.level,
        product.product_code
    );
    for delta in plan {
        let expiry = inventory
            .batches
            .iter()
            .find(|b| b.id == delta.batch_id)
            .map(|b| b.expiry_date.date().to_string())
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  {:<12} expires {}  take {} {} ({} {})",
            delta.batch_number,
            expiry,
            delta.quantity.normalize(),
            args.level,
            delta.base_units.normalize(),
            base
        );
    }
    Ok(out)
}

//! # Expiry Subcommand
//!
//! `pharmstock expiry <inventory> [--now DATE] [--horizon DAYS] [--product CODE] [--json]`
//!
//! Classifies in-circulation batches into expired / critical / warning / ok
//! buckets and prints per-product alert counts.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use pharmstock_core::{PharmaConfig, Timestamp};
use pharmstock_state::Batch;
use pharmstock_stock::{
    classify_expiry, summarize_by_product, ExpiryBucket, ExpiryReport, ProductExpirySummary,
};

use crate::{load_inventory, parse_timestamp, resolve_now, Inventory};

/// Arguments for the `pharmstock expiry` subcommand.
#[derive(Args, Debug)]
pub struct ExpiryArgs {
    /// Inventory file (.json, .yaml, .yml).
    pub inventory: PathBuf,

    /// Evaluation instant (RFC 3339 or YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub now: Option<Timestamp>,

    /// Warning horizon in days. Defaults to the configured value.
    #[arg(long)]
    pub horizon: Option<u32>,

    /// Restrict the report to one product code.
    #[arg(long)]
    pub product: Option<String>,

    /// Emit JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Machine-readable expiry output.
#[derive(Debug, Serialize)]
pub struct ExpiryOutput {
    pub now: Timestamp,
    pub horizon_days: u32,
    pub report: ExpiryReport,
    pub products: Vec<ProductExpirySummary>,
}

/// Execute the expiry subcommand.
pub fn run_expiry(args: &ExpiryArgs, config: &PharmaConfig) -> Result<u8> {
    let inventory = load_inventory(&args.inventory)?;
    let output = build_output(&inventory, args, config)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", render_text(&inventory, &output));
    }
    Ok(0)
}

/// Classify the selected batches.
pub fn build_output(
    inventory: &Inventory,
    args: &ExpiryArgs,
    config: &PharmaConfig,
) -> Result<ExpiryOutput> {
    let now = resolve_now(args.now);
    let horizon_days = args.horizon.unwrap_or(config.expiry_horizon_days);
    let batches: Vec<&Batch> = match &args.product {
        Some(code) => inventory.batches_of(inventory.product(code)?).collect(),
        None => inventory.batches.iter().collect(),
    };
    Ok(ExpiryOutput {
        now,
        horizon_days,
        report: classify_expiry(batches.iter().copied(), now, horizon_days),
        products: summarize_by_product(batches.iter().copied(), now),
    })
}

/// Render the report as text.
pub fn render_text(inventory: &Inventory, output: &ExpiryOutput) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Expiry report at {} (horizon {} days)",
        output.now, output.horizon_days
    );
    for bucket in ExpiryBucket::ALL {
        let entries = output.report.bucket(bucket);
        let _ = writeln!(out, "{} ({})", bucket.as_str().to_uppercase(), entries.len());
        for e in entries {
            let code = inventory
                .products
                .iter()
                .find(|p| p.id == e.product_id)
                .map(|p| p.product_code.as_str())
                .unwrap_or("?");
            let _ = writeln!(
                out,
                "  {:<10} {:<12} {}  {:>5} days  {:>8} base units  {}",
                code,
                e.batch_number,
                e.expiry_date.date(),
                e.days_to_expiry,
                e.current_quantity.normalize(),
                e.status
            );
        }
    }
    for s in &output.products {
        let code = inventory
            .products
            .iter()
            .find(|p| p.id == s.product_id)
            .map(|p| p.product_code.clone())
            .unwrap_or_else(|| s.product_id.to_string());
        let _ = writeln!(
            out,
            "{code}: {} expired, {} within 30 days, {} within 90 days, {} base units on hand",
            s.expired,
            s.expiring_30_days,
            s.expiring_90_days,
            s.on_hand_base_units.normalize()
        );
    }
    out
}

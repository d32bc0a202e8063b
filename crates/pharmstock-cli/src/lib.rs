//! # pharmstock-cli — CLI Tool for pharmstock
//!
//! Provides the `pharmstock` command-line interface over inventory files.
//!
//! ## Subcommands
//!
//! - `pharmstock catalog check`: validate products and report pricing warnings.
//! - `pharmstock convert`: convert a quantity between packaging levels.
//! - `pharmstock expiry`: classify batches into expiry buckets.
//! - `pharmstock fefo`: propose a first-expiry-first-out allocation.
//! - `pharmstock dispense-check`: run the dispensing gate for one batch.
//!
//! ## Inventory Files
//!
//! JSON or YAML (chosen by extension) with `products` and `batches` lists:
//!
//! ```yaml
//! products:
//!   - product_code: PARA-500
//!     generic_name: Paracetamol
//!     ...
//!     packaging_levels: [...]
//! batches:
//!   - drug_product: <product id>
//!     batch_number: B-2024-001
//!     ...
//! ```

pub mod catalog;
pub mod convert;
pub mod dispense;
pub mod expiry;
pub mod fefo;

use std::collections::HashSet;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use pharmstock_catalog::{DrugProduct, PackagingLevel};
use pharmstock_core::{BatchNumber, Clock, SystemClock, Timestamp, ValidationError};
use pharmstock_state::Batch;

/// Exit code for a request the gate refused.
pub const EXIT_REFUSED: u8 = 2;

/// Products and batches loaded from an inventory file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Inventory {
    #[serde(default)]
    pub products: Vec<DrugProduct>,
    #[serde(default)]
    pub batches: Vec<Batch>,
}

impl Inventory {
    /// Find a product by product code, case-insensitively.
    pub fn product(&self, code: &str) -> Result<&DrugProduct> {
        self.products
            .iter()
            .find(|p| p.product_code.eq_ignore_ascii_case(code.trim()))
            .ok_or_else(|| anyhow!("product {code} not found in inventory"))
    }

    /// Product code for display, falling back to the identifier.
    pub fn product_code(&self, batch: &Batch) -> String {
        self.products
            .iter()
            .find(|p| p.id == batch.product_id)
            .map(|p| p.product_code.clone())
            .unwrap_or_else(|| batch.product_id.to_string())
    }

    /// Batches of one product.
    pub fn batches_of<'a>(&'a self, product: &'a DrugProduct) -> impl Iterator<Item = &'a Batch> {
        self.batches.iter().filter(move |b| b.product_id == product.id)
    }

    /// Check the constraints that span records.
    ///
    /// Batch ids are unique, batch numbers are unique per product, and a
    /// batch's receipt level belongs to its product. Batches of products
    /// missing from the file are left to `catalog check`.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        let mut ids = HashSet::new();
        let mut numbers = HashSet::new();
        for batch in &self.batches {
            if !ids.insert(batch.id) {
                return Err(ValidationError::Duplicate {
                    field: "id",
                    value: batch.id.to_string(),
                });
            }
            if !numbers.insert((batch.product_id, &batch.batch_number)) {
                return Err(ValidationError::Duplicate {
                    field: "batch_number",
                    value: batch.batch_number.to_string(),
                });
            }
            let product = self.products.iter().find(|p| p.id == batch.product_id);
            if let Some(product) = product {
                if product.level(batch.receipt_level).is_none() {
                    return Err(ValidationError::ForeignReference {
                        what: "packaging level",
                        id: batch.receipt_level.to_string(),
                        product: product.id.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Find a product's batch by batch number.
    pub fn batch<'a>(&'a self, product: &'a DrugProduct, number: &str) -> Result<&'a Batch> {
        let number = BatchNumber::new(number)?;
        self.batches_of(product)
            .find(|b| b.batch_number == number)
            .ok_or_else(|| anyhow!("batch {number} of {} not found", product.product_code))
    }
}

/// Look up a packaging level by name.
pub fn level<'a>(product: &'a DrugProduct, name: &str) -> Result<&'a PackagingLevel> {
    product.level_by_name(name).ok_or_else(|| {
        let known: Vec<_> = product
            .packaging()
            .levels()
            .iter()
            .map(|l| l.level_name.as_str())
            .collect();
        anyhow!(
            "{} has no packaging level {name:?} (levels: {})",
            product.product_code,
            known.join(", ")
        )
    })
}

/// Load a JSON or YAML document, chosen by file extension.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let value = match ext.as_deref() {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse YAML {}", path.display()))?,
        Some("json") => serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse JSON {}", path.display()))?,
        other => bail!(
            "unsupported file type {:?} for {}; expected .json, .yaml, or .yml",
            other.unwrap_or(""),
            path.display()
        ),
    };
    tracing::debug!(path = %path.display(), "loaded document");
    Ok(value)
}

/// Load an inventory file and check its cross-record constraints.
pub fn load_inventory(path: &Path) -> Result<Inventory> {
    let inventory: Inventory = load_document(path)?;
    inventory
        .validate()
        .with_context(|| format!("invalid inventory {}", path.display()))?;
    tracing::info!(
        products = inventory.products.len(),
        batches = inventory.batches.len(),
        "inventory loaded"
    );
    Ok(inventory)
}

/// Parser for `--now` arguments.
pub fn parse_timestamp(raw: &str) -> std::result::Result<Timestamp, String> {
    Timestamp::parse(raw).map_err(|e| e.to_string())
}

/// The evaluation instant: `--now` if given, else the system clock.
pub fn resolve_now(now: Option<Timestamp>) -> Timestamp {
    now.unwrap_or_else(|| SystemClock.now())
}

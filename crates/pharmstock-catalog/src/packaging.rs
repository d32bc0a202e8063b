//! # Packaging Hierarchy Model
//!
//! A drug product is stocked in nested packaging levels (carton → box →
//! strip → tablet). Each level states how many base units one of its units
//! contains. The level with the smallest `level_order` is the base unit and
//! has a factor of exactly 1.
//!
//! ## Conversion Rules
//!
//! ```text
//! to_base_units(level, q)   = q × level.base_unit_quantity
//! from_base_units(level, b) = b ÷ level.base_unit_quantity   (must be exact)
//! ```
//!
//! The inverse conversion fails with [`ConversionError::NotExact`] when the
//! quotient has digits beyond the configured [`Precision`]. Seven tablets
//! are not 0.7 strips of ten unless the caller accepts one fractional
//! digit, and 10 tablets are never 3.333… strips of three.
//!
//! ## Pricing Consistency
//!
//! Cost per base unit should agree across levels. Suppliers may price pack
//! sizes differently, so a disagreement beyond tolerance is reported as a
//! [`PricingWarning`], never as an error.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pharmstock_core::{ConversionError, LevelId, Precision, ProductId, ValidationError};

// ─── Unit of Measure ─────────────────────────────────────────────────

/// Unit in which a packaging level is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOfMeasure {
    Unit,
    Tablet,
    Capsule,
    Ml,
    Gm,
    Strip,
    Bottle,
    Vial,
    Ampoule,
    Box,
    Carton,
    Pallet,
}

impl UnitOfMeasure {
    /// Wire name of the unit.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Tablet => "tablet",
            Self::Capsule => "capsule",
            Self::Ml => "ml",
            Self::Gm => "gm",
            Self::Strip => "strip",
            Self::Bottle => "bottle",
            Self::Vial => "vial",
            Self::Ampoule => "ampoule",
            Self::Box => "box",
            Self::Carton => "carton",
            Self::Pallet => "pallet",
        }
    }
}

impl std::fmt::Display for UnitOfMeasure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Packaging Level ─────────────────────────────────────────────────

/// Creation payload for a packaging level, before it is attached to a
/// product. Also the nested wire form inside a product record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPackagingLevel {
    /// Existing identifier, if the level was persisted before.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<LevelId>,
    pub level_name: String,
    pub level_order: u32,
    pub base_unit_quantity: Decimal,
    pub unit_of_measure: UnitOfMeasure,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packaging_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gtin: Option<String>,
    #[serde(default)]
    pub cost_price: Decimal,
    #[serde(default)]
    pub selling_price: Decimal,
    #[serde(default)]
    pub can_dispense: bool,
    #[serde(default)]
    pub can_purchase: bool,
}

/// A named unit of sale or storage with its conversion factor to base units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackagingLevel {
    pub id: LevelId,
    /// Owning product.
    #[serde(rename = "drug_product")]
    pub product_id: ProductId,
    pub level_name: String,
    /// Position in the hierarchy; the smallest order is the base unit.
    pub level_order: u32,
    /// How many base units one unit of this level contains.
    pub base_unit_quantity: Decimal,
    pub unit_of_measure: UnitOfMeasure,
    pub packaging_description: Option<String>,
    pub barcode: Option<String>,
    pub gtin: Option<String>,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub can_dispense: bool,
    pub can_purchase: bool,
}

impl PackagingLevel {
    /// Attach a creation payload to its owning product.
    pub fn from_new(product_id: ProductId, new: NewPackagingLevel) -> Self {
        Self {
            id: new.id.unwrap_or_default(),
            product_id,
            level_name: new.level_name,
            level_order: new.level_order,
            base_unit_quantity: new.base_unit_quantity,
            unit_of_measure: new.unit_of_measure,
            packaging_description: new.packaging_description,
            barcode: new.barcode,
            gtin: new.gtin,
            cost_price: new.cost_price,
            selling_price: new.selling_price,
            can_dispense: new.can_dispense,
            can_purchase: new.can_purchase,
        }
    }

    /// Strip the owning product, producing the nested wire form.
    pub fn to_new(&self) -> NewPackagingLevel {
        NewPackagingLevel {
            id: Some(self.id),
            level_name: self.level_name.clone(),
            level_order: self.level_order,
            base_unit_quantity: self.base_unit_quantity,
            unit_of_measure: self.unit_of_measure,
            packaging_description: self.packaging_description.clone(),
            barcode: self.barcode.clone(),
            gtin: self.gtin.clone(),
            cost_price: self.cost_price,
            selling_price: self.selling_price,
            can_dispense: self.can_dispense,
            can_purchase: self.can_purchase,
        }
    }

    /// Purchase cost of one base unit when bought at this level.
    pub fn cost_per_base_unit(&self) -> Result<Decimal, ConversionError> {
        per_base_unit(self, self.cost_price)
    }

    /// Selling price of one base unit when sold at this level.
    pub fn selling_price_per_base_unit(&self) -> Result<Decimal, ConversionError> {
        per_base_unit(self, self.selling_price)
    }

    /// Gross margin per unit of this level.
    pub fn margin(&self) -> Decimal {
        self.selling_price - self.cost_price
    }

    /// Gross margin as a percentage of the selling price, `None` when the
    /// level has no selling price.
    pub fn margin_percent(&self) -> Option<Decimal> {
        if self.selling_price.is_zero() {
            return None;
        }
        self.margin()
            .checked_mul(Decimal::ONE_HUNDRED)?
            .checked_div(self.selling_price)
    }

    fn checked_factor(&self) -> Result<Decimal, ConversionError> {
        if self.base_unit_quantity <= Decimal::ZERO {
            return Err(ConversionError::InvalidFactor {
                level: self.level_name.clone(),
                factor: self.base_unit_quantity,
            });
        }
        Ok(self.base_unit_quantity)
    }
}

fn per_base_unit(level: &PackagingLevel, amount: Decimal) -> Result<Decimal, ConversionError> {
    let factor = level.checked_factor()?;
    amount
        .checked_div(factor)
        .ok_or_else(|| ConversionError::Overflow {
            quantity: amount,
            level: level.level_name.clone(),
        })
}

// ─── Conversions ─────────────────────────────────────────────────────

/// Convert a quantity in `level` units to base units.
///
/// # Errors
///
/// - [`ConversionError::NegativeQuantity`] for `qty < 0`.
/// - [`ConversionError::InvalidFactor`] if the level's factor is not positive.
/// - [`ConversionError::Overflow`] if the product does not fit a `Decimal`.
pub fn to_base_units(level: &PackagingLevel, qty: Decimal) -> Result<Decimal, ConversionError> {
    let factor = level.checked_factor()?;
    if qty.is_sign_negative() && !qty.is_zero() {
        return Err(ConversionError::NegativeQuantity(qty));
    }
    qty.checked_mul(factor)
        .map(|v| v.normalize())
        .ok_or_else(|| ConversionError::Overflow {
            quantity: qty,
            level: level.level_name.clone(),
        })
}

/// Convert a base-unit quantity to `level` units.
///
/// # Errors
///
/// - [`ConversionError::NotExact`] if the quotient needs more than
///   `precision` fractional digits, or more significant digits than a
///   `Decimal` holds.
/// - [`ConversionError::NegativeQuantity`], [`ConversionError::InvalidFactor`],
///   [`ConversionError::Overflow`] as for [`to_base_units`].
pub fn from_base_units(
    level: &PackagingLevel,
    base_qty: Decimal,
    precision: Precision,
) -> Result<Decimal, ConversionError> {
    let factor = level.checked_factor()?;
    if base_qty.is_sign_negative() && !base_qty.is_zero() {
        return Err(ConversionError::NegativeQuantity(base_qty));
    }
    let result = base_qty
        .checked_div(factor)
        .ok_or_else(|| ConversionError::Overflow {
            quantity: base_qty,
            level: level.level_name.clone(),
        })?;
    // Division rounds once the quotient reaches the decimal's digit limit;
    // an exact quotient multiplies back to the input.
    if !precision.is_exact(result) || result.checked_mul(factor) != Some(base_qty) {
        return Err(ConversionError::NotExact {
            base_units: base_qty,
            level: level.level_name.clone(),
            result,
            precision: precision.digits(),
        });
    }
    Ok(result.normalize())
}

/// Convert a quantity between two levels of the same product.
pub fn convert_between(
    from: &PackagingLevel,
    to: &PackagingLevel,
    qty: Decimal,
    precision: Precision,
) -> Result<Decimal, ConversionError> {
    if from.product_id != to.product_id {
        return Err(ConversionError::ProductMismatch {
            from: from.level_name.clone(),
            to: to.level_name.clone(),
        });
    }
    let base = to_base_units(from, qty)?;
    from_base_units(to, base, precision)
}

// ─── Hierarchy ───────────────────────────────────────────────────────

/// Cost-per-base-unit disagreement between a level and the base level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingWarning {
    pub level_id: LevelId,
    pub level_name: String,
    pub cost_per_base_unit: Decimal,
    pub base_cost_per_base_unit: Decimal,
    /// Absolute difference between the two.
    pub difference: Decimal,
}

impl std::fmt::Display for PricingWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "level {} costs {} per base unit, base level costs {} (difference {})",
            self.level_name, self.cost_per_base_unit, self.base_cost_per_base_unit, self.difference
        )
    }
}

/// The validated, ordered packaging levels of one product.
#[derive(Debug, Clone, PartialEq)]
pub struct PackagingHierarchy {
    product_id: ProductId,
    levels: Vec<PackagingLevel>,
}

impl PackagingHierarchy {
    /// Validate and order a product's levels.
    ///
    /// # Errors
    ///
    /// [`ValidationError`] if the list is empty, a level belongs to another
    /// product, a factor is not positive, `level_order` or `level_name`
    /// repeats, the base level's factor is not 1, or no level can be
    /// dispensed.
    pub fn new(
        product_id: ProductId,
        mut levels: Vec<PackagingLevel>,
    ) -> Result<Self, ValidationError> {
        if levels.is_empty() {
            return Err(ValidationError::MissingField {
                field: "packaging_levels",
            });
        }

        let mut orders = HashSet::new();
        let mut names = HashSet::new();
        for level in &levels {
            if level.product_id != product_id {
                return Err(ValidationError::ForeignReference {
                    what: "packaging level",
                    id: level.id.to_string(),
                    product: product_id.to_string(),
                });
            }
            if level.level_name.trim().is_empty() {
                return Err(ValidationError::MissingField {
                    field: "level_name",
                });
            }
            if level.base_unit_quantity <= Decimal::ZERO {
                return Err(ValidationError::NonPositiveQuantity {
                    field: "base_unit_quantity",
                    value: level.base_unit_quantity,
                });
            }
            if !orders.insert(level.level_order) {
                return Err(ValidationError::Duplicate {
                    field: "level_order",
                    value: level.level_order.to_string(),
                });
            }
            if !names.insert(level.level_name.trim().to_lowercase()) {
                return Err(ValidationError::Duplicate {
                    field: "level_name",
                    value: level.level_name.clone(),
                });
            }
        }

        levels.sort_by_key(|l| l.level_order);

        let base = &levels[0];
        if base.base_unit_quantity != Decimal::ONE {
            return Err(ValidationError::InvalidField {
                field: "base_unit_quantity",
                reason: format!(
                    "base level {} must contain exactly 1 base unit, found {}",
                    base.level_name, base.base_unit_quantity
                ),
            });
        }

        if !levels.iter().any(|l| l.can_dispense) {
            return Err(ValidationError::InvalidField {
                field: "can_dispense",
                reason: "at least one packaging level must be dispensable".to_string(),
            });
        }

        Ok(Self { product_id, levels })
    }

    /// Owning product.
    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    /// All levels, ordered by `level_order`.
    pub fn levels(&self) -> &[PackagingLevel] {
        &self.levels
    }

    /// The base-unit level.
    pub fn base_level(&self) -> &PackagingLevel {
        &self.levels[0]
    }

    /// Look up a level by identifier.
    pub fn level(&self, id: LevelId) -> Option<&PackagingLevel> {
        self.levels.iter().find(|l| l.id == id)
    }

    /// Look up a level by name, case-insensitively.
    pub fn level_by_name(&self, name: &str) -> Option<&PackagingLevel> {
        let name = name.trim();
        self.levels
            .iter()
            .find(|l| l.level_name.trim().eq_ignore_ascii_case(name))
    }

    /// Levels that may be dispensed.
    pub fn dispensable(&self) -> impl Iterator<Item = &PackagingLevel> {
        self.levels.iter().filter(|l| l.can_dispense)
    }

    /// Levels that may be purchased.
    pub fn purchasable(&self) -> impl Iterator<Item = &PackagingLevel> {
        self.levels.iter().filter(|l| l.can_purchase)
    }

    /// Compare every level's cost per base unit against the base level.
    ///
    /// Levels without a cost price are skipped. Each mismatch beyond
    /// `tolerance` is logged at `warn` and returned.
    pub fn pricing_warnings(&self, tolerance: Decimal) -> Vec<PricingWarning> {
        let base = self.base_level();
        if base.cost_price.is_zero() {
            return Vec::new();
        }
        // Base factor is validated to be 1, so its cost is already per base unit.
        let reference = base.cost_price;

        let mut warnings = Vec::new();
        for level in self.levels.iter().skip(1) {
            if level.cost_price.is_zero() {
                continue;
            }
            let Ok(per_unit) = level.cost_per_base_unit() else {
                continue;
            };
            let difference = (per_unit - reference).abs();
            if difference > tolerance {
                tracing::warn!(
                    product = %self.product_id,
                    level = %level.level_name,
                    %per_unit,
                    %reference,
                    %difference,
                    "cost per base unit differs from base level"
                );
                warnings.push(PricingWarning {
                    level_id: level.id,
                    level_name: level.level_name.clone(),
                    cost_per_base_unit: per_unit,
                    base_cost_per_base_unit: reference,
                    difference,
                });
            }
        }
        warnings
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

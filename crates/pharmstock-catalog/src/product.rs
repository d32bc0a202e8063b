//! # Drug Products
//!
//! A `DrugProduct` carries identity, regulatory attributes, storage
//! requirements, and owns its [`PackagingHierarchy`]. Products are
//! constructed through [`NewDrugProduct`], which is also the wire form:
//! packaging levels are nested without repeating the product id.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pharmstock_core::{LevelId, ProductId, ValidationError};

use crate::packaging::{NewPackagingLevel, PackagingHierarchy, PackagingLevel, PricingWarning};

// ─── Enumerations ────────────────────────────────────────────────────

/// Pharmaceutical dosage form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DosageForm {
    Tablet,
    Capsule,
    Syrup,
    Suspension,
    Injection,
    Cream,
    Ointment,
    Drops,
    Inhaler,
    Powder,
    Solution,
    Other,
}

/// Route by which the product is administered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteOfAdministration {
    Oral,
    Topical,
    Intravenous,
    Intramuscular,
    Subcutaneous,
    Inhalation,
    Rectal,
    Ophthalmic,
    Otic,
    Nasal,
    Transdermal,
}

/// Required storage condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageCondition {
    /// 15–25 °C.
    RoomTemp,
    /// 8–15 °C.
    Cool,
    /// 2–8 °C.
    Refrigerated,
    /// Below 0 °C.
    Frozen,
    /// 20–25 °C with excursions permitted.
    ControlledRoom,
}

impl StorageCondition {
    /// Whether the condition needs an unbroken cold chain.
    pub fn is_cold(&self) -> bool {
        matches!(self, Self::Refrigerated | Self::Frozen)
    }
}

/// Catalog status of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Active,
    Discontinued,
    Recalled,
    PendingApproval,
}

// ─── Product ─────────────────────────────────────────────────────────

/// Creation payload and wire form of a drug product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDrugProduct {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ProductId>,
    pub product_code: String,
    pub generic_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<String>,
    pub dosage_form: DosageForm,
    pub strength: String,
    pub route_of_administration: RouteOfAdministration,
    #[serde(default)]
    pub therapeutic_class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing_authorization_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    pub storage_conditions: StorageCondition,
    #[serde(default)]
    pub requires_cold_chain: bool,
    #[serde(default)]
    pub requires_prescription: bool,
    #[serde(default)]
    pub is_controlled_substance: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controlled_substance_schedule: Option<String>,
    #[serde(default)]
    pub status: ProductStatus,
    pub packaging_levels: Vec<NewPackagingLevel>,
}

/// A drug product with its validated packaging hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NewDrugProduct", into = "NewDrugProduct")]
pub struct DrugProduct {
    pub id: ProductId,
    pub product_code: String,
    pub generic_name: String,
    pub brand_name: Option<String>,
    pub dosage_form: DosageForm,
    pub strength: String,
    pub route_of_administration: RouteOfAdministration,
    pub therapeutic_class: String,
    pub marketing_authorization_number: Option<String>,
    pub manufacturer: Option<String>,
    pub storage_condition: StorageCondition,
    pub requires_cold_chain: bool,
    pub requires_prescription: bool,
    pub is_controlled_substance: bool,
    pub controlled_substance_schedule: Option<String>,
    pub status: ProductStatus,
    packaging: PackagingHierarchy,
}

impl DrugProduct {
    /// Validate a creation payload.
    ///
    /// # Errors
    ///
    /// [`ValidationError`] if identity fields are blank, a controlled
    /// substance lacks its schedule, or the packaging hierarchy is invalid.
    pub fn new(new: NewDrugProduct) -> Result<Self, ValidationError> {
        require_text("product_code", &new.product_code)?;
        require_text("generic_name", &new.generic_name)?;
        require_text("strength", &new.strength)?;
        if new.is_controlled_substance
            && new
                .controlled_substance_schedule
                .as_deref()
                .map_or(true, |s| s.trim().is_empty())
        {
            return Err(ValidationError::MissingField {
                field: "controlled_substance_schedule",
            });
        }

        let id = new.id.unwrap_or_default();
        let levels = new
            .packaging_levels
            .into_iter()
            .map(|l| PackagingLevel::from_new(id, l))
            .collect();
        let packaging = PackagingHierarchy::new(id, levels)?;

        Ok(Self {
            id,
            product_code: new.product_code.trim().to_string(),
            generic_name: new.generic_name.trim().to_string(),
            brand_name: new.brand_name,
            dosage_form: new.dosage_form,
            strength: new.strength.trim().to_string(),
            route_of_administration: new.route_of_administration,
            therapeutic_class: new.therapeutic_class,
            marketing_authorization_number: new.marketing_authorization_number,
            manufacturer: new.manufacturer,
            // Cold storage implies a cold chain even if the flag was left unset.
            requires_cold_chain: new.requires_cold_chain || new.storage_conditions.is_cold(),
            storage_condition: new.storage_conditions,
            requires_prescription: new.requires_prescription || new.is_controlled_substance,
            is_controlled_substance: new.is_controlled_substance,
            controlled_substance_schedule: new.controlled_substance_schedule,
            status: new.status,
            packaging,
        })
    }

    /// The product's packaging hierarchy.
    pub fn packaging(&self) -> &PackagingHierarchy {
        &self.packaging
    }

    /// Look up one of this product's levels.
    pub fn level(&self, id: LevelId) -> Option<&PackagingLevel> {
        self.packaging.level(id)
    }

    /// Look up one of this product's levels by name.
    pub fn level_by_name(&self, name: &str) -> Option<&PackagingLevel> {
        self.packaging.level_by_name(name)
    }

    /// Display name, e.g. `Amoxicillin (Amoxil) 500mg`.
    pub fn display_name(&self) -> String {
        match &self.brand_name {
            Some(brand) if !brand.trim().is_empty() => {
                format!("{} ({}) {}", self.generic_name, brand.trim(), self.strength)
            }
            _ => format!("{} {}", self.generic_name, self.strength),
        }
    }

    /// Whether new stock of this product may be received.
    pub fn accepts_receipts(&self) -> bool {
        matches!(self.status, ProductStatus::Active | ProductStatus::PendingApproval)
    }

    /// Pricing consistency warnings across packaging levels.
    pub fn pricing_warnings(&self, tolerance: Decimal) -> Vec<PricingWarning> {
        self.packaging.pricing_warnings(tolerance)
    }
}

impl TryFrom<NewDrugProduct> for DrugProduct {
    type Error = ValidationError;

    fn try_from(value: NewDrugProduct) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DrugProduct> for NewDrugProduct {
    fn from(p: DrugProduct) -> Self {
        Self {
            id: Some(p.id),
            packaging_levels: p.packaging.levels().iter().map(PackagingLevel::to_new).collect(),
            product_code: p.product_code,
            generic_name: p.generic_name,
            brand_name: p.brand_name,
            dosage_form: p.dosage_form,
            strength: p.strength,
            route_of_administration: p.route_of_administration,
            therapeutic_class: p.therapeutic_class,
            marketing_authorization_number: p.marketing_authorization_number,
            manufacturer: p.manufacturer,
            storage_conditions: p.storage_condition,
            requires_cold_chain: p.requires_cold_chain,
            requires_prescription: p.requires_prescription,
            is_controlled_substance: p.is_controlled_substance,
            controlled_substance_schedule: p.controlled_substance_schedule,
            status: p.status,
        }
    }
}

fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    Ok(())
}

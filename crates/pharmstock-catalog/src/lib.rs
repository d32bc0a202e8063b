//! # pharmstock-catalog — Drug Products and Packaging
//!
//! Owns the product side of the model: a [`DrugProduct`] and the ordered
//! [`PackagingHierarchy`] of levels it is stocked in.
//!
//! The conversion functions [`to_base_units`] and [`from_base_units`] are
//! the only way quantities move between packaging levels elsewhere in the
//! workspace. Base units are the canonical stock unit: batches, dispense
//! deltas, and expiry summaries all count in them.

pub mod packaging;
pub mod product;

pub use packaging::{
    convert_between, from_base_units, to_base_units, NewPackagingLevel, PackagingHierarchy,
    PackagingLevel, PricingWarning, UnitOfMeasure,
};
pub use product::{
    DosageForm, DrugProduct, NewDrugProduct, ProductStatus, RouteOfAdministration,
    StorageCondition,
};

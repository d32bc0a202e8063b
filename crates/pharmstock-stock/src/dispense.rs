//! # Dispensing Gate
//!
//! [`validate_dispense`] decides whether a quantity of one packaging level
//! may leave one batch at `now`, and if so how many base units that is. It
//! never mutates: the returned [`DispenseDelta`] is committed separately by
//! [`Batch::commit_dispense`], which evaluates the guard again.
//!
//! [`validate_request`] wraps the gate with the product-level checks of a
//! dispense request: the level is looked up on the product and a
//! prescription-only product must carry complete prescription details.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pharmstock_catalog::{to_base_units, DrugProduct, PackagingLevel};
use pharmstock_core::{BatchId, DispenseError, LevelId, Precision, Timestamp};
use pharmstock_state::{Batch, BatchStatus, DispenseDelta, Prescription};

/// A request to dispense from a specific batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispenseRequest {
    #[serde(rename = "batch")]
    pub batch_id: BatchId,
    #[serde(rename = "packaging_level")]
    pub level_id: LevelId,
    /// Quantity in `level_id` units.
    pub quantity: Decimal,
    /// Overrides the level's selling price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prescription: Option<Prescription>,
}

/// Check that `qty` units of `level` may be dispensed from `batch` at `now`.
///
/// # Errors
///
/// - [`DispenseError::LevelMismatch`] if `level` belongs to another product.
/// - [`DispenseError::LevelNotDispensable`] if `level.can_dispense` is false.
/// - [`DispenseError::BatchNotApproved`] unless the effective status is
///   approved (an approved batch past its expiry reads as expired).
/// - [`DispenseError::InvalidQuantity`] if `qty <= 0`, cannot be converted,
///   or either `qty` or its base-unit equivalent has more fractional digits
///   than `precision`.
/// - [`DispenseError::InsufficientStock`] if the batch holds fewer base
///   units than requested.
pub fn validate_dispense(
    batch: &Batch,
    level: &PackagingLevel,
    qty: Decimal,
    precision: Precision,
    now: Timestamp,
) -> Result<DispenseDelta, DispenseError> {
    if level.product_id != batch.product_id {
        return Err(DispenseError::LevelMismatch {
            level: level.level_name.clone(),
            batch: batch.batch_number.to_string(),
        });
    }
    if !level.can_dispense {
        return Err(DispenseError::LevelNotDispensable {
            level: level.level_name.clone(),
        });
    }

    let status = batch.effective_status(now);
    if status != BatchStatus::Approved {
        return Err(DispenseError::BatchNotApproved {
            batch: batch.batch_number.to_string(),
            status: status.to_string(),
        });
    }

    if qty <= Decimal::ZERO {
        return Err(DispenseError::InvalidQuantity {
            quantity: qty,
            reason: "must be greater than zero".to_string(),
        });
    }
    let base_units = to_base_units(level, qty).map_err(|e| DispenseError::InvalidQuantity {
        quantity: qty,
        reason: e.to_string(),
    })?;
    if !precision.is_exact(qty) || !precision.is_exact(base_units) {
        return Err(DispenseError::InvalidQuantity {
            quantity: qty,
            reason: format!("finer than {precision} ({base_units} base units)"),
        });
    }

    if batch.current_quantity() < base_units {
        return Err(DispenseError::InsufficientStock {
            batch: batch.batch_number.to_string(),
            requested: base_units,
            available: batch.current_quantity(),
        });
    }

    Ok(DispenseDelta {
        batch_id: batch.id,
        batch_number: batch.batch_number.clone(),
        level_id: level.id,
        quantity: qty,
        base_units,
    })
}

/// Validate a full dispense request against its product and batch.
///
/// `request.batch_id` is not consulted here; the caller has already used
/// it to select `batch`.
pub fn validate_request(
    product: &DrugProduct,
    batch: &Batch,
    request: &DispenseRequest,
    precision: Precision,
    now: Timestamp,
) -> Result<DispenseDelta, DispenseError> {
    let level = product
        .level(request.level_id)
        .ok_or_else(|| DispenseError::LevelMismatch {
            level: request.level_id.to_string(),
            batch: batch.batch_number.to_string(),
        })?;

    if product.requires_prescription
        && !request
            .prescription
            .as_ref()
            .is_some_and(Prescription::is_complete)
    {
        return Err(DispenseError::PrescriptionRequired {
            product: product.product_code.clone(),
        });
    }

    validate_dispense(batch, level, request.quantity, precision, now)
}

/// Price of one `level` unit for a request: the override, else the level's
/// selling price.
pub fn unit_price_for(level: &PackagingLevel, request: &DispenseRequest) -> Decimal {
    request.unit_price.unwrap_or(level.selling_price)
}

//! # Dispensing Records
//!
//! A [`DispenseDelta`] is the output of validating a dispense request: the
//! number of base units to subtract from one batch. It is a proposal only.
//! [`Batch::commit_dispense`](crate::Batch::commit_dispense) re-checks it
//! against the batch at commit time and, on success, produces the immutable
//! [`DispensingRecord`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pharmstock_core::{BatchId, BatchNumber, DispenseError, DispensingId, LevelId, Timestamp};

/// Validated quantity to remove from a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenseDelta {
    pub batch_id: BatchId,
    pub batch_number: BatchNumber,
    /// Level the request was expressed in.
    pub level_id: LevelId,
    /// Requested quantity in `level_id` units.
    pub quantity: Decimal,
    /// Equivalent quantity in base units.
    pub base_units: Decimal,
}

/// Prescription details attached to a dispense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub patient_name: String,
    pub prescription_number: String,
    pub prescriber_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prescriber_license: Option<String>,
}

impl Prescription {
    /// Patient, prescription number, and prescriber are all present.
    pub fn is_complete(&self) -> bool {
        [&self.patient_name, &self.prescription_number, &self.prescriber_name]
            .iter()
            .all(|s| !s.trim().is_empty())
    }
}

/// An immutable record of stock leaving a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispensingRecord {
    pub id: DispensingId,
    #[serde(rename = "batch")]
    pub batch_id: BatchId,
    pub batch_number: BatchNumber,
    #[serde(rename = "packaging_level")]
    pub level_id: LevelId,
    /// Quantity in `level_id` units.
    pub quantity: Decimal,
    pub base_units: Decimal,
    pub dispensed_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prescription: Option<Prescription>,
    /// Price of one `level_id` unit.
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

impl DispensingRecord {
    /// Fails with [`DispenseError::InvalidQuantity`] if the total price is
    /// outside the decimal range.
    pub(crate) fn new(
        delta: &DispenseDelta,
        unit_price: Decimal,
        prescription: Option<Prescription>,
        at: Timestamp,
    ) -> Result<Self, DispenseError> {
        let total_price = unit_price
            .checked_mul(delta.quantity)
            .ok_or_else(|| DispenseError::InvalidQuantity {
                quantity: delta.quantity,
                reason: format!("total price at {unit_price} per unit overflows"),
            })?;
        Ok(Self {
            id: DispensingId::new(),
            batch_id: delta.batch_id,
            batch_number: delta.batch_number.clone(),
            level_id: delta.level_id,
            quantity: delta.quantity,
            base_units: delta.base_units,
            dispensed_at: at,
            prescription,
            unit_price,
            total_price: total_price.normalize(),
        })
    }
}

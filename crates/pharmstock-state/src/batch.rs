//! # Batch Record and Lifecycle State Machine
//!
//! A batch is one manufacturer lot of a product received into a warehouse.
//! It is created in quarantine and moves through quality control.
//!
//! ## States
//!
//! ```text
//! Quarantine ──▶ Approved ──▶ Recalled (terminal)
//!     │    │                      ▲
//!     │    └──────────────────────┘
//!     └──▶ Rejected (terminal)
//! ```
//!
//! `Expired` is never stored. It is the effective status of any quarantined
//! or approved batch whose `expiry_date <= now`, derived at read time by
//! [`Batch::effective_status`]. A batch therefore becomes expired without
//! anyone writing to it, and no approval can land after expiry.
//!
//! ## Quantities
//!
//! Quantities are held in base units. `current_quantity` is private and
//! changes only through recorded [`StockMovement`]s, each bounded by
//! `0 <= current_quantity <= initial_quantity`. A recalled batch's quantity
//! is frozen.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pharmstock_catalog::{to_base_units, DrugProduct};
use pharmstock_core::{
    BatchId, BatchNumber, DispenseError, LevelId, ProductId, Timestamp, TransitionError,
    ValidationError, WarehouseId,
};

use crate::dispensing::{DispenseDelta, DispensingRecord, Prescription};

// ─── Batch State ─────────────────────────────────────────────────────

/// Stored lifecycle state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// Received, awaiting quality control.
    #[default]
    Quarantine,
    /// Released for dispensing.
    Approved,
    /// Failed quality control (terminal).
    Rejected,
    /// Withdrawn from the market (terminal).
    Recalled,
}

impl BatchState {
    /// Whether no further lifecycle transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Recalled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quarantine => "quarantine",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Recalled => "recalled",
        }
    }
}

impl std::fmt::Display for BatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a batch as observed at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Quarantine,
    Approved,
    Expired,
    Rejected,
    Recalled,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quarantine => "quarantine",
            Self::Approved => "approved",
            Self::Expired => "expired",
            Self::Rejected => "rejected",
            Self::Recalled => "recalled",
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Transition Evidence ─────────────────────────────────────────────

/// Evidence supplied with a lifecycle transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionEvidence {
    /// Reason, QC note, or recall reference.
    pub reason: String,
    /// User or system that initiated the transition.
    pub actor: Option<String>,
}

impl TransitionEvidence {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            actor: None,
        }
    }

    /// Attribute the transition to `actor`.
    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

/// Record of a batch state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTransitionRecord {
    pub from_state: BatchState,
    pub to_state: BatchState,
    pub timestamp: Timestamp,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

// ─── Stock Movements ─────────────────────────────────────────────────

/// Why a batch quantity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementReason {
    Receipt,
    Dispense,
    Adjustment,
    WriteOff,
}

impl std::fmt::Display for MovementReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Receipt => "receipt",
            Self::Dispense => "dispense",
            Self::Adjustment => "adjustment",
            Self::WriteOff => "write_off",
        })
    }
}

/// One immutable entry in a batch's quantity audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub reason: MovementReason,
    /// Signed change in base units.
    pub delta_base_units: Decimal,
    /// Batch quantity after the movement.
    pub quantity_after: Decimal,
    pub at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// ─── Receipt ─────────────────────────────────────────────────────────

/// Goods-receipt input for a new batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReceipt {
    pub batch_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_number: Option<String>,
    pub manufacture_date: Timestamp,
    pub expiry_date: Timestamp,
    /// Level the goods arrived in; must be purchasable.
    #[serde(rename = "packaging_level")]
    pub level_id: LevelId,
    /// Quantity in `level_id` units.
    pub quantity_received: Decimal,
    #[serde(rename = "warehouse")]
    pub warehouse_id: WarehouseId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_order_number: Option<String>,
    /// Cost of one `level_id` unit.
    #[serde(default)]
    pub unit_cost: Decimal,
    pub received_at: Timestamp,
}

/// Validate a goods receipt against its product and create the batch.
///
/// See [`Batch::receive`].
pub fn create_batch(product: &DrugProduct, receipt: BatchReceipt) -> Result<Batch, ValidationError> {
    Batch::receive(product, receipt)
}

// ─── Batch ───────────────────────────────────────────────────────────

/// A received lot of one product with its lifecycle and quantity history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BatchSnapshot")]
pub struct Batch {
    pub id: BatchId,
    #[serde(rename = "drug_product")]
    pub product_id: ProductId,
    pub batch_number: BatchNumber,
    pub lot_number: Option<String>,
    pub manufacture_date: Timestamp,
    pub expiry_date: Timestamp,
    /// Level the batch was received in.
    #[serde(rename = "packaging_level")]
    pub receipt_level: LevelId,
    /// Received quantity in `receipt_level` units.
    pub received_quantity: Decimal,
    initial_quantity: Decimal,
    current_quantity: Decimal,
    #[serde(rename = "status")]
    state: BatchState,
    #[serde(rename = "warehouse")]
    pub warehouse_id: WarehouseId,
    pub storage_location: Option<String>,
    pub purchase_order_number: Option<String>,
    /// Cost of one `receipt_level` unit.
    pub unit_cost: Decimal,
    transitions: Vec<BatchTransitionRecord>,
    movements: Vec<StockMovement>,
}

impl Batch {
    /// Validate a goods receipt and create a quarantined batch.
    ///
    /// # Errors
    ///
    /// [`ValidationError`] if the batch number is blank, the expiry date
    /// is not after the manufacture date, the quantity is not positive, the
    /// level belongs to another product or cannot be purchased, the unit
    /// cost is negative, or the quantity cannot be expressed in base units.
    pub fn receive(product: &DrugProduct, receipt: BatchReceipt) -> Result<Self, ValidationError> {
        let batch_number = BatchNumber::new(&receipt.batch_number)?;

        if receipt.expiry_date <= receipt.manufacture_date {
            return Err(ValidationError::ExpiryNotAfterManufacture {
                manufacture: receipt.manufacture_date.date().to_string(),
                expiry: receipt.expiry_date.date().to_string(),
            });
        }
        if receipt.quantity_received <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveQuantity {
                field: "quantity_received",
                value: receipt.quantity_received,
            });
        }
        if receipt.unit_cost.is_sign_negative() && !receipt.unit_cost.is_zero() {
            return Err(ValidationError::InvalidField {
                field: "unit_cost",
                reason: format!("must not be negative, got {}", receipt.unit_cost),
            });
        }

        if !product.accepts_receipts() {
            return Err(ValidationError::InvalidField {
                field: "drug_product",
                reason: format!("{} is not accepting new stock", product.product_code),
            });
        }

        let level = product
            .level(receipt.level_id)
            .ok_or_else(|| ValidationError::ForeignReference {
                what: "packaging level",
                id: receipt.level_id.to_string(),
                product: product.id.to_string(),
            })?;
        if !level.can_purchase {
            return Err(ValidationError::LevelNotPurchasable {
                level: level.level_name.clone(),
            });
        }

        let base = to_base_units(level, receipt.quantity_received).map_err(|e| {
            ValidationError::InvalidField {
                field: "quantity_received",
                reason: e.to_string(),
            }
        })?;

        let batch = Self {
            id: BatchId::new(),
            product_id: product.id,
            batch_number,
            lot_number: receipt.lot_number,
            manufacture_date: receipt.manufacture_date,
            expiry_date: receipt.expiry_date,
            receipt_level: receipt.level_id,
            received_quantity: receipt.quantity_received,
            initial_quantity: base,
            current_quantity: base,
            state: BatchState::Quarantine,
            warehouse_id: receipt.warehouse_id,
            storage_location: receipt.storage_location,
            purchase_order_number: receipt.purchase_order_number,
            unit_cost: receipt.unit_cost,
            transitions: Vec::new(),
            movements: vec![StockMovement {
                reason: MovementReason::Receipt,
                delta_base_units: base,
                quantity_after: base,
                at: receipt.received_at,
                note: None,
            }],
        };

        tracing::info!(
            batch = %batch.batch_number,
            product = %product.product_code,
            base_units = %base,
            expiry = %batch.expiry_date.date(),
            "batch received into quarantine"
        );
        Ok(batch)
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// Quantity received, in base units.
    pub fn initial_quantity(&self) -> Decimal {
        self.initial_quantity
    }

    /// Quantity on hand, in base units.
    pub fn current_quantity(&self) -> Decimal {
        self.current_quantity
    }

    /// Stored lifecycle state, ignoring expiry.
    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Ordered log of lifecycle transitions.
    pub fn transitions(&self) -> &[BatchTransitionRecord] {
        &self.transitions
    }

    /// Ordered quantity audit trail.
    pub fn movements(&self) -> &[StockMovement] {
        &self.movements
    }

    /// When the receipt was recorded, if the history is present.
    pub fn received_at(&self) -> Option<Timestamp> {
        self.movements
            .iter()
            .find(|m| m.reason == MovementReason::Receipt)
            .map(|m| m.at)
    }

    /// Whole days from `now` until expiry, floored.
    pub fn days_to_expiry(&self, now: Timestamp) -> i64 {
        self.expiry_date.days_until(now)
    }

    /// Whether the expiry date has been reached at `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expiry_date <= now
    }

    /// Status at `now`. Quarantined and approved batches read as
    /// [`BatchStatus::Expired`] once `expiry_date <= now`.
    pub fn effective_status(&self, now: Timestamp) -> BatchStatus {
        match self.state {
            BatchState::Rejected => BatchStatus::Rejected,
            BatchState::Recalled => BatchStatus::Recalled,
            _ if self.is_expired_at(now) => BatchStatus::Expired,
            BatchState::Quarantine => BatchStatus::Quarantine,
            BatchState::Approved => BatchStatus::Approved,
        }
    }

    /// Approved, unexpired, and holding stock at `now`.
    pub fn is_dispensable(&self, now: Timestamp) -> bool {
        self.effective_status(now) == BatchStatus::Approved && self.current_quantity > Decimal::ZERO
    }

    /// Inventory value of the remaining stock at receipt cost.
    ///
    /// `None` if the value is outside the decimal range.
    pub fn stock_value(&self) -> Option<Decimal> {
        if self.initial_quantity.is_zero() {
            return Some(Decimal::ZERO);
        }
        let per_base = self
            .unit_cost
            .checked_mul(self.received_quantity)?
            .checked_div(self.initial_quantity)?;
        Some(per_base.checked_mul(self.current_quantity)?.normalize())
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Release the batch for dispensing (QUARANTINE → APPROVED).
    ///
    /// Fails if the batch is not quarantined or has expired at `now`.
    pub fn approve(
        &mut self,
        evidence: TransitionEvidence,
        now: Timestamp,
    ) -> Result<(), TransitionError> {
        self.require_state(&[BatchState::Quarantine], BatchState::Approved)?;
        if self.is_expired_at(now) {
            return Err(TransitionError::InvalidTransition {
                from: BatchStatus::Expired.to_string(),
                to: BatchState::Approved.to_string(),
                reason: format!("batch expired on {}", self.expiry_date.date()),
            });
        }
        self.do_transition(BatchState::Approved, evidence, now);
        Ok(())
    }

    /// Fail the batch at quality control (QUARANTINE → REJECTED).
    pub fn reject(
        &mut self,
        evidence: TransitionEvidence,
        now: Timestamp,
    ) -> Result<(), TransitionError> {
        self.require_state(&[BatchState::Quarantine], BatchState::Rejected)?;
        require_reason(&evidence, BatchState::Rejected)?;
        self.do_transition(BatchState::Rejected, evidence, now);
        Ok(())
    }

    /// Withdraw the batch (QUARANTINE | APPROVED → RECALLED).
    ///
    /// Allowed after expiry. The reason carries the recall reference.
    pub fn recall(
        &mut self,
        evidence: TransitionEvidence,
        now: Timestamp,
    ) -> Result<(), TransitionError> {
        self.require_state(
            &[BatchState::Quarantine, BatchState::Approved],
            BatchState::Recalled,
        )?;
        require_reason(&evidence, BatchState::Recalled)?;
        self.do_transition(BatchState::Recalled, evidence, now);
        Ok(())
    }

    fn require_state(&self, allowed: &[BatchState], to: BatchState) -> Result<(), TransitionError> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        let reason = if self.state == to {
            format!("batch is already {}", self.state)
        } else if self.state.is_terminal() {
            format!("{} is a terminal state", self.state)
        } else {
            format!("{} is only reachable from {}", to, join_states(allowed))
        };
        Err(TransitionError::InvalidTransition {
            from: self.state.to_string(),
            to: to.to_string(),
            reason,
        })
    }

    fn do_transition(&mut self, to: BatchState, evidence: TransitionEvidence, now: Timestamp) {
        tracing::info!(
            batch = %self.batch_number,
            from = %self.state,
            to = %to,
            actor = evidence.actor.as_deref().unwrap_or("-"),
            "batch transition"
        );
        self.transitions.push(BatchTransitionRecord {
            from_state: self.state,
            to_state: to,
            timestamp: now,
            reason: evidence.reason,
            actor: evidence.actor,
        });
        self.state = to;
    }

    // ── Quantity movements ───────────────────────────────────────────

    /// Apply a signed stock-count correction in base units.
    pub fn adjust(
        &mut self,
        delta_base_units: Decimal,
        note: impl Into<String>,
        at: Timestamp,
    ) -> Result<&StockMovement, ValidationError> {
        if delta_base_units.is_zero() {
            return Err(ValidationError::InvalidField {
                field: "delta_base_units",
                reason: "adjustment must change the quantity".to_string(),
            });
        }
        self.apply_movement(MovementReason::Adjustment, delta_base_units, Some(note.into()), at)
    }

    /// Remove damaged, expired, or rejected stock.
    pub fn write_off(
        &mut self,
        base_units: Decimal,
        note: impl Into<String>,
        at: Timestamp,
    ) -> Result<&StockMovement, ValidationError> {
        if base_units <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveQuantity {
                field: "base_units",
                value: base_units,
            });
        }
        self.apply_movement(MovementReason::WriteOff, -base_units, Some(note.into()), at)
    }

    fn apply_movement(
        &mut self,
        reason: MovementReason,
        delta: Decimal,
        note: Option<String>,
        at: Timestamp,
    ) -> Result<&StockMovement, ValidationError> {
        let out_of_bounds = |why: String| ValidationError::QuantityOutOfBounds {
            batch: self.batch_number.to_string(),
            delta,
            reason: why,
        };
        if self.state == BatchState::Recalled {
            return Err(out_of_bounds("quantity of a recalled batch is frozen".into()));
        }
        let after = self
            .current_quantity
            .checked_add(delta)
            .ok_or_else(|| out_of_bounds("result is outside the decimal range".into()))?;
        if after.is_sign_negative() && !after.is_zero() {
            return Err(out_of_bounds(format!(
                "would leave {after} base units on hand"
            )));
        }
        if after > self.initial_quantity {
            return Err(out_of_bounds(format!(
                "would exceed the received quantity of {}",
                self.initial_quantity
            )));
        }

        self.current_quantity = after;
        tracing::debug!(
            batch = %self.batch_number,
            %reason,
            %delta,
            quantity_after = %after,
            "stock movement"
        );
        self.movements.push(StockMovement {
            reason,
            delta_base_units: delta,
            quantity_after: after,
            at,
            note,
        });
        Ok(&self.movements[self.movements.len() - 1])
    }

    /// Commit a validated dispense and produce its record.
    ///
    /// The guard is evaluated again against the batch as it is now: a
    /// delta validated earlier may have been overtaken by another dispense
    /// or by a lifecycle change.
    ///
    /// # Errors
    ///
    /// - [`DispenseError::InvalidQuantity`] if the delta is for another
    ///   batch or is not positive.
    /// - [`DispenseError::BatchNotApproved`] unless the effective status is
    ///   approved.
    /// - [`DispenseError::InsufficientStock`] if fewer base units remain
    ///   than the delta removes.
    pub fn commit_dispense(
        &mut self,
        delta: &DispenseDelta,
        unit_price: Decimal,
        prescription: Option<Prescription>,
        now: Timestamp,
    ) -> Result<DispensingRecord, DispenseError> {
        if delta.batch_id != self.id {
            return Err(DispenseError::InvalidQuantity {
                quantity: delta.quantity,
                reason: format!("delta was validated for batch {}", delta.batch_number),
            });
        }
        if delta.base_units <= Decimal::ZERO {
            return Err(DispenseError::InvalidQuantity {
                quantity: delta.quantity,
                reason: "must be greater than zero".to_string(),
            });
        }
        let status = self.effective_status(now);
        if status != BatchStatus::Approved {
            return Err(DispenseError::BatchNotApproved {
                batch: self.batch_number.to_string(),
                status: status.to_string(),
            });
        }
        if self.current_quantity < delta.base_units {
            return Err(DispenseError::InsufficientStock {
                batch: self.batch_number.to_string(),
                requested: delta.base_units,
                available: self.current_quantity,
            });
        }

        // Priced before any stock moves so an overflow leaves the batch as is.
        let record = DispensingRecord::new(delta, unit_price, prescription, now)?;
        let note = record
            .prescription
            .as_ref()
            .map(|p| format!("prescription {}", p.prescription_number));
        // Guards above cover every bound apply_movement checks.
        self.apply_movement(MovementReason::Dispense, -delta.base_units, note, now)
            .map_err(|e| DispenseError::InvalidQuantity {
                quantity: delta.quantity,
                reason: e.to_string(),
            })?;

        tracing::info!(
            batch = %self.batch_number,
            base_units = %delta.base_units,
            remaining = %self.current_quantity,
            record = %record.id,
            "dispense committed"
        );
        Ok(record)
    }
}

fn require_reason(evidence: &TransitionEvidence, to: BatchState) -> Result<(), TransitionError> {
    if evidence.reason.trim().is_empty() {
        return Err(TransitionError::MissingReason { to: to.to_string() });
    }
    Ok(())
}

fn join_states(states: &[BatchState]) -> String {
    states
        .iter()
        .map(BatchState::as_str)
        .collect::<Vec<_>>()
        .join(" or ")
}

// ─── Wire Form ───────────────────────────────────────────────────────

/// Deserialization mirror of [`Batch`]. History is optional so that batch
/// snapshots exported from other systems can be loaded; quantity bounds are
/// checked on conversion.
#[derive(Deserialize)]
struct BatchSnapshot {
    #[serde(default)]
    id: BatchId,
    #[serde(rename = "drug_product")]
    product_id: ProductId,
    batch_number: BatchNumber,
    #[serde(default)]
    lot_number: Option<String>,
    manufacture_date: Timestamp,
    expiry_date: Timestamp,
    #[serde(rename = "packaging_level")]
    receipt_level: LevelId,
    received_quantity: Decimal,
    initial_quantity: Decimal,
    current_quantity: Decimal,
    #[serde(rename = "status", default)]
    state: BatchState,
    #[serde(rename = "warehouse", default)]
    warehouse_id: WarehouseId,
    #[serde(default)]
    storage_location: Option<String>,
    #[serde(default)]
    purchase_order_number: Option<String>,
    #[serde(default)]
    unit_cost: Decimal,
    #[serde(default)]
    transitions: Vec<BatchTransitionRecord>,
    #[serde(default)]
    movements: Vec<StockMovement>,
}

impl TryFrom<BatchSnapshot> for Batch {
    type Error = ValidationError;

    fn try_from(s: BatchSnapshot) -> Result<Self, Self::Error> {
        if s.expiry_date <= s.manufacture_date {
            return Err(ValidationError::ExpiryNotAfterManufacture {
                manufacture: s.manufacture_date.date().to_string(),
                expiry: s.expiry_date.date().to_string(),
            });
        }
        if s.initial_quantity <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveQuantity {
                field: "initial_quantity",
                value: s.initial_quantity,
            });
        }
        if s.received_quantity <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveQuantity {
                field: "received_quantity",
                value: s.received_quantity,
            });
        }
        if (s.current_quantity.is_sign_negative() && !s.current_quantity.is_zero())
            || s.current_quantity > s.initial_quantity
        {
            return Err(ValidationError::InvalidField {
                field: "current_quantity",
                reason: format!(
                    "{} is outside 0..={}",
                    s.current_quantity, s.initial_quantity
                ),
            });
        }
        if let Some(last) = s.movements.last() {
            if last.quantity_after != s.current_quantity {
                return Err(ValidationError::InvalidField {
                    field: "movements",
                    reason: format!(
                        "last movement leaves {} but current quantity is {}",
                        last.quantity_after, s.current_quantity
                    ),
                });
            }
        }
        Ok(Self {
            id: s.id,
            product_id: s.product_id,
            batch_number: s.batch_number,
            lot_number: s.lot_number,
            manufacture_date: s.manufacture_date,
            expiry_date: s.expiry_date,
            receipt_level: s.receipt_level,
            received_quantity: s.received_quantity,
            initial_quantity: s.initial_quantity,
            current_quantity: s.current_quantity,
            state: s.state,
            warehouse_id: s.warehouse_id,
            storage_location: s.storage_location,
            purchase_order_number: s.purchase_order_number,
            unit_cost: s.unit_cost,
            transitions: s.transitions,
            movements: s.movements,
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pharmstock_catalog::{
        DosageForm, NewDrugProduct, NewPackagingLevel, ProductStatus, RouteOfAdministration,
        StorageCondition, UnitOfMeasure,
    };

    pub(crate) fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn new_level(name: &str, order: u32, factor: i64, dispense: bool, purchase: bool) -> NewPackagingLevel {
        NewPackagingLevel {
            id: None,
            level_name: name.into(),
            level_order: order,
            base_unit_quantity: Decimal::from(factor),
            unit_of_measure: UnitOfMeasure::Tablet,
            packaging_description: None,
            barcode: None,
            gtin: None,
            cost_price: Decimal::ZERO,
            selling_price: Decimal::ZERO,
            can_dispense: dispense,
            can_purchase: purchase,
        }
    }

    /// Tablet (1, dispense only), strip of 10 (dispense + purchase),
    /// box of 100 (purchase only).
    pub(crate) fn paracetamol() -> DrugProduct {
        DrugProduct::new(NewDrugProduct {
            id: None,
            product_code: "PARA-500".into(),
            generic_name: "Paracetamol".into(),
            brand_name: None,
            dosage_form: DosageForm::Tablet,
            strength: "500mg".into(),
            route_of_administration: RouteOfAdministration::Oral,
            therapeutic_class: "analgesic".into(),
            marketing_authorization_number: None,
            manufacturer: None,
            storage_conditions: StorageCondition::RoomTemp,
            requires_cold_chain: false,
            requires_prescription: false,
            is_controlled_substance: false,
            controlled_substance_schedule: None,
            status: ProductStatus::Active,
            packaging_levels: vec![
                new_level("tablet", 1, 1, true, false),
                new_level("strip", 2, 10, true, true),
                new_level("box", 3, 100, false, true),
            ],
        })
        .unwrap()
    }

    pub(crate) fn receipt(product: &DrugProduct, level: &str, qty: i64, expiry: &str) -> BatchReceipt {
        BatchReceipt {
            batch_number: "B-2024-001".into(),
            lot_number: None,
            manufacture_date: ts("2024-01-01"),
            expiry_date: ts(expiry),
            level_id: product.level_by_name(level).unwrap().id,
            quantity_received: Decimal::from(qty),
            warehouse_id: WarehouseId::new(),
            storage_location: None,
            purchase_order_number: None,
            unit_cost: Decimal::from(2),
            received_at: ts("2024-02-01"),
        }
    }

    fn approved_batch() -> Batch {
        let p = paracetamol();
        let mut b = create_batch(&p, receipt(&p, "strip", 3, "2026-01-01")).unwrap();
        b.approve(TransitionEvidence::new("QC passed"), ts("2024-02-02")).unwrap();
        b
    }

    fn delta_for(batch: &Batch, base_units: i64) -> DispenseDelta {
        DispenseDelta {
            batch_id: batch.id,
            batch_number: batch.batch_number.clone(),
            level_id: batch.receipt_level,
            quantity: Decimal::from(base_units),
            base_units: Decimal::from(base_units),
        }
    }

    // ── Receipt ──────────────────────────────────────────────────────

    #[test]
    fn test_receive_converts_to_base_units() {
        let p = paracetamol();
        let b = Batch::receive(&p, receipt(&p, "strip", 3, "2026-01-01")).unwrap();
        assert_eq!(b.state(), BatchState::Quarantine);
        assert_eq!(b.initial_quantity(), Decimal::from(30));
        assert_eq!(b.current_quantity(), Decimal::from(30));
        assert_eq!(b.received_quantity, Decimal::from(3));
        assert_eq!(b.movements().len(), 1);
        assert_eq!(b.movements()[0].reason, MovementReason::Receipt);
        assert_eq!(b.received_at(), Some(ts("2024-02-01")));
    }

    #[test]
    fn test_expiry_before_manufacture_rejected() {
        let p = paracetamol();
        let mut r = receipt(&p, "strip", 3, "2024-05-01");
        r.manufacture_date = ts("2024-06-01");
        assert!(matches!(
            create_batch(&p, r),
            Err(ValidationError::ExpiryNotAfterManufacture { .. })
        ));
    }

    #[test]
    fn test_expiry_equal_to_manufacture_rejected() {
        let p = paracetamol();
        let mut r = receipt(&p, "strip", 3, "2024-06-01");
        r.manufacture_date = ts("2024-06-01");
        assert!(create_batch(&p, r).is_err());
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let p = paracetamol();
        assert!(matches!(
            create_batch(&p, receipt(&p, "strip", 0, "2026-01-01")),
            Err(ValidationError::NonPositiveQuantity { .. })
        ));
    }

    #[test]
    fn test_non_purchasable_level_rejected() {
        let p = paracetamol();
        assert!(matches!(
            create_batch(&p, receipt(&p, "tablet", 30, "2026-01-01")),
            Err(ValidationError::LevelNotPurchasable { .. })
        ));
    }

    #[test]
    fn test_foreign_level_rejected() {
        let p = paracetamol();
        let other = paracetamol();
        let r = receipt(&other, "strip", 1, "2026-01-01");
        assert!(matches!(
            create_batch(&p, r),
            Err(ValidationError::ForeignReference { .. })
        ));
    }

    #[test]
    fn test_discontinued_product_rejects_receipt() {
        let mut p = paracetamol();
        p.status = ProductStatus::Discontinued;
        let r = receipt(&p, "strip", 3, "2026-01-01");
        assert!(matches!(
            create_batch(&p, r),
            Err(ValidationError::InvalidField { field: "drug_product", .. })
        ));
    }

    #[test]
    fn test_blank_batch_number_rejected() {
        let p = paracetamol();
        let mut r = receipt(&p, "strip", 1, "2026-01-01");
        r.batch_number = "   ".into();
        assert!(matches!(
            create_batch(&p, r),
            Err(ValidationError::MissingField { field: "batch_number" })
        ));
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    #[test]
    fn test_approve_from_quarantine() {
        let b = approved_batch();
        assert_eq!(b.state(), BatchState::Approved);
        assert_eq!(b.transitions().len(), 1);
        assert_eq!(b.transitions()[0].from_state, BatchState::Quarantine);
        assert_eq!(b.transitions()[0].to_state, BatchState::Approved);
    }

    #[test]
    fn test_cannot_approve_twice() {
        let mut b = approved_batch();
        let err = b
            .approve(TransitionEvidence::new("again"), ts("2024-03-01"))
            .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition { .. }));
        assert_eq!(b.transitions().len(), 1);
    }

    #[test]
    fn test_cannot_approve_expired_batch() {
        let p = paracetamol();
        let mut b = create_batch(&p, receipt(&p, "strip", 3, "2024-03-01")).unwrap();
        let err = b
            .approve(TransitionEvidence::new("late QC"), ts("2024-03-01"))
            .unwrap_err();
        match err {
            TransitionError::InvalidTransition { from, to, .. } => {
                assert_eq!(from, "expired");
                assert_eq!(to, "approved");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(b.state(), BatchState::Quarantine);
    }

    #[test]
    fn test_reject_requires_reason() {
        let p = paracetamol();
        let mut b = create_batch(&p, receipt(&p, "strip", 3, "2026-01-01")).unwrap();
        assert_eq!(
            b.reject(TransitionEvidence::new(" "), ts("2024-02-02")),
            Err(TransitionError::MissingReason { to: "rejected".into() })
        );
        b.reject(TransitionEvidence::new("failed dissolution").by("qa-lead"), ts("2024-02-02"))
            .unwrap();
        assert_eq!(b.effective_status(ts("2024-02-02")), BatchStatus::Rejected);
        assert_eq!(b.transitions()[0].actor.as_deref(), Some("qa-lead"));
    }

    #[test]
    fn test_cannot_approve_rejected_or_recalled() {
        let p = paracetamol();
        let mut rejected = create_batch(&p, receipt(&p, "strip", 3, "2026-01-01")).unwrap();
        rejected
            .reject(TransitionEvidence::new("contaminated"), ts("2024-02-02"))
            .unwrap();
        assert!(rejected
            .approve(TransitionEvidence::new("retry"), ts("2024-02-03"))
            .is_err());

        let mut recalled = approved_batch();
        recalled
            .recall(TransitionEvidence::new("RC-77"), ts("2024-04-01"))
            .unwrap();
        assert!(recalled
            .approve(TransitionEvidence::new("retry"), ts("2024-04-02"))
            .is_err());
    }

    #[test]
    fn test_cannot_reject_approved_batch() {
        let mut b = approved_batch();
        assert!(b
            .reject(TransitionEvidence::new("late finding"), ts("2024-03-01"))
            .is_err());
    }

    #[test]
    fn test_recall_from_quarantine_and_after_expiry() {
        let p = paracetamol();
        let mut q = create_batch(&p, receipt(&p, "strip", 3, "2026-01-01")).unwrap();
        q.recall(TransitionEvidence::new("RC-1"), ts("2024-02-02")).unwrap();
        assert_eq!(q.state(), BatchState::Recalled);

        let mut expired = approved_batch();
        expired
            .recall(TransitionEvidence::new("RC-2"), ts("2027-01-01"))
            .unwrap();
        assert_eq!(expired.effective_status(ts("2027-01-01")), BatchStatus::Recalled);
    }

    #[test]
    fn test_recall_requires_reference() {
        let mut b = approved_batch();
        assert!(matches!(
            b.recall(TransitionEvidence::default(), ts("2024-04-01")),
            Err(TransitionError::MissingReason { .. })
        ));
    }

    #[test]
    fn test_effective_status_derives_expiry() {
        let b = approved_batch();
        assert_eq!(b.effective_status(ts("2025-12-31")), BatchStatus::Approved);
        assert_eq!(b.effective_status(ts("2026-01-01")), BatchStatus::Expired);
        assert_eq!(b.state(), BatchState::Approved);
        assert!(b.is_dispensable(ts("2025-12-31")));
        assert!(!b.is_dispensable(ts("2026-01-01")));
    }

    // ── Movements ────────────────────────────────────────────────────

    #[test]
    fn test_commit_dispense_decrements_and_records() {
        let mut b = approved_batch();
        let delta = delta_for(&b, 12);
        let record = b
            .commit_dispense(&delta, "0.5".parse().unwrap(), None, ts("2024-03-01"))
            .unwrap();
        assert_eq!(b.current_quantity(), Decimal::from(18));
        assert_eq!(record.base_units, Decimal::from(12));
        assert_eq!(record.total_price, Decimal::from(6));
        let last = b.movements().last().unwrap();
        assert_eq!(last.reason, MovementReason::Dispense);
        assert_eq!(last.delta_base_units, Decimal::from(-12));
        assert_eq!(last.quantity_after, Decimal::from(18));
    }

    #[test]
    fn test_commit_dispense_rechecks_stock() {
        let mut b = approved_batch();
        let delta = delta_for(&b, 20);
        b.commit_dispense(&delta, Decimal::ZERO, None, ts("2024-03-01")).unwrap();
        let err = b
            .commit_dispense(&delta, Decimal::ZERO, None, ts("2024-03-01"))
            .unwrap_err();
        assert_eq!(
            err,
            DispenseError::InsufficientStock {
                batch: "B-2024-001".into(),
                requested: Decimal::from(20),
                available: Decimal::from(10),
            }
        );
        assert_eq!(b.current_quantity(), Decimal::from(10));
    }

    #[test]
    fn test_commit_dispense_rejects_expired() {
        let mut b = approved_batch();
        let delta = delta_for(&b, 1);
        assert!(matches!(
            b.commit_dispense(&delta, Decimal::ZERO, None, ts("2026-01-02")),
            Err(DispenseError::BatchNotApproved { .. })
        ));
    }

    #[test]
    fn test_commit_dispense_rejects_foreign_delta() {
        let mut b = approved_batch();
        let other = approved_batch();
        let delta = delta_for(&other, 1);
        assert!(matches!(
            b.commit_dispense(&delta, Decimal::ZERO, None, ts("2024-03-01")),
            Err(DispenseError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn test_adjust_bounds() {
        let mut b = approved_batch();
        assert!(b.adjust(Decimal::from(1), "found extra", ts("2024-03-01")).is_err());
        b.adjust(Decimal::from(-5), "cycle count", ts("2024-03-01")).unwrap();
        assert_eq!(b.current_quantity(), Decimal::from(25));
        b.adjust(Decimal::from(5), "recount", ts("2024-03-02")).unwrap();
        assert_eq!(b.current_quantity(), Decimal::from(30));
        assert!(matches!(
            b.adjust(Decimal::from(-31), "too much", ts("2024-03-03")),
            Err(ValidationError::QuantityOutOfBounds { .. })
        ));
        assert!(b.adjust(Decimal::ZERO, "noop", ts("2024-03-03")).is_err());
    }

    #[test]
    fn test_adjust_beyond_decimal_range() {
        let mut b = approved_batch();
        assert!(matches!(
            b.adjust(Decimal::MAX, "bad scan", ts("2024-03-01")),
            Err(ValidationError::QuantityOutOfBounds { .. })
        ));
        assert_eq!(b.current_quantity(), Decimal::from(30));
        assert_eq!(b.movements().len(), 1);
    }

    #[test]
    fn test_overpriced_dispense_leaves_stock_untouched() {
        let mut b = approved_batch();
        let delta = delta_for(&b, 3);
        let err = b
            .commit_dispense(&delta, Decimal::MAX, None, ts("2024-04-01"))
            .unwrap_err();
        assert!(matches!(err, DispenseError::InvalidQuantity { .. }));
        assert_eq!(b.current_quantity(), Decimal::from(30));
    }

    #[test]
    fn test_write_off_rejected_batch() {
        let p = paracetamol();
        let mut b = create_batch(&p, receipt(&p, "strip", 3, "2026-01-01")).unwrap();
        b.reject(TransitionEvidence::new("broken seal"), ts("2024-02-02")).unwrap();
        let m = b.write_off(Decimal::from(30), "destroyed", ts("2024-02-03")).unwrap();
        assert_eq!(m.quantity_after, Decimal::ZERO);
        assert_eq!(b.current_quantity(), Decimal::ZERO);
    }

    #[test]
    fn test_recalled_quantity_frozen() {
        let mut b = approved_batch();
        b.recall(TransitionEvidence::new("RC-9"), ts("2024-04-01")).unwrap();
        assert!(b.write_off(Decimal::from(1), "quarantine cage", ts("2024-04-02")).is_err());
        let delta = delta_for(&b, 1);
        assert!(b
            .commit_dispense(&delta, Decimal::ZERO, None, ts("2024-04-02"))
            .is_err());
        assert_eq!(b.current_quantity(), Decimal::from(30));
    }

    #[test]
    fn test_stock_value_uses_receipt_cost() {
        let mut b = approved_batch();
        // 3 strips at 2.00 each = 0.2 per tablet.
        b.adjust(Decimal::from(-10), "damaged", ts("2024-03-01")).unwrap();
        assert_eq!(b.stock_value(), Some(Decimal::from(4)));
    }

    // ── Serialization ────────────────────────────────────────────────

    #[test]
    fn test_batch_serde_round_trip() {
        let b = approved_batch();
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["status"], "approved");
        assert_eq!(json["current_quantity"], "30");
        let back: Batch = serde_json::from_value(json).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn test_snapshot_without_history() {
        let json = serde_json::json!({
            "drug_product": ProductId::new(),
            "batch_number": "EXT-9",
            "manufacture_date": "2024-01-01",
            "expiry_date": "2025-01-01",
            "packaging_level": LevelId::new(),
            "received_quantity": "10",
            "initial_quantity": "100",
            "current_quantity": "40",
            "status": "approved"
        });
        let b: Batch = serde_json::from_value(json).unwrap();
        assert_eq!(b.current_quantity(), Decimal::from(40));
        assert_eq!(b.received_quantity, Decimal::from(10));
        assert!(b.received_at().is_none());
    }

    #[test]
    fn test_snapshot_quantity_bounds_checked() {
        let json = serde_json::json!({
            "drug_product": ProductId::new(),
            "batch_number": "EXT-9",
            "manufacture_date": "2024-01-01",
            "expiry_date": "2025-01-01",
            "packaging_level": LevelId::new(),
            "received_quantity": "1",
            "initial_quantity": "10",
            "current_quantity": "11"
        });
        assert!(serde_json::from_value::<Batch>(json).is_err());
    }
}

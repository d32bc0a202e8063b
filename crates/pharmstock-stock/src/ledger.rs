//! # Batch Ledger
//!
//! In-memory batch store backed by `DashMap`. Every mutation runs
//! read-validate-update under the entry's write lock, so two dispenses
//! racing for the last units of a batch cannot both pass the stock guard.
//!
//! Batch numbers are unique per product. The number index is claimed
//! through its own entry lock before the batch is inserted.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use thiserror::Error;

use pharmstock_catalog::{DrugProduct, PackagingLevel};
use pharmstock_core::{
    BatchId, BatchNumber, DispenseError, Precision, ProductId, Timestamp, TransitionError,
    ValidationError,
};
use pharmstock_state::{
    create_batch, Batch, BatchReceipt, DispenseDelta, DispensingRecord, Prescription,
    TransitionEvidence,
};

use crate::dispense::{unit_price_for, validate_request, DispenseRequest};
use crate::expiry::{classify_expiry, summarize_by_product, ExpiryReport, ProductExpirySummary};
use crate::fefo::plan_fefo;

/// Errors from ledger operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// No batch with this identifier is registered.
    #[error("batch {0} not found")]
    NotFound(BatchId),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Dispense(#[from] DispenseError),
}

/// Thread-safe store of batches keyed by [`BatchId`].
pub struct BatchLedger {
    batches: DashMap<BatchId, Batch>,
    numbers: DashMap<(ProductId, BatchNumber), BatchId>,
}

impl BatchLedger {
    pub fn new() -> Self {
        Self {
            batches: DashMap::new(),
            numbers: DashMap::new(),
        }
    }

    /// Register an existing batch.
    ///
    /// # Errors
    ///
    /// [`ValidationError::Duplicate`] if a batch with this id is already
    /// registered, or if the product already has a batch with this batch
    /// number. Nothing is stored on error.
    pub fn register(&self, batch: Batch) -> Result<BatchId, LedgerError> {
        let id = batch.id;
        // Lock order is id then number everywhere both are held.
        let slot = match self.batches.entry(id) {
            Entry::Occupied(_) => {
                return Err(ValidationError::Duplicate {
                    field: "id",
                    value: id.to_string(),
                }
                .into())
            }
            Entry::Vacant(slot) => slot,
        };
        let key = (batch.product_id, batch.batch_number.clone());
        match self.numbers.entry(key) {
            Entry::Occupied(_) => Err(ValidationError::Duplicate {
                field: "batch_number",
                value: batch.batch_number.to_string(),
            }
            .into()),
            Entry::Vacant(number) => {
                number.insert(id);
                slot.insert(batch);
                Ok(id)
            }
        }
    }

    /// Validate a goods receipt, create the batch, and register it.
    pub fn receive(&self, product: &DrugProduct, receipt: BatchReceipt) -> Result<Batch, LedgerError> {
        let batch = create_batch(product, receipt)?;
        self.register(batch.clone())?;
        Ok(batch)
    }

    /// A snapshot of one batch.
    pub fn get(&self, id: BatchId) -> Option<Batch> {
        self.batches.get(&id).map(|r| r.value().clone())
    }

    /// Look up a batch by product and batch number.
    pub fn find(&self, product_id: ProductId, batch_number: &BatchNumber) -> Option<Batch> {
        let id = *self
            .numbers
            .get(&(product_id, batch_number.clone()))?
            .value();
        self.get(id)
    }

    /// Snapshots of every batch.
    pub fn list(&self) -> Vec<Batch> {
        self.batches.iter().map(|r| r.value().clone()).collect()
    }

    /// Snapshots of one product's batches.
    pub fn list_for_product(&self, product_id: ProductId) -> Vec<Batch> {
        self.batches
            .iter()
            .filter(|r| r.value().product_id == product_id)
            .map(|r| r.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    pub fn approve(
        &self,
        id: BatchId,
        evidence: TransitionEvidence,
        now: Timestamp,
    ) -> Result<Batch, LedgerError> {
        self.update(id, |b| b.approve(evidence, now).map(|_| b.clone()))
    }

    pub fn reject(
        &self,
        id: BatchId,
        evidence: TransitionEvidence,
        now: Timestamp,
    ) -> Result<Batch, LedgerError> {
        self.update(id, |b| b.reject(evidence, now).map(|_| b.clone()))
    }

    pub fn recall(
        &self,
        id: BatchId,
        evidence: TransitionEvidence,
        now: Timestamp,
    ) -> Result<Batch, LedgerError> {
        self.update(id, |b| b.recall(evidence, now).map(|_| b.clone()))
    }

    // ── Quantity ─────────────────────────────────────────────────────

    /// Apply a signed stock-count correction; returns the new quantity.
    pub fn adjust(
        &self,
        id: BatchId,
        delta_base_units: Decimal,
        note: &str,
        at: Timestamp,
    ) -> Result<Decimal, LedgerError> {
        self.update(id, |b| {
            b.adjust(delta_base_units, note, at).map(|m| m.quantity_after)
        })
    }

    /// Write off stock; returns the new quantity.
    pub fn write_off(
        &self,
        id: BatchId,
        base_units: Decimal,
        note: &str,
        at: Timestamp,
    ) -> Result<Decimal, LedgerError> {
        self.update(id, |b| b.write_off(base_units, note, at).map(|m| m.quantity_after))
    }

    /// Validate and commit a dispense request in one step.
    ///
    /// Validation and the decrement both run under the batch's write lock.
    pub fn dispense(
        &self,
        product: &DrugProduct,
        request: &DispenseRequest,
        precision: Precision,
        now: Timestamp,
    ) -> Result<DispensingRecord, LedgerError> {
        self.update(request.batch_id, |batch| -> Result<_, DispenseError> {
            let delta = validate_request(product, batch, request, precision, now)?;
            let level = product.level(request.level_id).ok_or_else(|| {
                DispenseError::LevelMismatch {
                    level: request.level_id.to_string(),
                    batch: batch.batch_number.to_string(),
                }
            })?;
            batch.commit_dispense(
                &delta,
                unit_price_for(level, request),
                request.prescription.clone(),
                now,
            )
        })
    }

    /// Commit a delta validated earlier, e.g. one slice of a FEFO plan.
    /// The stock and status guard is evaluated again at commit time.
    pub fn commit(
        &self,
        delta: &DispenseDelta,
        unit_price: Decimal,
        prescription: Option<Prescription>,
        now: Timestamp,
    ) -> Result<DispensingRecord, LedgerError> {
        self.update(delta.batch_id, |batch| {
            batch.commit_dispense(delta, unit_price, prescription, now)
        })
    }

    // ── Reports ──────────────────────────────────────────────────────

    pub fn expiry_report(&self, now: Timestamp, horizon_days: u32) -> ExpiryReport {
        let batches = self.list();
        classify_expiry(&batches, now, horizon_days)
    }

    pub fn expiry_summaries(&self, now: Timestamp) -> Vec<ProductExpirySummary> {
        let batches = self.list();
        summarize_by_product(&batches, now)
    }

    /// FEFO plan over a snapshot of the level's product batches.
    pub fn plan_fefo(
        &self,
        level: &PackagingLevel,
        qty: Decimal,
        precision: Precision,
        now: Timestamp,
    ) -> Result<Vec<DispenseDelta>, LedgerError> {
        let batches = self.list_for_product(level.product_id);
        Ok(plan_fefo(&batches, level, qty, precision, now)?)
    }

    /// Read-validate-update under a single write lock.
    fn update<T, E>(
        &self,
        id: BatchId,
        f: impl FnOnce(&mut Batch) -> Result<T, E>,
    ) -> Result<T, LedgerError>
    where
        LedgerError: From<E>,
    {
        let mut entry = self.batches.get_mut(&id).ok_or(LedgerError::NotFound(id))?;
        Ok(f(entry.value_mut())?)
    }
}

impl Default for BatchLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BatchLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchLedger")
            .field("batches_count", &self.batches.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{approved, paracetamol, quarantined, ts};
    use std::sync::Arc;

    #[test]
    fn test_register_and_get() {
        let ledger = BatchLedger::new();
        let p = paracetamol();
        let b = quarantined(&p, "B-1", 3, "2026-01-01");
        let id = ledger.register(b.clone()).unwrap();
        assert_eq!(ledger.get(id), Some(b.clone()));
        assert_eq!(ledger.find(p.id, &b.batch_number), Some(b));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_duplicate_batch_number_per_product() {
        let ledger = BatchLedger::new();
        let p = paracetamol();
        let other = paracetamol();
        ledger.register(quarantined(&p, "B-1", 3, "2026-01-01")).unwrap();
        let err = ledger
            .register(quarantined(&p, "B-1", 5, "2027-01-01"))
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::Duplicate { field: "batch_number", .. })
        ));
        // Same number under another product is fine.
        ledger.register(quarantined(&other, "B-1", 3, "2026-01-01")).unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_duplicate_batch_id_keeps_original() {
        let ledger = BatchLedger::new();
        let p = paracetamol();
        let original = quarantined(&p, "B-1", 3, "2026-01-01");
        let id = ledger.register(original.clone()).unwrap();

        let mut renamed = original.clone();
        renamed.batch_number = BatchNumber::new("B-2").unwrap();
        let err = ledger.register(renamed).unwrap_err();
        assert_eq!(
            err,
            LedgerError::Validation(ValidationError::Duplicate {
                field: "id",
                value: id.to_string(),
            })
        );

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(id), Some(original.clone()));
        assert_eq!(ledger.find(p.id, &original.batch_number), Some(original));
        assert_eq!(ledger.find(p.id, &BatchNumber::new("B-2").unwrap()), None);
    }

    #[test]
    fn test_lifecycle_through_ledger() {
        let ledger = BatchLedger::new();
        let p = paracetamol();
        let id = ledger.register(quarantined(&p, "B-1", 3, "2026-01-01")).unwrap();
        let b = ledger
            .approve(id, TransitionEvidence::new("QC ok"), ts("2024-02-01"))
            .unwrap();
        assert_eq!(b.state(), pharmstock_state::BatchState::Approved);
        assert!(matches!(
            ledger.reject(id, TransitionEvidence::new("late"), ts("2024-02-02")),
            Err(LedgerError::Transition(_))
        ));
        ledger
            .recall(id, TransitionEvidence::new("RC-3"), ts("2024-03-01"))
            .unwrap();
        assert!(ledger
            .write_off(id, Decimal::ONE, "x", ts("2024-03-02"))
            .is_err());
    }

    #[test]
    fn test_missing_batch() {
        let ledger = BatchLedger::new();
        let id = BatchId::new();
        assert_eq!(
            ledger.approve(id, TransitionEvidence::new("x"), ts("2024-01-01")),
            Err(LedgerError::NotFound(id))
        );
    }

    #[test]
    fn test_dispense_decrements() {
        let ledger = BatchLedger::new();
        let p = paracetamol();
        let id = ledger.register(approved(&p, "B-1", 3, "2026-01-01")).unwrap();
        let strip = p.level_by_name("strip").unwrap();
        let req = DispenseRequest {
            batch_id: id,
            level_id: strip.id,
            quantity: Decimal::from(2),
            unit_price: None,
            prescription: None,
        };
        let record = ledger.dispense(&p, &req, Precision::default(), ts("2025-01-01")).unwrap();
        assert_eq!(record.base_units, Decimal::from(20));
        assert_eq!(record.total_price, "1.8".parse::<Decimal>().unwrap());
        assert_eq!(ledger.get(id).unwrap().current_quantity(), Decimal::from(10));
        assert!(matches!(
            ledger.dispense(&p, &req, Precision::default(), ts("2025-01-01")),
            Err(LedgerError::Dispense(DispenseError::InsufficientStock { .. }))
        ));
    }

    #[test]
    fn test_fefo_plan_commit() {
        let ledger = BatchLedger::new();
        let p = paracetamol();
        let first = ledger.register(approved(&p, "B-1", 1, "2025-03-01")).unwrap();
        let second = ledger.register(approved(&p, "B-2", 2, "2025-09-01")).unwrap();
        let tablet = p.level_by_name("tablet").unwrap();
        let now = ts("2025-01-01");
        let plan = ledger
            .plan_fefo(tablet, Decimal::from(15), Precision::default(), now)
            .unwrap();
        for delta in &plan {
            ledger.commit(delta, tablet.selling_price, None, now).unwrap();
        }
        assert_eq!(ledger.get(first).unwrap().current_quantity(), Decimal::ZERO);
        assert_eq!(ledger.get(second).unwrap().current_quantity(), Decimal::from(15));
    }

    #[test]
    fn test_expiry_report_from_ledger() {
        let ledger = BatchLedger::new();
        let p = paracetamol();
        ledger.register(approved(&p, "B-1", 1, "2025-01-10")).unwrap();
        ledger.register(approved(&p, "B-2", 1, "2026-01-10")).unwrap();
        let report = ledger.expiry_report(ts("2025-01-01"), 90);
        assert_eq!(report.critical.len(), 1);
        assert_eq!(report.ok.len(), 1);
        let summaries = ledger.expiry_summaries(ts("2025-01-01"));
        assert_eq!(summaries[0].expiring_30_days, 1);
    }

    #[test]
    fn test_concurrent_dispense_never_oversells() {
        let ledger = Arc::new(BatchLedger::new());
        let p = Arc::new(paracetamol());
        let id = ledger.register(approved(&p, "B-1", 5, "2026-01-01")).unwrap();
        let tablet_id = p.level_by_name("tablet").unwrap().id;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let p = Arc::clone(&p);
                std::thread::spawn(move || {
                    let req = DispenseRequest {
                        batch_id: id,
                        level_id: tablet_id,
                        quantity: Decimal::from(7),
                        unit_price: None,
                        prescription: None,
                    };
                    ledger.dispense(&p, &req, Precision::default(), ts("2025-01-01")).is_ok()
                })
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        // 50 tablets cover seven requests of 7.
        assert_eq!(successes, 7);
        assert_eq!(ledger.get(id).unwrap().current_quantity(), Decimal::ONE);
    }
}

//! # pharmstock-stock — Stock Operations
//!
//! Read-side decisions over batches and the concurrent store that applies
//! them.
//!
//! - [`expiry`]: urgency buckets and per-product expiry alerts.
//! - [`dispense`]: the dispensing gate. Pure; produces a delta.
//! - [`fefo`]: first-expiry-first-out ordering and multi-batch plans.
//! - [`ledger`]: `DashMap`-backed batch store whose commits re-run the
//!   guard under the batch's write lock.
//!
//! Every function here takes `now` explicitly.

pub mod dispense;
pub mod expiry;
pub mod fefo;
pub mod ledger;

#[cfg(test)]
pub(crate) mod testing;

pub use dispense::{unit_price_for, validate_dispense, validate_request, DispenseRequest};
pub use expiry::{
    classify_expiry, summarize_by_product, ExpiryBucket, ExpiryEntry, ExpiryReport,
    ProductExpirySummary, CRITICAL_WINDOW_DAYS,
};
pub use fefo::{fefo_order, plan_fefo};
pub use ledger::{BatchLedger, LedgerError};
pub use pharmstock_state::DispenseDelta;

//! # pharmstock-state — Batch Lifecycle
//!
//! Batches are the unit of stock. This crate owns their creation from a
//! goods receipt, the quality-control lifecycle, the quantity audit trail,
//! and the commit step that turns a validated dispense into a
//! [`DispensingRecord`].
//!
//! ## Lifecycle
//!
//! | From | To | Condition |
//! |------|----|-----------|
//! | quarantine | approved | `expiry_date > now` |
//! | quarantine | rejected | non-empty reason |
//! | quarantine, approved | recalled | non-empty recall reference |
//! | quarantine, approved | *expired* | derived when `expiry_date <= now` |
//!
//! `expired` is an effective status only; see [`Batch::effective_status`].

pub mod batch;
pub mod dispensing;

pub use batch::{
    create_batch, Batch, BatchReceipt, BatchState, BatchStatus, BatchTransitionRecord,
    MovementReason, StockMovement, TransitionEvidence,
};
pub use dispensing::{DispenseDelta, DispensingRecord, Prescription};

//! # pharmstock-core — Foundational Types
//!
//! This crate is the leaf of the pharmstock workspace. It defines the
//! primitives every other crate shares and depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype identifiers.** `ProductId`, `LevelId`, `BatchId`,
//!    `WarehouseId`, `DispensingId`, and the validated `BatchNumber`. A
//!    batch references its product and packaging level by identifier
//!    only, so mixing them up must be a type error.
//!
//! 2. **Decimal quantities.** All stock arithmetic is `rust_decimal`.
//!    `Precision` bounds how many fractional digits a conversion may
//!    produce before it counts as a data error.
//!
//! 3. **Explicit time.** `Timestamp` is UTC with seconds precision;
//!    `days_until` owns the floor-of-days rule used for expiry. Operations
//!    take `now` as a parameter; the `Clock` trait is only a convenience
//!    for callers.
//!
//! 4. **One error taxonomy.** `ValidationError`, `ConversionError`,
//!    `TransitionError`, `DispenseError`, and `ConfigError`, unified under
//!    `PharmaError`.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `pharmstock-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod config;
pub mod error;
pub mod identity;
pub mod quantity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use config::PharmaConfig;
pub use error::{
    ConfigError, ConversionError, DispenseError, PharmaError, TransitionError, ValidationError,
};
pub use identity::{BatchId, BatchNumber, DispensingId, LevelId, ProductId, WarehouseId};
pub use quantity::{Precision, DEFAULT_PRECISION};
pub use temporal::{Clock, FixedClock, SystemClock, Timestamp};

pub use rust_decimal::Decimal;

//! # Error Types — Structured Error Hierarchy
//!
//! Defines the error taxonomy shared by every pharmstock crate. All errors
//! use `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Every failure is scoped to one operation on one batch, product, or
//!   packaging level. Nothing here is fatal to the process.
//! - Validation errors name the offending field.
//! - Conversion errors carry the exact operands so the caller can show
//!   the user which quantity was not representable.
//! - Transition errors include the current state, the attempted target,
//!   and the rejection reason.
//! - Dispense errors distinguish stock, status, and quantity failures so
//!   the web layer can map each one to its own message.

use rust_decimal::Decimal;
use thiserror::Error;

/// Top-level error type for pharmstock.
#[derive(Error, Debug)]
pub enum PharmaError {
    /// Malformed input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Non-exact unit conversion.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Illegal lifecycle move.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Dispensing gate refused the request.
    #[error(transparent)]
    Dispense(#[from] DispenseError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Malformed input rejected before any state is created or changed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was empty or missing.
    #[error("field `{field}` is required")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A field had a value outside its allowed range.
    #[error("field `{field}` is invalid: {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Expiry date must be strictly after the manufacture date.
    #[error("expiry date {expiry} must be after manufacture date {manufacture}")]
    ExpiryNotAfterManufacture {
        /// Manufacture date as rendered by the caller.
        manufacture: String,
        /// Expiry date as rendered by the caller.
        expiry: String,
    },

    /// A quantity that must be strictly positive was zero or negative.
    #[error("quantity for `{field}` must be positive, got {value}")]
    NonPositiveQuantity {
        /// Name of the quantity field.
        field: &'static str,
        /// The rejected value.
        value: Decimal,
    },

    /// Packaging level cannot be used to receive stock.
    #[error("packaging level {level} cannot be purchased")]
    LevelNotPurchasable {
        /// Level name.
        level: String,
    },

    /// A referenced record belongs to a different owner.
    #[error("{what} {id} does not belong to product {product}")]
    ForeignReference {
        /// Kind of record (e.g. "packaging level").
        what: &'static str,
        /// Identifier of the referenced record.
        id: String,
        /// Identifier of the expected owning product.
        product: String,
    },

    /// A value that must be unique within its scope was repeated.
    #[error("duplicate {field}: {value}")]
    Duplicate {
        /// Name of the field that must be unique.
        field: &'static str,
        /// The repeated value.
        value: String,
    },

    /// A quantity movement would break the batch quantity bounds.
    #[error("movement of {delta} on batch {batch} rejected: {reason}")]
    QuantityOutOfBounds {
        /// Batch number.
        batch: String,
        /// Signed base-unit delta that was attempted.
        delta: Decimal,
        /// Which bound would be violated.
        reason: String,
    },
}

/// Unit conversion that cannot be represented exactly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// The converted quantity has digits beyond the configured precision.
    #[error("{base_units} base units is not a whole multiple of {level} at {precision} fractional digits (got {result})")]
    NotExact {
        /// Base-unit quantity being converted.
        base_units: Decimal,
        /// Target level name.
        level: String,
        /// Unrounded result of the division.
        result: Decimal,
        /// Fractional digits allowed.
        precision: u32,
    },

    /// Quantities are never negative.
    #[error("cannot convert negative quantity {0}")]
    NegativeQuantity(Decimal),

    /// The level's conversion factor is zero or negative.
    #[error("packaging level {level} has non-positive base unit quantity {factor}")]
    InvalidFactor {
        /// Level name.
        level: String,
        /// The offending factor.
        factor: Decimal,
    },

    /// Decimal arithmetic overflowed.
    #[error("decimal overflow converting {quantity} via {level}")]
    Overflow {
        /// Quantity being converted.
        quantity: Decimal,
        /// Level name.
        level: String,
    },

    /// Source and target levels belong to different products.
    #[error("cannot convert between levels of different products ({from} -> {to})")]
    ProductMismatch {
        /// Source level name.
        from: String,
        /// Target level name.
        to: String,
    },
}

/// Illegal batch lifecycle move.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// Attempted transition is not valid from the current state.
    #[error("invalid batch transition from {from} to {to}: {reason}")]
    InvalidTransition {
        /// Current state name.
        from: String,
        /// Attempted target state name.
        to: String,
        /// Reason the transition was rejected.
        reason: String,
    },

    /// The transition requires a reason or reference and none was given.
    #[error("transition to {to} requires a non-empty reason")]
    MissingReason {
        /// Attempted target state name.
        to: String,
    },
}

/// Dispensing gate failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispenseError {
    /// The batch does not hold enough stock.
    #[error("insufficient stock in batch {batch}: requested {requested} base units, available {available}")]
    InsufficientStock {
        /// Batch number (or "FEFO" for multi-batch plans).
        batch: String,
        /// Requested base units.
        requested: Decimal,
        /// Available base units.
        available: Decimal,
    },

    /// The batch's effective status is not `approved`.
    #[error("batch {batch} is not approved for dispensing (status: {status})")]
    BatchNotApproved {
        /// Batch number.
        batch: String,
        /// Effective status at validation time.
        status: String,
    },

    /// The requested quantity is non-positive or not convertible.
    #[error("invalid dispense quantity {quantity}: {reason}")]
    InvalidQuantity {
        /// Requested quantity in level units.
        quantity: Decimal,
        /// Why it was rejected.
        reason: String,
    },

    /// The packaging level belongs to another product.
    #[error("packaging level {level} does not belong to the product of batch {batch}")]
    LevelMismatch {
        /// Level name.
        level: String,
        /// Batch number.
        batch: String,
    },

    /// The packaging level is not flagged for dispensing.
    #[error("packaging level {level} cannot be dispensed")]
    LevelNotDispensable {
        /// Level name.
        level: String,
    },

    /// A prescription-only product was dispensed without prescription details.
    #[error("product {product} requires a prescription")]
    PrescriptionRequired {
        /// Product code.
        product: String,
    },
}

/// Configuration loading failure.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file was not valid YAML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },

    /// A setting was outside its allowed range.
    #[error("config value `{key}` out of range: {reason}")]
    OutOfRange {
        /// Setting name.
        key: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

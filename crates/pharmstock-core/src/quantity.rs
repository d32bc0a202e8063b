//! # Decimal Precision
//!
//! Stock quantities and prices are `rust_decimal::Decimal`. Binary floats
//! never enter stock arithmetic: 0.1 strips of ten tablets must be exactly
//! one tablet.
//!
//! `Precision` is the number of fractional digits a converted quantity may
//! carry before it is treated as a data error. It defaults to 3.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Default number of fractional digits allowed in a converted quantity.
pub const DEFAULT_PRECISION: u32 = 3;

/// Upper bound on configurable precision.
pub const MAX_PRECISION: u32 = 10;

/// Fractional-digit budget for exact conversions.
///
/// Deserialized values go through [`Precision::new`] and are clamped the
/// same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Precision(u32);

impl Precision {
    pub const DEFAULT: Self = Self(DEFAULT_PRECISION);

    /// Create a precision, clamped to [`MAX_PRECISION`].
    pub fn new(digits: u32) -> Self {
        Self(digits.min(MAX_PRECISION))
    }

    /// Number of fractional digits.
    pub fn digits(&self) -> u32 {
        self.0
    }

    /// Whether `value` is exactly representable with this many fractional
    /// digits.
    pub fn is_exact(&self, value: Decimal) -> bool {
        value.round_dp(self.0) == value
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for Precision {
    fn from(digits: u32) -> Self {
        Self::new(digits)
    }
}

impl From<Precision> for u32 {
    fn from(precision: Precision) -> Self {
        precision.0
    }
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} dp", self.0)
    }
}

//! # Domain Identity Newtypes
//!
//! Newtype wrappers for the identifiers that cross crate boundaries. You
//! cannot pass a `LevelId` where a `ProductId` is expected, which matters
//! because batches reference both by identifier only.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a drug product.
    ProductId,
    "product"
);
uuid_id!(
    /// Identifier of a packaging level within a product.
    LevelId,
    "level"
);
uuid_id!(
    /// Identifier of a received batch.
    BatchId,
    "batch"
);
uuid_id!(
    /// Identifier of a warehouse holding stock.
    WarehouseId,
    "warehouse"
);
uuid_id!(
    /// Identifier of a dispensing record.
    DispensingId,
    "dispensing"
);

/// Manufacturer batch number as printed on the pack.
///
/// Unique per product. Surrounding whitespace is stripped; an empty
/// number is rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BatchNumber(String);

impl BatchNumber {
    /// Validate and wrap a batch number.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingField {
                field: "batch_number",
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The batch number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BatchNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BatchNumber> for String {
    fn from(value: BatchNumber) -> Self {
        value.0
    }
}

impl std::fmt::Display for BatchNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//! # Expiry Classification
//!
//! Sorts batches into urgency buckets by whole days remaining:
//!
//! ```text
//! d = floor((expiry_date - now) / 1 day)
//!
//! expired   d < 0
//! critical  0 <= d <= 30
//! warning   30 < d <= H
//! ok        d > H
//! ```
//!
//! Buckets are tested in that order, so with a horizon `H` below 30 the
//! days in `(H, 30]` still land in `critical`. Rejected and recalled
//! batches are out of circulation and are not classified.
//!
//! A batch whose expiry instant equals `now` has `d = 0` and is placed in
//! `critical`, even though its effective status already reads `expired`.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pharmstock_core::{BatchId, BatchNumber, ProductId, Timestamp};
use pharmstock_state::{Batch, BatchState, BatchStatus};

/// Upper bound, in days, of the critical bucket.
pub const CRITICAL_WINDOW_DAYS: i64 = 30;

/// Window of the longer per-product alert count.
pub const EXTENDED_WINDOW_DAYS: i64 = 90;

/// Urgency bucket for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryBucket {
    Expired,
    Critical,
    Warning,
    Ok,
}

impl ExpiryBucket {
    pub const ALL: [ExpiryBucket; 4] = [Self::Expired, Self::Critical, Self::Warning, Self::Ok];

    /// Bucket for a batch with `days` whole days to expiry.
    pub fn for_days(days: i64, horizon_days: u32) -> Self {
        if days < 0 {
            Self::Expired
        } else if days <= CRITICAL_WINDOW_DAYS {
            Self::Critical
        } else if days <= i64::from(horizon_days) {
            Self::Warning
        } else {
            Self::Ok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Ok => "ok",
        }
    }
}

impl std::fmt::Display for ExpiryBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryEntry {
    pub batch_id: BatchId,
    pub batch_number: BatchNumber,
    pub product_id: ProductId,
    pub expiry_date: Timestamp,
    pub days_to_expiry: i64,
    pub status: BatchStatus,
    /// On-hand quantity in base units.
    pub current_quantity: Decimal,
}

/// Batches partitioned into the four urgency buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryReport {
    pub expired: Vec<ExpiryEntry>,
    pub critical: Vec<ExpiryEntry>,
    pub warning: Vec<ExpiryEntry>,
    pub ok: Vec<ExpiryEntry>,
}

impl ExpiryReport {
    pub fn bucket(&self, bucket: ExpiryBucket) -> &[ExpiryEntry] {
        match bucket {
            ExpiryBucket::Expired => &self.expired,
            ExpiryBucket::Critical => &self.critical,
            ExpiryBucket::Warning => &self.warning,
            ExpiryBucket::Ok => &self.ok,
        }
    }

    fn bucket_mut(&mut self, bucket: ExpiryBucket) -> &mut Vec<ExpiryEntry> {
        match bucket {
            ExpiryBucket::Expired => &mut self.expired,
            ExpiryBucket::Critical => &mut self.critical,
            ExpiryBucket::Warning => &mut self.warning,
            ExpiryBucket::Ok => &mut self.ok,
        }
    }

    /// Which bucket holds `batch_id`, if it was classified.
    pub fn bucket_of(&self, batch_id: BatchId) -> Option<ExpiryBucket> {
        ExpiryBucket::ALL
            .into_iter()
            .find(|b| self.bucket(*b).iter().any(|e| e.batch_id == batch_id))
    }

    /// Total classified batches.
    pub fn len(&self) -> usize {
        self.expired.len() + self.critical.len() + self.warning.len() + self.ok.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Batches that need attention (expired or critical).
    pub fn needs_attention(&self) -> usize {
        self.expired.len() + self.critical.len()
    }
}

/// Whether a batch takes part in expiry classification.
fn in_circulation(batch: &Batch) -> bool {
    !matches!(batch.state(), BatchState::Rejected | BatchState::Recalled)
}

/// Classify batches into expiry buckets at `now`.
///
/// Pure and independent of input order: within each bucket entries are
/// sorted by expiry date, then batch number.
pub fn classify_expiry<'a, I>(batches: I, now: Timestamp, horizon_days: u32) -> ExpiryReport
where
    I: IntoIterator<Item = &'a Batch>,
{
    let mut report = ExpiryReport::default();
    for batch in batches.into_iter().filter(|b| in_circulation(b)) {
        let days = batch.days_to_expiry(now);
        let bucket = ExpiryBucket::for_days(days, horizon_days);
        report.bucket_mut(bucket).push(ExpiryEntry {
            batch_id: batch.id,
            batch_number: batch.batch_number.clone(),
            product_id: batch.product_id,
            expiry_date: batch.expiry_date,
            days_to_expiry: days,
            status: batch.effective_status(now),
            current_quantity: batch.current_quantity(),
        });
    }
    for bucket in ExpiryBucket::ALL {
        report.bucket_mut(bucket).sort_by(|a, b| {
            (a.expiry_date, &a.batch_number, a.batch_id).cmp(&(b.expiry_date, &b.batch_number, b.batch_id))
        });
    }

    tracing::debug!(
        now = %now,
        horizon_days,
        expired = report.expired.len(),
        critical = report.critical.len(),
        warning = report.warning.len(),
        ok = report.ok.len(),
        "expiry classification"
    );
    report
}

// ─── Per-product Alerts ──────────────────────────────────────────────

/// Expiry alert counts for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductExpirySummary {
    pub product_id: ProductId,
    /// Batches past expiry.
    pub expired: usize,
    /// Batches expiring within 30 days.
    pub expiring_30_days: usize,
    /// Batches expiring within 90 days, including those within 30.
    pub expiring_90_days: usize,
    /// Unexpired stock of quarantined and approved batches, in base units.
    pub on_hand_base_units: Decimal,
}

impl ProductExpirySummary {
    fn empty(product_id: ProductId) -> Self {
        Self {
            product_id,
            expired: 0,
            expiring_30_days: 0,
            expiring_90_days: 0,
            on_hand_base_units: Decimal::ZERO,
        }
    }
}

/// Summarise expiry alerts per product. Only batches with stock on hand
/// are counted; rejected and recalled batches are excluded.
pub fn summarize_by_product<'a, I>(batches: I, now: Timestamp) -> Vec<ProductExpirySummary>
where
    I: IntoIterator<Item = &'a Batch>,
{
    let mut by_product: BTreeMap<ProductId, ProductExpirySummary> = BTreeMap::new();
    for batch in batches.into_iter().filter(|b| in_circulation(b)) {
        if batch.current_quantity().is_zero() {
            continue;
        }
        let summary = by_product
            .entry(batch.product_id)
            .or_insert_with(|| ProductExpirySummary::empty(batch.product_id));
        let days = batch.days_to_expiry(now);
        if days < 0 {
            summary.expired += 1;
        } else {
            if days <= CRITICAL_WINDOW_DAYS {
                summary.expiring_30_days += 1;
            }
            if days <= EXTENDED_WINDOW_DAYS {
                summary.expiring_90_days += 1;
            }
        }
        if !batch.is_expired_at(now) {
            summary.on_hand_base_units = summary
                .on_hand_base_units
                .saturating_add(batch.current_quantity());
        }
    }
    by_product.into_values().collect()
}

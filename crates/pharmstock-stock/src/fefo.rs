//! # FEFO Allocation
//!
//! First-expiry-first-out: stock closest to expiry leaves first. Only
//! batches that are dispensable at `now` take part, ordered by expiry date
//! and then batch number.
//!
//! A plan allocates in units of the requested level. Each batch contributes
//! at most the whole part of its stock in that level (to the configured
//! precision), so every slice converts exactly in both directions.

use rust_decimal::{Decimal, RoundingStrategy};

use pharmstock_catalog::{to_base_units, PackagingLevel};
use pharmstock_core::{DispenseError, Precision, Timestamp};
use pharmstock_state::{Batch, DispenseDelta};

/// Batches dispensable at `now`, in FEFO order.
pub fn fefo_order<'a, I>(batches: I, now: Timestamp) -> Vec<&'a Batch>
where
    I: IntoIterator<Item = &'a Batch>,
{
    let mut eligible: Vec<&Batch> = batches
        .into_iter()
        .filter(|b| b.is_dispensable(now))
        .collect();
    eligible.sort_by(|a, b| {
        (a.expiry_date, &a.batch_number, a.id).cmp(&(b.expiry_date, &b.batch_number, b.id))
    });
    eligible
}

/// Propose per-batch deltas covering `qty` units of `level`.
///
/// Batches of other products are ignored.
///
/// # Errors
///
/// - [`DispenseError::LevelNotDispensable`] if `level.can_dispense` is false.
/// - [`DispenseError::InvalidQuantity`] if `qty <= 0` or has more
///   fractional digits than `precision`.
/// - [`DispenseError::InsufficientStock`] if the eligible batches together
///   cannot cover the request; `available` is their total in base units.
pub fn plan_fefo<'a, I>(
    batches: I,
    level: &PackagingLevel,
    qty: Decimal,
    precision: Precision,
    now: Timestamp,
) -> Result<Vec<DispenseDelta>, DispenseError>
where
    I: IntoIterator<Item = &'a Batch>,
{
    if !level.can_dispense {
        return Err(DispenseError::LevelNotDispensable {
            level: level.level_name.clone(),
        });
    }
    if qty <= Decimal::ZERO || !precision.is_exact(qty) {
        return Err(DispenseError::InvalidQuantity {
            quantity: qty,
            reason: format!("must be positive with at most {precision} fractional digits"),
        });
    }
    let invalid = |e: pharmstock_core::ConversionError| DispenseError::InvalidQuantity {
        quantity: qty,
        reason: e.to_string(),
    };
    let requested_base = to_base_units(level, qty).map_err(invalid)?;

    let candidates = fefo_order(
        batches
            .into_iter()
            .filter(|b| b.product_id == level.product_id),
        now,
    );

    let mut remaining = qty;
    let mut plan = Vec::new();
    for batch in &candidates {
        if remaining.is_zero() {
            break;
        }
        let available = batch
            .current_quantity()
            .checked_div(level.base_unit_quantity)
            .unwrap_or(Decimal::MAX)
            .round_dp_with_strategy(precision.digits(), RoundingStrategy::ToZero);
        let take = remaining.min(available);
        if take <= Decimal::ZERO {
            continue;
        }
        plan.push(DispenseDelta {
            batch_id: batch.id,
            batch_number: batch.batch_number.clone(),
            level_id: level.id,
            quantity: take.normalize(),
            base_units: to_base_units(level, take).map_err(invalid)?,
        });
        remaining -= take;
    }

    if !remaining.is_zero() {
        let available = candidates
            .iter()
            .fold(Decimal::ZERO, |sum, b| sum.saturating_add(b.current_quantity()));
        return Err(DispenseError::InsufficientStock {
            batch: "FEFO".to_string(),
            requested: requested_base,
            available,
        });
    }

    tracing::debug!(
        level = %level.level_name,
        %qty,
        batches = plan.len(),
        "fefo plan"
    );
    Ok(plan)
}

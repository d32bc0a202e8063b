//! # Expiry Alerts
//!
//! Bucket classification of in-circulation batches and the per-product
//! summary counts behind the expiry dashboard.

mod common;

use common::{approved_batch, paracetamol, receipt, ts};
use pharmstock_core::Decimal;
use pharmstock_state::{create_batch, Batch, TransitionEvidence};
use pharmstock_stock::{classify_expiry, summarize_by_product, BatchLedger, ExpiryBucket};
use proptest::prelude::*;

#[test]
fn fifteen_days_out_is_critical() {
    let p = paracetamol();
    let now = ts("2025-01-01");
    let b = approved_batch(&p, "B-1", "strip", 3, "2025-01-16");
    let report = classify_expiry([&b], now, 90);
    assert_eq!(report.bucket_of(b.id), Some(ExpiryBucket::Critical));
    assert_eq!(report.critical[0].days_to_expiry, 15);
}

#[test]
fn every_bucket_from_one_ledger() {
    let p = paracetamol();
    let ledger = BatchLedger::new();
    for (number, expiry) in [
        ("B-EXP", "2024-12-20"),
        ("B-CRIT", "2025-01-20"),
        ("B-WARN", "2025-03-01"),
        ("B-OK", "2026-01-01"),
    ] {
        ledger.register(approved_batch(&p, number, "strip", 1, expiry)).unwrap();
    }
    let report = ledger.expiry_report(ts("2025-01-01"), 90);
    for bucket in ExpiryBucket::ALL {
        assert_eq!(report.bucket(bucket).len(), 1, "{}", bucket.as_str());
    }
    assert_eq!(report.needs_attention(), 2);

    let summary = &ledger.expiry_summaries(ts("2025-01-01"))[0];
    assert_eq!(summary.expired, 1);
    assert_eq!(summary.expiring_30_days, 1);
    assert_eq!(summary.expiring_90_days, 2);
    assert_eq!(summary.on_hand_base_units, Decimal::from(30));
}

#[test]
fn rejected_and_recalled_batches_are_left_out() {
    let p = paracetamol();
    let mut rejected =
        create_batch(&p, receipt(&p, "B-R", "strip", 1, "2024-01-01", "2025-01-10")).unwrap();
    rejected
        .reject(TransitionEvidence::new("contaminated"), ts("2024-01-05"))
        .unwrap();
    let mut recalled = approved_batch(&p, "B-C", "strip", 1, "2025-01-10");
    recalled
        .recall(TransitionEvidence::new("RC-1"), ts("2024-06-01"))
        .unwrap();
    let batches = [rejected, recalled];
    assert!(classify_expiry(&batches, ts("2025-01-01"), 90).is_empty());
    assert!(summarize_by_product(&batches, ts("2025-01-01")).is_empty());
}

proptest! {
    #[test]
    fn buckets_are_disjoint_and_exhaustive(
        offsets in proptest::collection::vec(-60i64..400, 1..20),
        horizon in 31u32..180,
    ) {
        let p = paracetamol();
        let now = ts("2025-01-01");
        let batches: Vec<Batch> = offsets
            .iter()
            .enumerate()
            .map(|(i, days)| {
                let expiry = now.add_days(*days).date().to_string();
                approved_batch(&p, &format!("B-{i}"), "strip", 1, &expiry)
            })
            .collect();
        let report = classify_expiry(&batches, now, horizon);
        prop_assert_eq!(report.len(), batches.len());
        for b in &batches {
            let hits = ExpiryBucket::ALL
                .iter()
                .filter(|bucket| report.bucket(**bucket).iter().any(|e| e.batch_id == b.id))
                .count();
            prop_assert_eq!(hits, 1);
        }
    }
}

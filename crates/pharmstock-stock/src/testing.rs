//! Shared fixtures for unit tests.

use rust_decimal::Decimal;

use pharmstock_catalog::{
    DosageForm, DrugProduct, NewDrugProduct, NewPackagingLevel, ProductStatus,
    RouteOfAdministration, StorageCondition, UnitOfMeasure,
};
use pharmstock_core::{Timestamp, WarehouseId};
use pharmstock_state::{create_batch, Batch, BatchReceipt, TransitionEvidence};

pub(crate) fn ts(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap()
}

fn new_level(name: &str, order: u32, factor: i64, dispense: bool, price: &str) -> NewPackagingLevel {
    NewPackagingLevel {
        id: None,
        level_name: name.into(),
        level_order: order,
        base_unit_quantity: Decimal::from(factor),
        unit_of_measure: UnitOfMeasure::Tablet,
        packaging_description: None,
        barcode: None,
        gtin: None,
        cost_price: Decimal::ZERO,
        selling_price: price.parse().unwrap(),
        can_dispense: dispense,
        can_purchase: true,
    }
}

/// Tablet (1), strip of 10, box of 100 (not dispensable).
pub(crate) fn paracetamol() -> DrugProduct {
    DrugProduct::new(NewDrugProduct {
        id: None,
        product_code: "PARA-500".into(),
        generic_name: "Paracetamol".into(),
        brand_name: None,
        dosage_form: DosageForm::Tablet,
        strength: "500mg".into(),
        route_of_administration: RouteOfAdministration::Oral,
        therapeutic_class: "analgesic".into(),
        marketing_authorization_number: None,
        manufacturer: None,
        storage_conditions: StorageCondition::RoomTemp,
        requires_cold_chain: false,
        requires_prescription: false,
        is_controlled_substance: false,
        controlled_substance_schedule: None,
        status: ProductStatus::Active,
        packaging_levels: vec![
            new_level("tablet", 1, 1, true, "0.1"),
            new_level("strip", 2, 10, true, "0.9"),
            new_level("box", 3, 100, false, "8"),
        ],
    })
    .unwrap()
}

/// Same hierarchy, prescription only.
pub(crate) fn amoxicillin() -> DrugProduct {
    let mut new: NewDrugProduct = paracetamol().into();
    new.id = None;
    new.product_code = "AMOX-500".into();
    new.generic_name = "Amoxicillin".into();
    new.requires_prescription = true;
    for level in &mut new.packaging_levels {
        level.id = None;
    }
    DrugProduct::new(new).unwrap()
}

/// A quarantined batch of `strips` strips, manufactured 2024-01-01.
pub(crate) fn quarantined(product: &DrugProduct, number: &str, strips: i64, expiry: &str) -> Batch {
    create_batch(
        product,
        BatchReceipt {
            batch_number: number.into(),
            lot_number: None,
            manufacture_date: ts("2024-01-01"),
            expiry_date: ts(expiry),
            level_id: product.level_by_name("strip").unwrap().id,
            quantity_received: Decimal::from(strips),
            warehouse_id: WarehouseId::new(),
            storage_location: None,
            purchase_order_number: None,
            unit_cost: Decimal::ONE,
            received_at: ts("2024-01-01"),
        },
    )
    .unwrap()
}

/// As [`quarantined`], approved on 2024-01-02.
pub(crate) fn approved(product: &DrugProduct, number: &str, strips: i64, expiry: &str) -> Batch {
    let mut batch = quarantined(product, number, strips, expiry);
    batch
        .approve(TransitionEvidence::new("QC passed"), ts("2024-01-02"))
        .unwrap();
    batch
}

//! Fixtures shared across the integration tests.

#![allow(dead_code)]

use pharmstock_catalog::{
    DosageForm, DrugProduct, NewDrugProduct, NewPackagingLevel, ProductStatus,
    RouteOfAdministration, StorageCondition, UnitOfMeasure,
};
use pharmstock_core::{Decimal, Timestamp, WarehouseId};
use pharmstock_state::{create_batch, Batch, BatchReceipt, TransitionEvidence};

pub fn ts(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap()
}

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

pub fn level(name: &str, order: u32, factor: i64, uom: UnitOfMeasure) -> NewPackagingLevel {
    NewPackagingLevel {
        id: None,
        level_name: name.into(),
        level_order: order,
        base_unit_quantity: Decimal::from(factor),
        unit_of_measure: uom,
        packaging_description: None,
        barcode: None,
        gtin: None,
        cost_price: Decimal::ZERO,
        selling_price: Decimal::ZERO,
        can_dispense: true,
        can_purchase: true,
    }
}

pub fn product(code: &str, levels: Vec<NewPackagingLevel>, rx: bool) -> DrugProduct {
    DrugProduct::new(NewDrugProduct {
        id: None,
        product_code: code.into(),
        generic_name: "Paracetamol".into(),
        brand_name: None,
        dosage_form: DosageForm::Tablet,
        strength: "500mg".into(),
        route_of_administration: RouteOfAdministration::Oral,
        therapeutic_class: String::new(),
        marketing_authorization_number: None,
        manufacturer: None,
        storage_conditions: StorageCondition::RoomTemp,
        requires_cold_chain: false,
        requires_prescription: rx,
        is_controlled_substance: false,
        controlled_substance_schedule: None,
        status: ProductStatus::Active,
        packaging_levels: levels,
    })
    .unwrap()
}

/// Tablet (1), strip of 10, box of 100. Every level is dispensable and
/// purchasable.
pub fn paracetamol() -> DrugProduct {
    product(
        "PARA-500",
        vec![
            level("tablet", 1, 1, UnitOfMeasure::Tablet),
            level("strip", 2, 10, UnitOfMeasure::Strip),
            level("box", 3, 100, UnitOfMeasure::Box),
        ],
        false,
    )
}

pub fn receipt(
    product: &DrugProduct,
    number: &str,
    level_name: &str,
    qty: i64,
    manufacture: &str,
    expiry: &str,
) -> BatchReceipt {
    BatchReceipt {
        batch_number: number.into(),
        lot_number: None,
        manufacture_date: ts(manufacture),
        expiry_date: ts(expiry),
        level_id: product.level_by_name(level_name).unwrap().id,
        quantity_received: Decimal::from(qty),
        warehouse_id: WarehouseId::new(),
        storage_location: None,
        purchase_order_number: None,
        unit_cost: Decimal::ONE,
        received_at: ts(manufacture),
    }
}

/// A batch received in `level_name` units, approved the day after
/// manufacture.
pub fn approved_batch(
    product: &DrugProduct,
    number: &str,
    level_name: &str,
    qty: i64,
    expiry: &str,
) -> Batch {
    let mut batch =
        create_batch(product, receipt(product, number, level_name, qty, "2024-01-01", expiry))
            .unwrap();
    batch
        .approve(TransitionEvidence::new("QC release"), ts("2024-01-02"))
        .unwrap();
    batch
}

//! Walks one assignment through its lifecycle against in-memory stores.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use rust_decimal::Decimal;

use custody_core::{CompanyId, Quantity, UserId};
use custody_infra::{CustodyConfig, CustodyServices, InMemoryInventory, NewAssignment, NewLine, NewProduct};
use custody_products::TrackingMode;
use custody_stock::{Location, LocationId, LocationUsage, Lot, LotId, Warehouse, WarehouseId};

fn main() -> anyhow::Result<()> {
    let config = CustodyConfig::from_env();
    custody_observability::init_with_default(&config.log_filter);

    let company_id = CompanyId::new();
    let inventory = Arc::new(InMemoryInventory::new());
    let services = CustodyServices::new(config, inventory.clone());

    let stock = Location::new(LocationId::generate(), company_id, "WH/Stock", LocationUsage::Internal)?;
    let customers = Location::new(LocationId::generate(), company_id, "Partners/Customers", LocationUsage::Customer)?;
    let (stock_id, customers_id) = (stock.id, customers.id);
    inventory.add_location(stock.clone())?;
    inventory.add_location(customers)?;
    inventory.add_warehouse(Warehouse::new(WarehouseId::generate(), "WH", "Main Warehouse", &stock)?)?;

    let laptop = services.register_product(
        company_id,
        NewProduct {
            sku: "LAP-14".to_string(),
            name: "Laptop 14\"".to_string(),
            tracking: TrackingMode::Serial,
        },
    )?;
    let cable = services.register_product(
        company_id,
        NewProduct {
            sku: "CBL-NET".to_string(),
            name: "Network cable (m)".to_string(),
            tracking: TrackingMode::None,
        },
    )?;

    let serial = Lot::new(LotId::generate(), company_id, laptop, "SN-2024-0001")?;
    let serial_id = serial.id;
    inventory.register_lot(serial)?;
    inventory.receive(company_id, laptop, stock_id, Quantity::ONE, Some(serial_id))?;
    inventory.receive(company_id, cable, stock_id, Quantity::from(50), None)?;

    let contact_id = services.register_contact(company_id, "Jane Cooper", None)?;
    services.set_contact_outbound_location(company_id, contact_id, Some(customers_id))?;

    let cable_length = Decimal::from_str("2.5").context("cable length")?;
    let created = services.create_assignment(
        company_id,
        UserId::new(),
        NewAssignment {
            contact_id,
            lines: vec![
                NewLine::new(laptop, Quantity::ONE).with_serial("SN-2024-0001"),
                NewLine::new(cable, Quantity::new(cable_length)),
            ],
            notes: Some("Onboarding kit".to_string()),
        },
    )?;

    services.assign(company_id, created.assignment_id)?;
    let done = services.complete(company_id, created.assignment_id)?;
    let moves = services.assignment_moves(company_id, done.assignment_id)?;

    tracing::info!(
        code = %done.code,
        state = %done.state,
        moves = moves.len(),
        assignments = services.contact_assignment_count(company_id, contact_id),
        "demo finished"
    );
    println!("{}", serde_json::to_string_pretty(&done)?);
    Ok(())
}

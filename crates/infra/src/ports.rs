//! Collaborator services the assignment workflow depends on.
//!
//! Each trait has an in-memory implementation in this crate; services only
//! see the traits.

use chrono::{DateTime, Utc};

use custody_core::{CompanyId, Quantity};
use custody_parties::ContactId;
use custody_products::ProductId;
use custody_stock::{LocationId, Lot, LotId, NewStockMove, StockMove, StockMoveId, Warehouse};

use crate::inventory::InventoryError;
use crate::projections::contacts::ContactReadModel;
use crate::projections::products::ProductReadModel;

/// Named document sequences.
pub trait SequenceGenerator: Send + Sync {
    /// Next reference for `code`, or `None` when no such sequence exists.
    fn next_by_code(&self, company_id: CompanyId, code: &str) -> Option<String>;
}

/// Stock levels, lots and stock moves.
pub trait InventoryEngine: Send + Sync {
    /// On-hand quantity of a product at a location, across lots.
    fn available_quantity(
        &self,
        company_id: CompanyId,
        product_id: ProductId,
        location_id: LocationId,
    ) -> Result<Quantity, InventoryError>;

    /// Lot/serial record with exactly this name.
    fn find_lot(
        &self,
        company_id: CompanyId,
        product_id: ProductId,
        name: &str,
    ) -> Result<Option<Lot>, InventoryError>;

    /// Create a move and confirm it.
    fn create_move(&self, new: NewStockMove) -> Result<StockMove, InventoryError>;

    fn record_picked(
        &self,
        company_id: CompanyId,
        move_id: StockMoveId,
        quantity: Quantity,
        lot_id: Option<LotId>,
    ) -> Result<(), InventoryError>;

    /// Complete a batch of moves, all or nothing.
    fn complete_moves(
        &self,
        company_id: CompanyId,
        move_ids: &[StockMoveId],
        at: DateTime<Utc>,
    ) -> Result<(), InventoryError>;

    /// Cancel the open moves among `move_ids`; done and cancelled ones are skipped.
    fn cancel_moves(&self, company_id: CompanyId, move_ids: &[StockMoveId]) -> Result<(), InventoryError>;

    fn moves(&self, company_id: CompanyId, move_ids: &[StockMoveId]) -> Result<Vec<StockMove>, InventoryError>;
}

pub trait WarehouseRegistry: Send + Sync {
    /// The company's main warehouse (the first one registered).
    fn primary_warehouse(&self, company_id: CompanyId) -> Option<Warehouse>;
}

pub trait ContactDirectory: Send + Sync {
    fn contact(&self, company_id: CompanyId, contact_id: ContactId) -> Option<ContactReadModel>;
}

pub trait ProductCatalog: Send + Sync {
    fn product(&self, company_id: CompanyId, product_id: ProductId) -> Option<ProductReadModel>;
}

//! Stock domain module.
//!
//! Locations, warehouses, lots, stock moves and the on-hand quant ledger.
//! Pure domain logic (no IO); the in-memory inventory engine in
//! `custody-infra` drives these types behind its locks.

pub mod ledger;
pub mod location;
pub mod lot;
pub mod movement;

pub use ledger::{QuantKey, QuantLedger};
pub use location::{Location, LocationId, LocationUsage, Warehouse, WarehouseId};
pub use lot::{Lot, LotId};
pub use movement::{MoveState, NewStockMove, StockMove, StockMoveId};

//! Inventory collaborator: errors and the in-memory engine.

use thiserror::Error;

use custody_core::DomainError;
use custody_stock::{LocationId, StockMoveId};

pub mod in_memory;

pub use in_memory::InMemoryInventory;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("stock move {0} not found")]
    MoveNotFound(StockMoveId),

    #[error("location {0} not found")]
    UnknownLocation(LocationId),

    #[error("{0}")]
    Rejected(#[from] DomainError),

    #[error("inventory state lock poisoned")]
    Poisoned,
}

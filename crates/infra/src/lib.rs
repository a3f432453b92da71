//! Infrastructure layer: event store, dispatch, projections, inventory and
//! the application services built on them.

pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod inventory;
pub mod ports;
pub mod projections;
pub mod read_model;
pub mod sequence;
pub mod services;

pub use config::CustodyConfig;
pub use inventory::{InMemoryInventory, InventoryError};
pub use services::{AssignmentHit, CustodyServices, NewAssignment, NewLine, NewProduct, ServiceError};

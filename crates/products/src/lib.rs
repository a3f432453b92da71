//! Product catalog module (event-sourced).
//!
//! Products carry the tracking policy that governs how assignment lines are
//! validated and how stock moves resolve lots.

pub mod product;
pub mod tracking;

pub use product::{
    ArchiveProduct, ChangeTracking, CreateProduct, Product, ProductArchived, ProductCommand,
    ProductCreated, ProductEvent, ProductId, ProductStatus, TrackingChanged, display_name,
};
pub use tracking::TrackingMode;

//! Projections (read model builders).
//!
//! Projections consume published envelopes and maintain company-isolated read
//! models. They are rebuildable from the event store and idempotent under
//! at-least-once delivery: per-stream cursors drop replays.

use thiserror::Error;

pub mod assignments;
pub mod contacts;
pub mod cursor;
pub mod products;

pub use assignments::{AssignmentLineReadModel, AssignmentReadModel, AssignmentsProjection};
pub use contacts::{ContactDirectoryProjection, ContactReadModel};
pub use products::{ProductCatalogProjection, ProductReadModel};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event: {0}")]
    Deserialize(String),

    #[error("company isolation violation: {0}")]
    CompanyIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

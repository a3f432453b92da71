use thiserror::Error;

use custody_core::{CompanyId, Quantity};
use custody_parties::ContactId;
use custody_products::ProductId;

use crate::command_dispatcher::DispatchError;
use crate::inventory::InventoryError;
use crate::projections::ProjectionError;

/// Failure of a service operation.
///
/// Operational variants carry the messages shown to users; the wrapped
/// variants come from the lower layers unchanged.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("No warehouse found for the company {0}.")]
    NoWarehouse(CompanyId),

    #[error("The customer location could not be found. Please configure it.")]
    MissingCustomerLocation,

    #[error("Product \"{product}\" requires a Lot/Serial number.")]
    MissingSerial { product: String },

    #[error("Not enough stock for product \"{product}\". Available: {available}, Requested: {requested}.")]
    InsufficientStock {
        product: String,
        available: Quantity,
        requested: Quantity,
    },

    #[error("Serial Number \"{serial}\" not found for product \"{product}\".")]
    SerialNotFound { serial: String, product: String },

    #[error("product {0} not found")]
    UnknownProduct(ProductId),

    #[error("contact {0} not found")]
    UnknownContact(ContactId),

    #[error("assignment not found")]
    NotFound,

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl ServiceError {
    /// Domain rejection text (validation or state rule), if this is one.
    pub fn domain_message(&self) -> Option<&str> {
        match self {
            ServiceError::Dispatch(e) => e.domain_message(),
            _ => None,
        }
    }
}

//! Contacts module (event-sourced).
//!
//! Contacts are the counterparties products are assigned to. Each may carry
//! the outbound location stock is delivered to when they receive products.

pub mod contact;

pub use contact::{
    Contact, ContactCommand, ContactEvent, ContactId, ContactInfo, ContactRegistered,
    ContactUpdated, OutboundLocationSet, RegisterContact, SetOutboundLocation, UpdateDetails,
};

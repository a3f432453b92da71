//! Application services: the operations exposed to callers.
//!
//! Every write goes through the command dispatcher; committed events are then
//! applied to the read models before the call returns, so a caller always
//! reads its own writes. Events are still published on the bus for any other
//! subscriber.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use custody_assignments::{
    AddLine, Assignment, AssignmentCommand, AssignmentFilter, AssignmentId, AttachFile, AttachmentId,
    CreateAssignment, DeleteAssignment, DetachFile, LineDraft, MarkAssigned, NameSearch, RemoveLine,
    ResetToDraft, SearchCandidate, SearchOperator, UpdateLine, UpdateNotes, WindowAction,
    view_assignments_action,
};
use custody_core::{CompanyId, Quantity, UserId};
use custody_events::{EventEnvelope, InMemoryEventBus};
use custody_parties::{
    Contact, ContactCommand, ContactId, ContactInfo, RegisterContact, SetOutboundLocation, UpdateDetails,
};
use custody_products::{
    ArchiveProduct, ChangeTracking, CreateProduct, Product, ProductCommand, ProductId, ProductStatus,
    TrackingMode,
};
use custody_stock::{LocationId, StockMove};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::config::CustodyConfig;
use crate::event_store::{InMemoryEventStore, StoredEvent};
use crate::ports::{
    ContactDirectory, InventoryEngine, ProductCatalog, SequenceGenerator, WarehouseRegistry,
};
use crate::projections::assignments::ASSIGNMENT_AGGREGATE;
use crate::projections::contacts::CONTACT_AGGREGATE;
use crate::projections::products::PRODUCT_AGGREGATE;
use crate::projections::{
    AssignmentReadModel, AssignmentsProjection, ContactDirectoryProjection, ContactReadModel,
    ProductCatalogProjection, ProductReadModel,
};
use crate::read_model::InMemoryCompanyStore;
use crate::sequence::{ASSIGNMENT_SEQUENCE, InMemorySequence};

use claims::AssignmentClaims;

mod claims;
mod completion;
pub mod error;

pub use error::ServiceError;

/// Code given to an assignment when the sequence yields nothing.
pub const FALLBACK_CODE: &str = "New";

pub type JsonBus = InMemoryEventBus<EventEnvelope<JsonValue>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<JsonBus>>;
type Products = ProductCatalogProjection<Arc<InMemoryCompanyStore<ProductId, ProductReadModel>>>;
type Contacts = ContactDirectoryProjection<Arc<InMemoryCompanyStore<ContactId, ContactReadModel>>>;
type Assignments = AssignmentsProjection<Arc<InMemoryCompanyStore<AssignmentId, AssignmentReadModel>>>;

/// A product to register in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub tracking: TrackingMode,
}

/// A line as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLine {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub serial_number: Option<String>,
    pub warranty_serial: Option<String>,
    pub purchase_date: Option<NaiveDate>,
}

impl NewLine {
    pub fn new(product_id: ProductId, quantity: Quantity) -> Self {
        Self {
            product_id,
            quantity,
            serial_number: None,
            warranty_serial: None,
            purchase_date: None,
        }
    }

    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAssignment {
    pub contact_id: ContactId,
    pub lines: Vec<NewLine>,
    pub notes: Option<String>,
}

/// One name-search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentHit {
    pub assignment_id: AssignmentId,
    pub code: String,
    pub contact_name: String,
}

pub struct CustodyServices {
    config: CustodyConfig,
    dispatcher: Dispatcher,
    products: Products,
    contacts: Contacts,
    assignments: Assignments,
    inventory: Arc<dyn InventoryEngine>,
    warehouses: Arc<dyn WarehouseRegistry>,
    sequence: Arc<dyn SequenceGenerator>,
    claims: AssignmentClaims,
}

impl CustodyServices {
    /// Wire in-memory stores and projections around an inventory collaborator.
    pub fn new<I>(config: CustodyConfig, inventory: Arc<I>) -> Self
    where
        I: InventoryEngine + WarehouseRegistry + 'static,
    {
        let store = Arc::new(InMemoryEventStore::new());
        let bus: Arc<JsonBus> = Arc::new(InMemoryEventBus::new());
        let sequence = Arc::new(InMemorySequence::from_config(&config));

        Self {
            dispatcher: CommandDispatcher::new(store, bus),
            products: ProductCatalogProjection::new(Arc::new(InMemoryCompanyStore::new())),
            contacts: ContactDirectoryProjection::new(Arc::new(InMemoryCompanyStore::new())),
            assignments: AssignmentsProjection::new(Arc::new(InMemoryCompanyStore::new())),
            inventory: inventory.clone(),
            warehouses: inventory,
            sequence,
            claims: AssignmentClaims::default(),
            config,
        }
    }

    pub fn with_sequence(mut self, sequence: Arc<dyn SequenceGenerator>) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn config(&self) -> &CustodyConfig {
        &self.config
    }

    /// The bus committed events are published on.
    pub fn bus(&self) -> &Arc<JsonBus> {
        self.dispatcher.bus()
    }

    // Catalog and contacts

    pub fn register_product(&self, company_id: CompanyId, product: NewProduct) -> Result<ProductId, ServiceError> {
        let product_id = ProductId::generate();
        self.dispatch_product(
            company_id,
            product_id,
            ProductCommand::CreateProduct(CreateProduct {
                company_id,
                product_id,
                sku: product.sku,
                name: product.name,
                tracking: product.tracking,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(company = %company_id, product = %product_id, "product registered");
        Ok(product_id)
    }

    pub fn change_product_tracking(
        &self,
        company_id: CompanyId,
        product_id: ProductId,
        tracking: TrackingMode,
    ) -> Result<(), ServiceError> {
        self.dispatch_product(
            company_id,
            product_id,
            ProductCommand::ChangeTracking(ChangeTracking {
                company_id,
                product_id,
                tracking,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    /// Archived products stay resolvable for existing lines.
    pub fn archive_product(&self, company_id: CompanyId, product_id: ProductId) -> Result<(), ServiceError> {
        self.dispatch_product(
            company_id,
            product_id,
            ProductCommand::ArchiveProduct(ArchiveProduct {
                company_id,
                product_id,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn product(&self, company_id: CompanyId, product_id: ProductId) -> Option<ProductReadModel> {
        self.products.product(company_id, product_id)
    }

    pub fn register_contact(
        &self,
        company_id: CompanyId,
        name: impl Into<String>,
        info: Option<ContactInfo>,
    ) -> Result<ContactId, ServiceError> {
        let contact_id = ContactId::generate();
        self.dispatch_contact(
            company_id,
            contact_id,
            ContactCommand::RegisterContact(RegisterContact {
                company_id,
                contact_id,
                name: name.into(),
                info,
                outbound_location: None,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(company = %company_id, contact = %contact_id, "contact registered");
        Ok(contact_id)
    }

    pub fn update_contact(
        &self,
        company_id: CompanyId,
        contact_id: ContactId,
        name: Option<String>,
        info: Option<ContactInfo>,
    ) -> Result<(), ServiceError> {
        self.dispatch_contact(
            company_id,
            contact_id,
            ContactCommand::UpdateDetails(UpdateDetails {
                company_id,
                contact_id,
                name,
                info,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn set_contact_outbound_location(
        &self,
        company_id: CompanyId,
        contact_id: ContactId,
        location: Option<LocationId>,
    ) -> Result<(), ServiceError> {
        self.dispatch_contact(
            company_id,
            contact_id,
            ContactCommand::SetOutboundLocation(SetOutboundLocation {
                company_id,
                contact_id,
                location,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn contact(&self, company_id: CompanyId, contact_id: ContactId) -> Option<ContactReadModel> {
        self.contacts.contact(company_id, contact_id)
    }

    // Assignments

    pub fn create_assignment(
        &self,
        company_id: CompanyId,
        created_by: UserId,
        new: NewAssignment,
    ) -> Result<AssignmentReadModel, ServiceError> {
        if self.contacts.contact(company_id, new.contact_id).is_none() {
            return Err(ServiceError::UnknownContact(new.contact_id));
        }
        let lines = new
            .lines
            .into_iter()
            .map(|l| self.resolve_line(company_id, l))
            .collect::<Result<Vec<_>, _>>()?;

        let code = self
            .sequence
            .next_by_code(company_id, ASSIGNMENT_SEQUENCE)
            .unwrap_or_else(|| FALLBACK_CODE.to_string());

        let assignment_id = AssignmentId::generate();
        self.dispatch_assignment(
            company_id,
            assignment_id,
            AssignmentCommand::CreateAssignment(CreateAssignment {
                company_id,
                assignment_id,
                code: code.clone(),
                contact_id: new.contact_id,
                created_by,
                lines,
                notes: new.notes,
                occurred_at: Utc::now(),
            }),
        )?;

        tracing::info!(company = %company_id, assignment = %assignment_id, %code, "assignment created");
        self.get(company_id, assignment_id)
    }

    pub fn add_line(
        &self,
        company_id: CompanyId,
        assignment_id: AssignmentId,
        line: NewLine,
    ) -> Result<AssignmentReadModel, ServiceError> {
        let line = self.resolve_line(company_id, line)?;
        self.dispatch_assignment(
            company_id,
            assignment_id,
            AssignmentCommand::AddLine(AddLine {
                company_id,
                assignment_id,
                line,
                occurred_at: Utc::now(),
            }),
        )?;
        self.get(company_id, assignment_id)
    }

    pub fn update_line(
        &self,
        company_id: CompanyId,
        assignment_id: AssignmentId,
        line_no: u32,
        line: NewLine,
    ) -> Result<AssignmentReadModel, ServiceError> {
        let line = self.resolve_line(company_id, line)?;
        self.dispatch_assignment(
            company_id,
            assignment_id,
            AssignmentCommand::UpdateLine(UpdateLine {
                company_id,
                assignment_id,
                line_no,
                line,
                occurred_at: Utc::now(),
            }),
        )?;
        self.get(company_id, assignment_id)
    }

    pub fn remove_line(
        &self,
        company_id: CompanyId,
        assignment_id: AssignmentId,
        line_no: u32,
    ) -> Result<AssignmentReadModel, ServiceError> {
        self.dispatch_assignment(
            company_id,
            assignment_id,
            AssignmentCommand::RemoveLine(RemoveLine {
                company_id,
                assignment_id,
                line_no,
                occurred_at: Utc::now(),
            }),
        )?;
        self.get(company_id, assignment_id)
    }

    pub fn update_notes(
        &self,
        company_id: CompanyId,
        assignment_id: AssignmentId,
        notes: Option<String>,
    ) -> Result<AssignmentReadModel, ServiceError> {
        self.dispatch_assignment(
            company_id,
            assignment_id,
            AssignmentCommand::UpdateNotes(UpdateNotes {
                company_id,
                assignment_id,
                notes,
                occurred_at: Utc::now(),
            }),
        )?;
        self.get(company_id, assignment_id)
    }

    pub fn attach_file(
        &self,
        company_id: CompanyId,
        assignment_id: AssignmentId,
        attachment_id: AttachmentId,
    ) -> Result<AssignmentReadModel, ServiceError> {
        self.dispatch_assignment(
            company_id,
            assignment_id,
            AssignmentCommand::AttachFile(AttachFile {
                company_id,
                assignment_id,
                attachment_id,
                occurred_at: Utc::now(),
            }),
        )?;
        self.get(company_id, assignment_id)
    }

    pub fn detach_file(
        &self,
        company_id: CompanyId,
        assignment_id: AssignmentId,
        attachment_id: AttachmentId,
    ) -> Result<AssignmentReadModel, ServiceError> {
        self.dispatch_assignment(
            company_id,
            assignment_id,
            AssignmentCommand::DetachFile(DetachFile {
                company_id,
                assignment_id,
                attachment_id,
                occurred_at: Utc::now(),
            }),
        )?;
        self.get(company_id, assignment_id)
    }

    /// Draft → assigned. Any other state is left as is.
    pub fn assign(&self, company_id: CompanyId, assignment_id: AssignmentId) -> Result<AssignmentReadModel, ServiceError> {
        let committed = self.dispatch_assignment(
            company_id,
            assignment_id,
            AssignmentCommand::MarkAssigned(MarkAssigned {
                company_id,
                assignment_id,
                occurred_at: Utc::now(),
            }),
        )?;
        if !committed.is_empty() {
            tracing::info!(company = %company_id, assignment = %assignment_id, "assignment assigned");
        }
        self.get(company_id, assignment_id)
    }

    /// Back to draft; moves and dates are kept.
    pub fn reset_to_draft(
        &self,
        company_id: CompanyId,
        assignment_id: AssignmentId,
    ) -> Result<AssignmentReadModel, ServiceError> {
        self.dispatch_assignment(
            company_id,
            assignment_id,
            AssignmentCommand::ResetToDraft(ResetToDraft {
                company_id,
                assignment_id,
                occurred_at: Utc::now(),
            }),
        )?;
        self.get(company_id, assignment_id)
    }

    pub fn delete(&self, company_id: CompanyId, assignment_id: AssignmentId) -> Result<(), ServiceError> {
        self.dispatch_assignment(
            company_id,
            assignment_id,
            AssignmentCommand::DeleteAssignment(DeleteAssignment {
                company_id,
                assignment_id,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(company = %company_id, assignment = %assignment_id, "assignment deleted");
        Ok(())
    }

    pub fn get(&self, company_id: CompanyId, assignment_id: AssignmentId) -> Result<AssignmentReadModel, ServiceError> {
        self.assignments
            .get(company_id, &assignment_id)
            .ok_or(ServiceError::NotFound)
    }

    /// Stock moves recorded on an assignment.
    pub fn assignment_moves(
        &self,
        company_id: CompanyId,
        assignment_id: AssignmentId,
    ) -> Result<Vec<StockMove>, ServiceError> {
        let assignment = self.get(company_id, assignment_id)?;
        Ok(self.inventory.moves(company_id, &assignment.stock_moves)?)
    }

    /// Assignments whose code or contact name matches `term`, ordered by code.
    ///
    /// `limit` defaults to the configured search limit.
    pub fn name_search(
        &self,
        company_id: CompanyId,
        term: &str,
        operator: Option<SearchOperator>,
        limit: Option<usize>,
    ) -> Vec<AssignmentHit> {
        let search = NameSearch::new(term)
            .with_operator(operator.unwrap_or_default())
            .with_limit(Some(limit.unwrap_or(self.config.search_limit)));

        let candidates = self.assignments.list(company_id).into_iter().map(|a| {
            let contact_name = self
                .contacts
                .contact(company_id, a.contact_id)
                .map(|c| c.name)
                .unwrap_or_default();
            SearchCandidate {
                code: a.code.clone(),
                contact_name: contact_name.clone(),
                value: AssignmentHit {
                    assignment_id: a.assignment_id,
                    code: a.code,
                    contact_name,
                },
            }
        });

        search.run(candidates)
    }

    pub fn list_assignments(&self, company_id: CompanyId, filter: &AssignmentFilter) -> Vec<AssignmentReadModel> {
        self.assignments.list_filtered(company_id, filter)
    }

    /// Number of (non-deleted) assignments of a contact.
    pub fn contact_assignment_count(&self, company_id: CompanyId, contact_id: ContactId) -> usize {
        self.assignments.count_for_contact(company_id, contact_id)
    }

    /// Navigation from a contact to its assignments.
    pub fn view_assignments_action(
        &self,
        company_id: CompanyId,
        contact_id: ContactId,
    ) -> Result<WindowAction, ServiceError> {
        if self.contacts.contact(company_id, contact_id).is_none() {
            return Err(ServiceError::UnknownContact(contact_id));
        }
        Ok(view_assignments_action(company_id, contact_id))
    }

    /// Drop and rebuild every read model of a company from the event store.
    pub fn rebuild_read_models(&self, company_id: CompanyId) -> Result<(), ServiceError> {
        let events = self
            .dispatcher
            .store()
            .company_events(company_id)
            .map_err(DispatchError::from)?;
        let envelopes: Vec<_> = events.iter().map(StoredEvent::to_envelope).collect();

        self.products.rebuild(company_id, envelopes.iter().cloned())?;
        self.contacts.rebuild(company_id, envelopes.iter().cloned())?;
        self.assignments.rebuild(company_id, envelopes)?;
        tracing::info!(company = %company_id, events = events.len(), "read models rebuilt");
        Ok(())
    }

    // Internals

    fn resolve_line(&self, company_id: CompanyId, line: NewLine) -> Result<LineDraft, ServiceError> {
        let product = self
            .products
            .product(company_id, line.product_id)
            .filter(|p| p.status == ProductStatus::Active)
            .ok_or(ServiceError::UnknownProduct(line.product_id))?;

        Ok(LineDraft {
            product_id: line.product_id,
            product_name: product.display_name(),
            tracking: product.tracking,
            quantity: line.quantity,
            serial_number: line.serial_number,
            warranty_serial: line.warranty_serial,
            purchase_date: line.purchase_date,
        })
    }

    fn load_assignment(&self, company_id: CompanyId, assignment_id: AssignmentId) -> Result<Assignment, ServiceError> {
        let assignment = self
            .dispatcher
            .load(company_id, assignment_id.0, |_, id| Assignment::empty(AssignmentId::new(id)))?;
        if !assignment.is_created() || assignment.is_deleted() {
            return Err(ServiceError::NotFound);
        }
        Ok(assignment)
    }

    fn project(&self, committed: &[StoredEvent]) -> Result<(), ServiceError> {
        for stored in committed {
            let envelope = stored.to_envelope();
            self.products.apply_envelope(&envelope)?;
            self.contacts.apply_envelope(&envelope)?;
            self.assignments.apply_envelope(&envelope)?;
        }
        Ok(())
    }

    fn dispatch_product(
        &self,
        company_id: CompanyId,
        product_id: ProductId,
        command: ProductCommand,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        let committed = self
            .dispatcher
            .dispatch(company_id, product_id.0, PRODUCT_AGGREGATE, command, |_, id| {
                Product::empty(ProductId::new(id))
            })
            .map_err(not_found)?;
        self.project(&committed)?;
        Ok(committed)
    }

    fn dispatch_contact(
        &self,
        company_id: CompanyId,
        contact_id: ContactId,
        command: ContactCommand,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        let committed = self
            .dispatcher
            .dispatch(company_id, contact_id.0, CONTACT_AGGREGATE, command, |_, id| {
                Contact::empty(ContactId::new(id))
            })
            .map_err(not_found)?;
        self.project(&committed)?;
        Ok(committed)
    }

    fn dispatch_assignment(
        &self,
        company_id: CompanyId,
        assignment_id: AssignmentId,
        command: AssignmentCommand,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        let _claim = self.claims.claim(company_id, assignment_id)?;
        self.commit_assignment(company_id, assignment_id, command)
    }

    /// Dispatch without claiming; the caller holds the assignment's claim.
    fn commit_assignment(
        &self,
        company_id: CompanyId,
        assignment_id: AssignmentId,
        command: AssignmentCommand,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        let committed = self
            .dispatcher
            .dispatch(company_id, assignment_id.0, ASSIGNMENT_AGGREGATE, command, |_, id| {
                Assignment::empty(AssignmentId::new(id))
            })
            .map_err(not_found)?;
        self.project(&committed)?;
        Ok(committed)
    }
}

fn not_found(err: DispatchError) -> ServiceError {
    match err {
        DispatchError::NotFound => ServiceError::NotFound,
        other => ServiceError::Dispatch(other),
    }
}

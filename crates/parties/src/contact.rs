use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use custody_core::{Aggregate, AggregateRoot, CompanyId, DomainError};
use custody_events::Event;
use custody_stock::LocationId;

custody_core::aggregate_id_newtype!(
    /// Contact identifier (company-scoped via `company_id` fields in events/commands).
    ContactId
);

/// Contact information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Aggregate root: Contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    id: ContactId,
    company_id: Option<CompanyId>,
    name: String,
    info: ContactInfo,
    outbound_location: Option<LocationId>,
    version: u64,
    created: bool,
}

impl Contact {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ContactId) -> Self {
        Self {
            id,
            company_id: None,
            name: String::new(),
            info: ContactInfo::default(),
            outbound_location: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ContactId {
        self.id
    }

    pub fn company_id(&self) -> Option<CompanyId> {
        self.company_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &ContactInfo {
        &self.info
    }

    /// Location that stock handed to this contact is moved to.
    pub fn outbound_location(&self) -> Option<LocationId> {
        self.outbound_location
    }
}

impl AggregateRoot for Contact {
    type Id = ContactId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterContact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterContact {
    pub company_id: CompanyId,
    pub contact_id: ContactId,
    pub name: String,
    pub info: Option<ContactInfo>,
    pub outbound_location: Option<LocationId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateDetails (unset fields keep their value).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub company_id: CompanyId,
    pub contact_id: ContactId,
    pub name: Option<String>,
    pub info: Option<ContactInfo>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetOutboundLocation (`None` clears it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOutboundLocation {
    pub company_id: CompanyId,
    pub contact_id: ContactId,
    pub location: Option<LocationId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactCommand {
    RegisterContact(RegisterContact),
    UpdateDetails(UpdateDetails),
    SetOutboundLocation(SetOutboundLocation),
}

/// Event: ContactRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRegistered {
    pub company_id: CompanyId,
    pub contact_id: ContactId,
    pub name: String,
    pub info: ContactInfo,
    pub outbound_location: Option<LocationId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ContactUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUpdated {
    pub company_id: CompanyId,
    pub contact_id: ContactId,
    pub name: String,
    pub info: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OutboundLocationSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundLocationSet {
    pub company_id: CompanyId,
    pub contact_id: ContactId,
    pub location: Option<LocationId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactEvent {
    ContactRegistered(ContactRegistered),
    ContactUpdated(ContactUpdated),
    OutboundLocationSet(OutboundLocationSet),
}

impl ContactEvent {
    pub fn company_id(&self) -> CompanyId {
        match self {
            ContactEvent::ContactRegistered(e) => e.company_id,
            ContactEvent::ContactUpdated(e) => e.company_id,
            ContactEvent::OutboundLocationSet(e) => e.company_id,
        }
    }

    pub fn contact_id(&self) -> ContactId {
        match self {
            ContactEvent::ContactRegistered(e) => e.contact_id,
            ContactEvent::ContactUpdated(e) => e.contact_id,
            ContactEvent::OutboundLocationSet(e) => e.contact_id,
        }
    }
}

impl Event for ContactEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ContactEvent::ContactRegistered(_) => "parties.contact.registered",
            ContactEvent::ContactUpdated(_) => "parties.contact.updated",
            ContactEvent::OutboundLocationSet(_) => "parties.contact.outbound_location_set",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ContactEvent::ContactRegistered(e) => e.occurred_at,
            ContactEvent::ContactUpdated(e) => e.occurred_at,
            ContactEvent::OutboundLocationSet(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Contact {
    type Command = ContactCommand;
    type Event = ContactEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ContactEvent::ContactRegistered(e) => {
                self.id = e.contact_id;
                self.company_id = Some(e.company_id);
                self.name = e.name.clone();
                self.info = e.info.clone();
                self.outbound_location = e.outbound_location;
                self.created = true;
            }
            ContactEvent::ContactUpdated(e) => {
                self.name = e.name.clone();
                self.info = e.info.clone();
            }
            ContactEvent::OutboundLocationSet(e) => {
                self.outbound_location = e.location;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ContactCommand::RegisterContact(cmd) => self.handle_register(cmd),
            ContactCommand::UpdateDetails(cmd) => self.handle_update(cmd),
            ContactCommand::SetOutboundLocation(cmd) => self.handle_set_outbound(cmd),
        }
    }
}

impl Contact {
    fn ensure_existing(&self, company_id: CompanyId, contact_id: ContactId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.company_id != Some(company_id) {
            return Err(DomainError::invariant("company mismatch"));
        }
        if self.id != contact_id {
            return Err(DomainError::invariant("contact_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterContact) -> Result<Vec<ContactEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("contact already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![ContactEvent::ContactRegistered(ContactRegistered {
            company_id: cmd.company_id,
            contact_id: cmd.contact_id,
            name: cmd.name.trim().to_string(),
            info: cmd.info.clone().unwrap_or_default(),
            outbound_location: cmd.outbound_location,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateDetails) -> Result<Vec<ContactEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.contact_id)?;

        let name = cmd.name.clone().unwrap_or_else(|| self.name.clone());
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let info = cmd.info.clone().unwrap_or_else(|| self.info.clone());

        Ok(vec![ContactEvent::ContactUpdated(ContactUpdated {
            company_id: cmd.company_id,
            contact_id: cmd.contact_id,
            name: name.trim().to_string(),
            info,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_outbound(&self, cmd: &SetOutboundLocation) -> Result<Vec<ContactEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.contact_id)?;

        if self.outbound_location == cmd.location {
            return Ok(vec![]);
        }

        Ok(vec![ContactEvent::OutboundLocationSet(OutboundLocationSet {
            company_id: cmd.company_id,
            contact_id: cmd.contact_id,
            location: cmd.location,
            occurred_at: cmd.occurred_at,
        })])
    }
}

//! Contact-side navigation to assignments.

use serde::{Deserialize, Serialize};

use custody_core::CompanyId;
use custody_parties::ContactId;

use crate::assignment::AssignmentState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    List,
    Form,
}

/// Which assignments a listing shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentFilter {
    pub company_id: Option<CompanyId>,
    pub contact_id: Option<ContactId>,
    pub state: Option<AssignmentState>,
}

impl AssignmentFilter {
    pub fn for_contact(company_id: CompanyId, contact_id: ContactId) -> Self {
        Self {
            company_id: Some(company_id),
            contact_id: Some(contact_id),
            state: None,
        }
    }

    pub fn with_state(mut self, state: AssignmentState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn matches(&self, company_id: CompanyId, contact_id: ContactId, state: AssignmentState) -> bool {
        self.company_id.is_none_or(|c| c == company_id)
            && self.contact_id.is_none_or(|c| c == contact_id)
            && self.state.is_none_or(|s| s == state)
    }
}

/// Descriptor of a window the client opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowAction {
    pub title: String,
    pub view_modes: Vec<ViewMode>,
    pub filter: AssignmentFilter,
}

/// "Product Assignments" of one contact: list first, then form.
pub fn view_assignments_action(company_id: CompanyId, contact_id: ContactId) -> WindowAction {
    WindowAction {
        title: "Product Assignments".to_string(),
        view_modes: vec![ViewMode::List, ViewMode::Form],
        filter: AssignmentFilter::for_contact(company_id, contact_id),
    }
}

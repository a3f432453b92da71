//! Product assignment module (event-sourced).
//!
//! An assignment hands warehouse products to a contact. It is built in draft,
//! marked assigned, and completed once the stock moves delivering its lines
//! are done. Business rules live here as deterministic domain logic; resolving
//! stock, lots and locations is the caller's job (see `custody-infra`).

pub mod assignment;
pub mod line;
pub mod navigation;
pub mod search;

pub use assignment::{
    AddLine, Assignment, AssignmentAssigned, AssignmentCancelled, AssignmentCommand,
    AssignmentCompleted, AssignmentCreated, AssignmentDeleted, AssignmentEvent, AssignmentId,
    AssignmentResetToDraft, AssignmentState, AttachFile, AttachmentAdded, AttachmentId,
    AttachmentRemoved, CancelAssignment, CompleteAssignment, CreateAssignment, DeleteAssignment,
    DetachFile, LineAdded, LineRemoved, LineUpdated, MarkAssigned, NotesUpdated, RemoveLine,
    ResetToDraft, UpdateLine, UpdateNotes,
};
pub use line::{AssignmentLine, LineDraft};
pub use navigation::{AssignmentFilter, ViewMode, WindowAction, view_assignments_action};
pub use search::{DEFAULT_SEARCH_LIMIT, NameSearch, SearchCandidate, SearchOperator};

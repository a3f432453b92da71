use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use custody_core::{Aggregate, AggregateRoot, CompanyId, DomainError, UserId};
use custody_events::Event;
use custody_parties::ContactId;
use custody_stock::StockMoveId;

use crate::line::{AssignmentLine, LineDraft};

custody_core::aggregate_id_newtype!(
    /// Assignment identifier.
    AssignmentId
);

custody_core::aggregate_id_newtype!(
    /// Reference into the generic attachment store.
    AttachmentId
);

/// Assignment lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentState {
    #[default]
    Draft,
    Assigned,
    Done,
    Cancel,
}

impl AssignmentState {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentState::Draft => "draft",
            AssignmentState::Assigned => "assigned",
            AssignmentState::Done => "done",
            AssignmentState::Cancel => "cancel",
        }
    }

    /// Lines may be added, changed or removed.
    pub fn lines_editable(self) -> bool {
        matches!(self, AssignmentState::Draft | AssignmentState::Assigned)
    }
}

impl core::fmt::Display for AssignmentState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: Assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    id: AssignmentId,
    company_id: Option<CompanyId>,
    code: String,
    contact_id: Option<ContactId>,
    assignment_date: Option<NaiveDate>,
    state: AssignmentState,
    lines: Vec<AssignmentLine>,
    next_line_no: u32,
    stock_moves: Vec<StockMoveId>,
    notes: Option<String>,
    attachments: Vec<AttachmentId>,
    created_by: Option<UserId>,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Assignment {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: AssignmentId) -> Self {
        Self {
            id,
            company_id: None,
            code: String::new(),
            contact_id: None,
            assignment_date: None,
            state: AssignmentState::Draft,
            lines: Vec::new(),
            next_line_no: 1,
            stock_moves: Vec::new(),
            notes: None,
            attachments: Vec::new(),
            created_by: None,
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> AssignmentId {
        self.id
    }

    pub fn company_id(&self) -> Option<CompanyId> {
        self.company_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn contact_id(&self) -> Option<ContactId> {
        self.contact_id
    }

    pub fn assignment_date(&self) -> Option<NaiveDate> {
        self.assignment_date
    }

    pub fn state(&self) -> AssignmentState {
        self.state
    }

    pub fn lines(&self) -> &[AssignmentLine] {
        &self.lines
    }

    pub fn line(&self, line_no: u32) -> Option<&AssignmentLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }

    pub fn stock_moves(&self) -> &[StockMoveId] {
        &self.stock_moves
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn attachments(&self) -> &[AttachmentId] {
        &self.attachments
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Check the state preconditions of completion.
    ///
    /// Callers resolve stock and lots only after this passes.
    pub fn ensure_completable(&self) -> Result<(), DomainError> {
        if self.state != AssignmentState::Assigned {
            return Err(DomainError::invariant(
                "Only assignments in the \"Assigned\" state can be marked as \"Done\".",
            ));
        }
        if self.lines.is_empty() {
            return Err(DomainError::invariant(
                "You cannot mark as done an assignment with no product lines.",
            ));
        }
        Ok(())
    }

    pub fn ensure_cancellable(&self) -> Result<(), DomainError> {
        if self.state == AssignmentState::Done {
            return Err(DomainError::invariant(
                "You cannot cancel an assignment that is in the 'Done' state.",
            ));
        }
        Ok(())
    }
}

impl AggregateRoot for Assignment {
    type Id = AssignmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateAssignment.
///
/// `code` is resolved from the sequence by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAssignment {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub code: String,
    pub contact_id: ContactId,
    pub created_by: UserId,
    pub lines: Vec<LineDraft>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub line: LineDraft,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateLine (replaces the line's content, keeps its number).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLine {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub line_no: u32,
    pub line: LineDraft,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLine {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateNotes (`None` clears them).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNotes {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AttachFile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachFile {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub attachment_id: AttachmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DetachFile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachFile {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub attachment_id: AttachmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkAssigned (draft → assigned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkAssigned {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteAssignment (assigned → done).
///
/// Carries the ids of the stock moves already completed for the lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteAssignment {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub stock_moves: Vec<StockMoveId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelAssignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAssignment {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ResetToDraft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetToDraft {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteAssignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAssignment {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentCommand {
    CreateAssignment(CreateAssignment),
    AddLine(AddLine),
    UpdateLine(UpdateLine),
    RemoveLine(RemoveLine),
    UpdateNotes(UpdateNotes),
    AttachFile(AttachFile),
    DetachFile(DetachFile),
    MarkAssigned(MarkAssigned),
    CompleteAssignment(CompleteAssignment),
    CancelAssignment(CancelAssignment),
    ResetToDraft(ResetToDraft),
    DeleteAssignment(DeleteAssignment),
}

impl AssignmentCommand {
    pub fn company_id(&self) -> CompanyId {
        match self {
            AssignmentCommand::CreateAssignment(c) => c.company_id,
            AssignmentCommand::AddLine(c) => c.company_id,
            AssignmentCommand::UpdateLine(c) => c.company_id,
            AssignmentCommand::RemoveLine(c) => c.company_id,
            AssignmentCommand::UpdateNotes(c) => c.company_id,
            AssignmentCommand::AttachFile(c) => c.company_id,
            AssignmentCommand::DetachFile(c) => c.company_id,
            AssignmentCommand::MarkAssigned(c) => c.company_id,
            AssignmentCommand::CompleteAssignment(c) => c.company_id,
            AssignmentCommand::CancelAssignment(c) => c.company_id,
            AssignmentCommand::ResetToDraft(c) => c.company_id,
            AssignmentCommand::DeleteAssignment(c) => c.company_id,
        }
    }

    pub fn assignment_id(&self) -> AssignmentId {
        match self {
            AssignmentCommand::CreateAssignment(c) => c.assignment_id,
            AssignmentCommand::AddLine(c) => c.assignment_id,
            AssignmentCommand::UpdateLine(c) => c.assignment_id,
            AssignmentCommand::RemoveLine(c) => c.assignment_id,
            AssignmentCommand::UpdateNotes(c) => c.assignment_id,
            AssignmentCommand::AttachFile(c) => c.assignment_id,
            AssignmentCommand::DetachFile(c) => c.assignment_id,
            AssignmentCommand::MarkAssigned(c) => c.assignment_id,
            AssignmentCommand::CompleteAssignment(c) => c.assignment_id,
            AssignmentCommand::CancelAssignment(c) => c.assignment_id,
            AssignmentCommand::ResetToDraft(c) => c.assignment_id,
            AssignmentCommand::DeleteAssignment(c) => c.assignment_id,
        }
    }
}

/// Event: AssignmentCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentCreated {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub code: String,
    pub contact_id: ContactId,
    pub created_by: UserId,
    pub lines: Vec<AssignmentLine>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAdded {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub line: AssignmentLine,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineUpdated {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub line: AssignmentLine,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRemoved {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: NotesUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotesUpdated {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AttachmentAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentAdded {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub attachment_id: AttachmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AttachmentRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRemoved {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub attachment_id: AttachmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AssignmentAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentAssigned {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub assignment_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AssignmentCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentCompleted {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub stock_moves: Vec<StockMoveId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AssignmentCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentCancelled {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub previous_state: AssignmentState,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AssignmentResetToDraft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentResetToDraft {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub previous_state: AssignmentState,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AssignmentDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentDeleted {
    pub company_id: CompanyId,
    pub assignment_id: AssignmentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentEvent {
    AssignmentCreated(AssignmentCreated),
    LineAdded(LineAdded),
    LineUpdated(LineUpdated),
    LineRemoved(LineRemoved),
    NotesUpdated(NotesUpdated),
    AttachmentAdded(AttachmentAdded),
    AttachmentRemoved(AttachmentRemoved),
    AssignmentAssigned(AssignmentAssigned),
    AssignmentCompleted(AssignmentCompleted),
    AssignmentCancelled(AssignmentCancelled),
    AssignmentResetToDraft(AssignmentResetToDraft),
    AssignmentDeleted(AssignmentDeleted),
}

impl AssignmentEvent {
    pub fn company_id(&self) -> CompanyId {
        match self {
            AssignmentEvent::AssignmentCreated(e) => e.company_id,
            AssignmentEvent::LineAdded(e) => e.company_id,
            AssignmentEvent::LineUpdated(e) => e.company_id,
            AssignmentEvent::LineRemoved(e) => e.company_id,
            AssignmentEvent::NotesUpdated(e) => e.company_id,
            AssignmentEvent::AttachmentAdded(e) => e.company_id,
            AssignmentEvent::AttachmentRemoved(e) => e.company_id,
            AssignmentEvent::AssignmentAssigned(e) => e.company_id,
            AssignmentEvent::AssignmentCompleted(e) => e.company_id,
            AssignmentEvent::AssignmentCancelled(e) => e.company_id,
            AssignmentEvent::AssignmentResetToDraft(e) => e.company_id,
            AssignmentEvent::AssignmentDeleted(e) => e.company_id,
        }
    }

    pub fn assignment_id(&self) -> AssignmentId {
        match self {
            AssignmentEvent::AssignmentCreated(e) => e.assignment_id,
            AssignmentEvent::LineAdded(e) => e.assignment_id,
            AssignmentEvent::LineUpdated(e) => e.assignment_id,
            AssignmentEvent::LineRemoved(e) => e.assignment_id,
            AssignmentEvent::NotesUpdated(e) => e.assignment_id,
            AssignmentEvent::AttachmentAdded(e) => e.assignment_id,
            AssignmentEvent::AttachmentRemoved(e) => e.assignment_id,
            AssignmentEvent::AssignmentAssigned(e) => e.assignment_id,
            AssignmentEvent::AssignmentCompleted(e) => e.assignment_id,
            AssignmentEvent::AssignmentCancelled(e) => e.assignment_id,
            AssignmentEvent::AssignmentResetToDraft(e) => e.assignment_id,
            AssignmentEvent::AssignmentDeleted(e) => e.assignment_id,
        }
    }
}

impl Event for AssignmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AssignmentEvent::AssignmentCreated(_) => "assignments.assignment.created",
            AssignmentEvent::LineAdded(_) => "assignments.assignment.line_added",
            AssignmentEvent::LineUpdated(_) => "assignments.assignment.line_updated",
            AssignmentEvent::LineRemoved(_) => "assignments.assignment.line_removed",
            AssignmentEvent::NotesUpdated(_) => "assignments.assignment.notes_updated",
            AssignmentEvent::AttachmentAdded(_) => "assignments.assignment.attachment_added",
            AssignmentEvent::AttachmentRemoved(_) => "assignments.assignment.attachment_removed",
            AssignmentEvent::AssignmentAssigned(_) => "assignments.assignment.assigned",
            AssignmentEvent::AssignmentCompleted(_) => "assignments.assignment.completed",
            AssignmentEvent::AssignmentCancelled(_) => "assignments.assignment.cancelled",
            AssignmentEvent::AssignmentResetToDraft(_) => "assignments.assignment.reset_to_draft",
            AssignmentEvent::AssignmentDeleted(_) => "assignments.assignment.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AssignmentEvent::AssignmentCreated(e) => e.occurred_at,
            AssignmentEvent::LineAdded(e) => e.occurred_at,
            AssignmentEvent::LineUpdated(e) => e.occurred_at,
            AssignmentEvent::LineRemoved(e) => e.occurred_at,
            AssignmentEvent::NotesUpdated(e) => e.occurred_at,
            AssignmentEvent::AttachmentAdded(e) => e.occurred_at,
            AssignmentEvent::AttachmentRemoved(e) => e.occurred_at,
            AssignmentEvent::AssignmentAssigned(e) => e.occurred_at,
            AssignmentEvent::AssignmentCompleted(e) => e.occurred_at,
            AssignmentEvent::AssignmentCancelled(e) => e.occurred_at,
            AssignmentEvent::AssignmentResetToDraft(e) => e.occurred_at,
            AssignmentEvent::AssignmentDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Assignment {
    type Command = AssignmentCommand;
    type Event = AssignmentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AssignmentEvent::AssignmentCreated(e) => {
                self.id = e.assignment_id;
                self.company_id = Some(e.company_id);
                self.code = e.code.clone();
                self.contact_id = Some(e.contact_id);
                self.created_by = Some(e.created_by);
                self.lines = e.lines.clone();
                self.next_line_no = next_line_no_after(&self.lines);
                self.notes = e.notes.clone();
                self.state = AssignmentState::Draft;
                self.created = true;
            }
            AssignmentEvent::LineAdded(e) => {
                self.next_line_no = self.next_line_no.max(e.line.line_no + 1);
                self.lines.push(e.line.clone());
            }
            AssignmentEvent::LineUpdated(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == e.line.line_no) {
                    *line = e.line.clone();
                }
            }
            AssignmentEvent::LineRemoved(e) => {
                self.lines.retain(|l| l.line_no != e.line_no);
            }
            AssignmentEvent::NotesUpdated(e) => {
                self.notes = e.notes.clone();
            }
            AssignmentEvent::AttachmentAdded(e) => {
                self.attachments.push(e.attachment_id);
            }
            AssignmentEvent::AttachmentRemoved(e) => {
                self.attachments.retain(|a| *a != e.attachment_id);
            }
            AssignmentEvent::AssignmentAssigned(e) => {
                self.state = AssignmentState::Assigned;
                self.assignment_date = Some(e.assignment_date);
            }
            AssignmentEvent::AssignmentCompleted(e) => {
                self.stock_moves = e.stock_moves.clone();
                self.state = AssignmentState::Done;
            }
            AssignmentEvent::AssignmentCancelled(_) => {
                self.state = AssignmentState::Cancel;
            }
            AssignmentEvent::AssignmentResetToDraft(_) => {
                self.state = AssignmentState::Draft;
            }
            AssignmentEvent::AssignmentDeleted(_) => {
                self.lines.clear();
                self.attachments.clear();
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AssignmentCommand::CreateAssignment(cmd) => self.handle_create(cmd),
            AssignmentCommand::AddLine(cmd) => self.handle_add_line(cmd),
            AssignmentCommand::UpdateLine(cmd) => self.handle_update_line(cmd),
            AssignmentCommand::RemoveLine(cmd) => self.handle_remove_line(cmd),
            AssignmentCommand::UpdateNotes(cmd) => self.handle_update_notes(cmd),
            AssignmentCommand::AttachFile(cmd) => self.handle_attach(cmd),
            AssignmentCommand::DetachFile(cmd) => self.handle_detach(cmd),
            AssignmentCommand::MarkAssigned(cmd) => self.handle_assign(cmd),
            AssignmentCommand::CompleteAssignment(cmd) => self.handle_complete(cmd),
            AssignmentCommand::CancelAssignment(cmd) => self.handle_cancel(cmd),
            AssignmentCommand::ResetToDraft(cmd) => self.handle_reset(cmd),
            AssignmentCommand::DeleteAssignment(cmd) => self.handle_delete(cmd),
        }
    }
}

fn next_line_no_after(lines: &[AssignmentLine]) -> u32 {
    lines.iter().map(|l| l.line_no).max().unwrap_or(0) + 1
}

fn normalize_notes(notes: &Option<String>) -> Option<String> {
    notes
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl Assignment {
    fn ensure_existing(&self, company_id: CompanyId, assignment_id: AssignmentId) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        if self.company_id != Some(company_id) {
            return Err(DomainError::invariant("company mismatch"));
        }
        if self.id != assignment_id {
            return Err(DomainError::invariant("assignment_id mismatch"));
        }
        Ok(())
    }

    fn ensure_lines_editable(&self) -> Result<(), DomainError> {
        if !self.state.lines_editable() {
            return Err(DomainError::invariant(format!(
                "cannot modify lines of an assignment in state '{}'",
                self.state
            )));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateAssignment) -> Result<Vec<AssignmentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("assignment already exists"));
        }
        if cmd.code.trim().is_empty() {
            return Err(DomainError::validation("code cannot be empty"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("You must add at least one product line."));
        }

        let lines = cmd
            .lines
            .iter()
            .cloned()
            .zip(1u32..)
            .map(|(draft, line_no)| draft.into_line(line_no))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(vec![AssignmentEvent::AssignmentCreated(AssignmentCreated {
            company_id: cmd.company_id,
            assignment_id: cmd.assignment_id,
            code: cmd.code.trim().to_string(),
            contact_id: cmd.contact_id,
            created_by: cmd.created_by,
            lines,
            notes: normalize_notes(&cmd.notes),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<AssignmentEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.assignment_id)?;
        self.ensure_lines_editable()?;

        let line = cmd.line.clone().into_line(self.next_line_no)?;

        Ok(vec![AssignmentEvent::LineAdded(LineAdded {
            company_id: cmd.company_id,
            assignment_id: cmd.assignment_id,
            line,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_line(&self, cmd: &UpdateLine) -> Result<Vec<AssignmentEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.assignment_id)?;
        self.ensure_lines_editable()?;
        if self.line(cmd.line_no).is_none() {
            return Err(DomainError::validation(format!("line {} does not exist", cmd.line_no)));
        }

        let line = cmd.line.clone().into_line(cmd.line_no)?;

        Ok(vec![AssignmentEvent::LineUpdated(LineUpdated {
            company_id: cmd.company_id,
            assignment_id: cmd.assignment_id,
            line,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_line(&self, cmd: &RemoveLine) -> Result<Vec<AssignmentEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.assignment_id)?;
        self.ensure_lines_editable()?;
        if self.line(cmd.line_no).is_none() {
            return Err(DomainError::validation(format!("line {} does not exist", cmd.line_no)));
        }
        if self.lines.len() == 1 {
            return Err(DomainError::validation("You must add at least one product line."));
        }

        Ok(vec![AssignmentEvent::LineRemoved(LineRemoved {
            company_id: cmd.company_id,
            assignment_id: cmd.assignment_id,
            line_no: cmd.line_no,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_notes(&self, cmd: &UpdateNotes) -> Result<Vec<AssignmentEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.assignment_id)?;

        let notes = normalize_notes(&cmd.notes);
        if notes == self.notes {
            return Ok(vec![]);
        }

        Ok(vec![AssignmentEvent::NotesUpdated(NotesUpdated {
            company_id: cmd.company_id,
            assignment_id: cmd.assignment_id,
            notes,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_attach(&self, cmd: &AttachFile) -> Result<Vec<AssignmentEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.assignment_id)?;

        if self.attachments.contains(&cmd.attachment_id) {
            return Ok(vec![]);
        }

        Ok(vec![AssignmentEvent::AttachmentAdded(AttachmentAdded {
            company_id: cmd.company_id,
            assignment_id: cmd.assignment_id,
            attachment_id: cmd.attachment_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_detach(&self, cmd: &DetachFile) -> Result<Vec<AssignmentEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.assignment_id)?;

        if !self.attachments.contains(&cmd.attachment_id) {
            return Err(DomainError::validation("attachment is not linked to this assignment"));
        }

        Ok(vec![AssignmentEvent::AttachmentRemoved(AttachmentRemoved {
            company_id: cmd.company_id,
            assignment_id: cmd.assignment_id,
            attachment_id: cmd.attachment_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign(&self, cmd: &MarkAssigned) -> Result<Vec<AssignmentEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.assignment_id)?;

        // Only draft assignments move; any other state is left untouched.
        if self.state != AssignmentState::Draft {
            return Ok(vec![]);
        }

        Ok(vec![AssignmentEvent::AssignmentAssigned(AssignmentAssigned {
            company_id: cmd.company_id,
            assignment_id: cmd.assignment_id,
            assignment_date: cmd.occurred_at.date_naive(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &CompleteAssignment) -> Result<Vec<AssignmentEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.assignment_id)?;
        self.ensure_completable()?;

        if cmd.stock_moves.len() != self.lines.len() {
            return Err(DomainError::invariant(format!(
                "expected one stock move per line ({} lines, {} moves)",
                self.lines.len(),
                cmd.stock_moves.len()
            )));
        }

        Ok(vec![AssignmentEvent::AssignmentCompleted(AssignmentCompleted {
            company_id: cmd.company_id,
            assignment_id: cmd.assignment_id,
            stock_moves: cmd.stock_moves.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelAssignment) -> Result<Vec<AssignmentEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.assignment_id)?;
        self.ensure_cancellable()?;

        if self.state == AssignmentState::Cancel {
            return Ok(vec![]);
        }

        Ok(vec![AssignmentEvent::AssignmentCancelled(AssignmentCancelled {
            company_id: cmd.company_id,
            assignment_id: cmd.assignment_id,
            previous_state: self.state,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reset(&self, cmd: &ResetToDraft) -> Result<Vec<AssignmentEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.assignment_id)?;

        match self.state {
            AssignmentState::Done => Err(DomainError::invariant(
                "You cannot reset to draft an assignment that is in the 'Done' state.",
            )),
            AssignmentState::Draft => Ok(vec![]),
            previous_state => Ok(vec![AssignmentEvent::AssignmentResetToDraft(AssignmentResetToDraft {
                company_id: cmd.company_id,
                assignment_id: cmd.assignment_id,
                previous_state,
                occurred_at: cmd.occurred_at,
            })]),
        }
    }

    fn handle_delete(&self, cmd: &DeleteAssignment) -> Result<Vec<AssignmentEvent>, DomainError> {
        self.ensure_existing(cmd.company_id, cmd.assignment_id)?;

        if self.state == AssignmentState::Done {
            return Err(DomainError::invariant(
                "You cannot delete an assignment that is in the 'Done' state.",
            ));
        }

        Ok(vec![AssignmentEvent::AssignmentDeleted(AssignmentDeleted {
            company_id: cmd.company_id,
            assignment_id: cmd.assignment_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}


#[cfg(test)]
mod properties {
    use super::*;
    use custody_core::Quantity;
    use custody_events::execute;
    use custody_products::{ProductId, TrackingMode};
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Step {
        Assign,
        Complete,
        Cancel,
        Reset,
        AddLine(i64),
        RemoveFirstLine,
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            Just(Step::Assign),
            Just(Step::Complete),
            Just(Step::Cancel),
            Just(Step::Reset),
            (-2i64..5).prop_map(Step::AddLine),
            Just(Step::RemoveFirstLine),
        ]
    }

    fn line(qty: i64) -> LineDraft {
        LineDraft {
            product_id: ProductId::generate(),
            product_name: "Widget".to_string(),
            tracking: TrackingMode::None,
            quantity: Quantity::from(qty),
            serial_number: None,
            warranty_serial: None,
            purchase_date: None,
        }
    }

    fn command(a: &Assignment, company_id: CompanyId, step: &Step) -> AssignmentCommand {
        let assignment_id = a.id_typed();
        let occurred_at = Utc::now();
        match step {
            Step::Assign => AssignmentCommand::MarkAssigned(MarkAssigned {
                company_id,
                assignment_id,
                occurred_at,
            }),
            Step::Complete => AssignmentCommand::CompleteAssignment(CompleteAssignment {
                company_id,
                assignment_id,
                stock_moves: a.lines().iter().map(|_| StockMoveId::generate()).collect(),
                occurred_at,
            }),
            Step::Cancel => AssignmentCommand::CancelAssignment(CancelAssignment {
                company_id,
                assignment_id,
                occurred_at,
            }),
            Step::Reset => AssignmentCommand::ResetToDraft(ResetToDraft {
                company_id,
                assignment_id,
                occurred_at,
            }),
            Step::AddLine(qty) => AssignmentCommand::AddLine(AddLine {
                company_id,
                assignment_id,
                line: line(*qty),
                occurred_at,
            }),
            Step::RemoveFirstLine => AssignmentCommand::RemoveLine(RemoveLine {
                company_id,
                assignment_id,
                line_no: a.lines().first().map(|l| l.line_no).unwrap_or(0),
                occurred_at,
            }),
        }
    }

    proptest! {
        #[test]
        fn lifecycle_invariants_hold(steps in proptest::collection::vec(step(), 0..40)) {
            let company_id = CompanyId::new();
            let assignment_id = AssignmentId::generate();
            let mut a = Assignment::empty(assignment_id);
            execute(&mut a, &AssignmentCommand::CreateAssignment(CreateAssignment {
                company_id,
                assignment_id,
                code: "ASG/00001".to_string(),
                contact_id: ContactId::generate(),
                created_by: UserId::new(),
                lines: vec![line(1)],
                notes: None,
                occurred_at: Utc::now(),
            })).unwrap();

            let mut events_applied = 1u64;
            for s in &steps {
                let before = a.clone();
                let cmd = command(&a, company_id, s);
                match a.handle(&cmd) {
                    Ok(events) => {
                        // Replaying the decided events on a copy yields the same state.
                        let mut replay = before.clone();
                        for e in &events {
                            a.apply(e);
                            replay.apply(e);
                        }
                        prop_assert_eq!(&replay, &a);
                        events_applied += events.len() as u64;
                    }
                    Err(_) => prop_assert_eq!(&before, &a),
                }

                prop_assert!(!a.lines().is_empty());
                prop_assert_eq!(a.version(), events_applied);
                let mut numbers: Vec<u32> = a.lines().iter().map(|l| l.line_no).collect();
                let len = numbers.len();
                numbers.dedup();
                prop_assert_eq!(numbers.len(), len);
                if a.state() == AssignmentState::Done {
                    prop_assert_eq!(a.stock_moves().len(), a.lines().len());
                }
            }
        }
    }
}

//! BOM version lifecycle (approval state machine).
//!
//! ```text
//! DRAFT --submit--> PENDING_APPROVAL --approve (unanimous)--> APPROVED --activate--> ACTIVE
//!                          |                                                          |
//!                          +--reject (any approver)--> REJECTED        supersede --> SUPERSEDED
//! ```
//!
//! Legal moves live in [`transition`]; the aggregate only adds the actor rules on top
//! (approver membership, unanimity, idempotent re-approval).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loomerp_core::{Aggregate, AggregateRoot, DomainError, UserId};
use loomerp_events::Event;

use crate::model::{BomId, BomLine, BomVersionId};

/// Version status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
    Active,
    Superseded,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::Draft => "DRAFT",
            VersionStatus::PendingApproval => "PENDING_APPROVAL",
            VersionStatus::Approved => "APPROVED",
            VersionStatus::Rejected => "REJECTED",
            VersionStatus::Active => "ACTIVE",
            VersionStatus::Superseded => "SUPERSEDED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VersionStatus::Rejected | VersionStatus::Superseded)
    }
}

impl core::fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionAction {
    EditLines,
    Submit,
    Approve,
    Reject,
    Activate,
    Supersede,
}

impl VersionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionAction::EditLines => "edit lines",
            VersionAction::Submit => "submit for approval",
            VersionAction::Approve => "approve",
            VersionAction::Reject => "reject",
            VersionAction::Activate => "activate",
            VersionAction::Supersede => "supersede",
        }
    }
}

/// Transition table: `status × action → status reached when the action completes`.
///
/// For `Approve` the target is only reached once every approver has approved; until
/// then the version stays `PendingApproval`.
pub fn transition(status: VersionStatus, action: VersionAction) -> Option<VersionStatus> {
    use VersionAction as A;
    use VersionStatus as S;

    match (status, action) {
        (S::Draft, A::EditLines) => Some(S::Draft),
        (S::Draft, A::Submit) => Some(S::PendingApproval),
        (S::PendingApproval, A::Approve) => Some(S::Approved),
        (S::PendingApproval, A::Reject) => Some(S::Rejected),
        (S::Approved, A::Activate) => Some(S::Active),
        (S::Active, A::Supersede) => Some(S::Superseded),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

/// One approver's recorded decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub actor: UserId,
    pub decision: ApprovalDecision,
    pub comment: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Aggregate root: BomVersion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BomVersion {
    id: BomVersionId,
    bom_id: BomId,
    label: String,
    description: String,
    created_by: Option<UserId>,
    created_at: Option<DateTime<Utc>>,
    status: VersionStatus,
    approvers: Vec<UserId>,
    decisions: Vec<ApprovalRecord>,
    submitted_at: Option<DateTime<Utc>>,
    effective_from: Option<DateTime<Utc>>,
    superseded_by: Option<BomVersionId>,
    version: u64,
    created: bool,
}

impl BomVersion {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: BomVersionId, bom_id: BomId) -> Self {
        Self {
            id,
            bom_id,
            label: String::new(),
            description: String::new(),
            created_by: None,
            created_at: None,
            status: VersionStatus::Draft,
            approvers: Vec::new(),
            decisions: Vec::new(),
            submitted_at: None,
            effective_from: None,
            superseded_by: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> BomVersionId {
        self.id
    }

    pub fn bom_id(&self) -> BomId {
        self.bom_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn status(&self) -> VersionStatus {
        self.status
    }

    pub fn approvers(&self) -> &[UserId] {
        &self.approvers
    }

    pub fn decisions(&self) -> &[ApprovalRecord] {
        &self.decisions
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    pub fn effective_from(&self) -> Option<DateTime<Utc>> {
        self.effective_from
    }

    pub fn superseded_by(&self) -> Option<BomVersionId> {
        self.superseded_by
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn has_approved(&self, actor: UserId) -> bool {
        self.decisions
            .iter()
            .any(|d| d.actor == actor && d.decision == ApprovalDecision::Approved)
    }

    /// Designated approvers that have not approved yet.
    pub fn outstanding_approvers(&self) -> Vec<UserId> {
        self.approvers
            .iter()
            .copied()
            .filter(|a| !self.has_approved(*a))
            .collect()
    }

    /// Fail with `VersionLocked` unless lines may still change.
    pub fn ensure_editable(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(
                loomerp_core::EntityKind::BomVersion,
                self.id,
            ));
        }
        match transition(self.status, VersionAction::EditLines) {
            Some(_) => Ok(()),
            None => Err(DomainError::VersionLocked {
                version_id: self.id.to_string(),
                status: self.status.to_string(),
            }),
        }
    }
}

impl AggregateRoot for BomVersion {
    type Id = BomVersionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateVersion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVersion {
    pub version_id: BomVersionId,
    pub bom_id: BomId,
    pub label: String,
    pub description: String,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitForApproval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitForApproval {
    pub version_id: BomVersionId,
    pub approvers: Vec<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approve {
    pub version_id: BomVersionId,
    pub actor: UserId,
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Reject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reject {
    pub version_id: BomVersionId,
    pub actor: UserId,
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Activate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activate {
    pub version_id: BomVersionId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Supersede (issued for the previous ACTIVE version during activation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supersede {
    pub version_id: BomVersionId,
    pub superseded_by: BomVersionId,
    pub occurred_at: DateTime<Utc>,
}

/// A single edit to a draft's line list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineChange {
    Added { line: BomLine },
    Updated { line: BomLine },
    Removed { line_no: u32 },
}

impl LineChange {
    pub fn line_no(&self) -> u32 {
        match self {
            LineChange::Added { line } | LineChange::Updated { line } => line.line_no,
            LineChange::Removed { line_no } => *line_no,
        }
    }
}

/// Command: ReviseLines (line content is checked by the caller against the stored lines).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviseLines {
    pub version_id: BomVersionId,
    pub change: LineChange,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionCommand {
    CreateVersion(CreateVersion),
    ReviseLines(ReviseLines),
    SubmitForApproval(SubmitForApproval),
    Approve(Approve),
    Reject(Reject),
    Activate(Activate),
    Supersede(Supersede),
}

impl VersionCommand {
    pub fn version_id(&self) -> BomVersionId {
        match self {
            VersionCommand::CreateVersion(c) => c.version_id,
            VersionCommand::ReviseLines(c) => c.version_id,
            VersionCommand::SubmitForApproval(c) => c.version_id,
            VersionCommand::Approve(c) => c.version_id,
            VersionCommand::Reject(c) => c.version_id,
            VersionCommand::Activate(c) => c.version_id,
            VersionCommand::Supersede(c) => c.version_id,
        }
    }
}

/// Event: VersionCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCreated {
    pub version_id: BomVersionId,
    pub bom_id: BomId,
    pub label: String,
    pub description: String,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LinesRevised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinesRevised {
    pub version_id: BomVersionId,
    pub change: LineChange,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SubmittedForApproval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedForApproval {
    pub version_id: BomVersionId,
    pub approvers: Vec<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ApprovalRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecorded {
    pub version_id: BomVersionId,
    pub actor: UserId,
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VersionApproved (the last outstanding approval arrived).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionApproved {
    pub version_id: BomVersionId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VersionRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRejected {
    pub version_id: BomVersionId,
    pub actor: UserId,
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VersionActivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionActivated {
    pub version_id: BomVersionId,
    pub bom_id: BomId,
    pub effective_from: DateTime<Utc>,
}

/// Event: VersionSuperseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSuperseded {
    pub version_id: BomVersionId,
    pub bom_id: BomId,
    pub superseded_by: BomVersionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionEvent {
    VersionCreated(VersionCreated),
    LinesRevised(LinesRevised),
    SubmittedForApproval(SubmittedForApproval),
    ApprovalRecorded(ApprovalRecorded),
    VersionApproved(VersionApproved),
    VersionRejected(VersionRejected),
    VersionActivated(VersionActivated),
    VersionSuperseded(VersionSuperseded),
}

impl Event for VersionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            VersionEvent::VersionCreated(_) => "bom.version.created",
            VersionEvent::LinesRevised(_) => "bom.version.lines_revised",
            VersionEvent::SubmittedForApproval(_) => "bom.version.submitted",
            VersionEvent::ApprovalRecorded(_) => "bom.version.approval_recorded",
            VersionEvent::VersionApproved(_) => "bom.version.approved",
            VersionEvent::VersionRejected(_) => "bom.version.rejected",
            VersionEvent::VersionActivated(_) => "bom.version.activated",
            VersionEvent::VersionSuperseded(_) => "bom.version.superseded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            VersionEvent::VersionCreated(e) => e.occurred_at,
            VersionEvent::LinesRevised(e) => e.occurred_at,
            VersionEvent::SubmittedForApproval(e) => e.occurred_at,
            VersionEvent::ApprovalRecorded(e) => e.occurred_at,
            VersionEvent::VersionApproved(e) => e.occurred_at,
            VersionEvent::VersionRejected(e) => e.occurred_at,
            VersionEvent::VersionActivated(e) => e.effective_from,
            VersionEvent::VersionSuperseded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for BomVersion {
    type Command = VersionCommand;
    type Event = VersionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            VersionEvent::VersionCreated(e) => {
                self.id = e.version_id;
                self.bom_id = e.bom_id;
                self.label = e.label.clone();
                self.description = e.description.clone();
                self.created_by = Some(e.created_by);
                self.created_at = Some(e.occurred_at);
                self.status = VersionStatus::Draft;
                self.created = true;
            }
            VersionEvent::LinesRevised(_) => {}
            VersionEvent::SubmittedForApproval(e) => {
                self.approvers = e.approvers.clone();
                self.decisions.clear();
                self.submitted_at = Some(e.occurred_at);
                self.status = VersionStatus::PendingApproval;
            }
            VersionEvent::ApprovalRecorded(e) => {
                self.decisions.push(ApprovalRecord {
                    actor: e.actor,
                    decision: ApprovalDecision::Approved,
                    comment: e.comment.clone(),
                    recorded_at: e.occurred_at,
                });
            }
            VersionEvent::VersionApproved(_) => {
                self.status = VersionStatus::Approved;
            }
            VersionEvent::VersionRejected(e) => {
                self.decisions.push(ApprovalRecord {
                    actor: e.actor,
                    decision: ApprovalDecision::Rejected,
                    comment: e.comment.clone(),
                    recorded_at: e.occurred_at,
                });
                self.status = VersionStatus::Rejected;
            }
            VersionEvent::VersionActivated(e) => {
                self.effective_from = Some(e.effective_from);
                self.status = VersionStatus::Active;
            }
            VersionEvent::VersionSuperseded(e) => {
                self.superseded_by = Some(e.superseded_by);
                self.status = VersionStatus::Superseded;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            VersionCommand::CreateVersion(cmd) => self.handle_create(cmd),
            VersionCommand::ReviseLines(cmd) => self.handle_revise(cmd),
            VersionCommand::SubmitForApproval(cmd) => self.handle_submit(cmd),
            VersionCommand::Approve(cmd) => self.handle_approve(cmd),
            VersionCommand::Reject(cmd) => self.handle_reject(cmd),
            VersionCommand::Activate(cmd) => self.handle_activate(cmd),
            VersionCommand::Supersede(cmd) => self.handle_supersede(cmd),
        }
    }
}

impl BomVersion {
    fn ensure_version_id(&self, version_id: BomVersionId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(
                loomerp_core::EntityKind::BomVersion,
                version_id,
            ));
        }
        if self.id != version_id {
            return Err(DomainError::invariant("version_id mismatch"));
        }
        Ok(())
    }

    fn ensure_transition(&self, action: VersionAction) -> Result<VersionStatus, DomainError> {
        transition(self.status, action).ok_or_else(|| DomainError::InvalidStateTransition {
            version_id: self.id.to_string(),
            status: self.status.to_string(),
            action: action.as_str().to_string(),
        })
    }

    fn ensure_approver(&self, actor: UserId) -> Result<(), DomainError> {
        if !self.approvers.contains(&actor) {
            return Err(DomainError::UnauthorizedApprover {
                version_id: self.id.to_string(),
                actor: actor.to_string(),
            });
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateVersion) -> Result<Vec<VersionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::invariant(format!(
                "bom version {} already exists",
                cmd.version_id
            )));
        }
        let label = cmd.label.trim();
        if label.is_empty() {
            return Err(DomainError::invalid_input("version label cannot be empty"));
        }
        Ok(vec![VersionEvent::VersionCreated(VersionCreated {
            version_id: cmd.version_id,
            bom_id: cmd.bom_id,
            label: label.to_string(),
            description: cmd.description.trim().to_string(),
            created_by: cmd.created_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revise(&self, cmd: &ReviseLines) -> Result<Vec<VersionEvent>, DomainError> {
        self.ensure_version_id(cmd.version_id)?;
        self.ensure_editable()?;

        Ok(vec![VersionEvent::LinesRevised(LinesRevised {
            version_id: cmd.version_id,
            change: cmd.change.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitForApproval) -> Result<Vec<VersionEvent>, DomainError> {
        self.ensure_version_id(cmd.version_id)?;
        self.ensure_transition(VersionAction::Submit)?;

        // Distinct approvers, first occurrence wins the position.
        let mut approvers: Vec<UserId> = Vec::with_capacity(cmd.approvers.len());
        for a in &cmd.approvers {
            if !approvers.contains(a) {
                approvers.push(*a);
            }
        }
        if approvers.is_empty() {
            return Err(DomainError::EmptyApproverList {
                version_id: self.id.to_string(),
            });
        }

        Ok(vec![VersionEvent::SubmittedForApproval(SubmittedForApproval {
            version_id: cmd.version_id,
            approvers,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &Approve) -> Result<Vec<VersionEvent>, DomainError> {
        self.ensure_version_id(cmd.version_id)?;
        self.ensure_approver(cmd.actor)?;

        // Repeating a standing approval is a no-op, also once the round has completed.
        if self.status != VersionStatus::Rejected && self.has_approved(cmd.actor) {
            return Ok(vec![]);
        }
        self.ensure_transition(VersionAction::Approve)?;

        let mut events = vec![VersionEvent::ApprovalRecorded(ApprovalRecorded {
            version_id: cmd.version_id,
            actor: cmd.actor,
            comment: cmd.comment.clone(),
            occurred_at: cmd.occurred_at,
        })];

        let outstanding = self.outstanding_approvers();
        if outstanding.len() == 1 && outstanding[0] == cmd.actor {
            events.push(VersionEvent::VersionApproved(VersionApproved {
                version_id: cmd.version_id,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_reject(&self, cmd: &Reject) -> Result<Vec<VersionEvent>, DomainError> {
        self.ensure_version_id(cmd.version_id)?;
        self.ensure_transition(VersionAction::Reject)?;
        self.ensure_approver(cmd.actor)?;

        Ok(vec![VersionEvent::VersionRejected(VersionRejected {
            version_id: cmd.version_id,
            actor: cmd.actor,
            comment: cmd.comment.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_activate(&self, cmd: &Activate) -> Result<Vec<VersionEvent>, DomainError> {
        self.ensure_version_id(cmd.version_id)?;
        self.ensure_transition(VersionAction::Activate)?;

        Ok(vec![VersionEvent::VersionActivated(VersionActivated {
            version_id: cmd.version_id,
            bom_id: self.bom_id,
            effective_from: cmd.occurred_at,
        })])
    }

    fn handle_supersede(&self, cmd: &Supersede) -> Result<Vec<VersionEvent>, DomainError> {
        self.ensure_version_id(cmd.version_id)?;
        self.ensure_transition(VersionAction::Supersede)?;
        if cmd.superseded_by == self.id {
            return Err(DomainError::invariant("a version cannot supersede itself"));
        }

        Ok(vec![VersionEvent::VersionSuperseded(VersionSuperseded {
            version_id: cmd.version_id,
            bom_id: self.bom_id,
            superseded_by: cmd.superseded_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}

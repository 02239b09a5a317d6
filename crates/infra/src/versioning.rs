//! Version lifecycle manager.
//!
//! Every write follows the same pipeline:
//!
//! ```text
//! read version (revision r)
//!   -> check caller's expected revision, if any
//!   -> BomVersion::handle (pure decision)
//!   -> conditional write, expecting r
//!   -> publish events
//! ```
//!
//! A write that loses against a concurrent change is surfaced as
//! `ConcurrentModification` and never retried here.

use chrono::Utc;
use tracing::{debug, info, warn};

use loomerp_bom::{
    Activate, Approve, Bom, BomId, BomLine, BomReader, BomVersion, BomVersionId, CreateVersion,
    LineChange, Reject, ReviseLines, SubmitForApproval, Supersede, TreeLoader, VersionCommand,
    VersionEvent,
};
use loomerp_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, EntityKind, ExpectedVersion,
    UserId,
};
use loomerp_events::{EventBus, EventEnvelope};

use crate::repository::{BomRepository, RepositoryError};

/// Aggregate type stamped on published envelopes.
pub const AGGREGATE_TYPE: &str = "bom.version";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBom {
    pub code: String,
    pub name: String,
    pub product_style: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVersion {
    pub bom_id: BomId,
    pub label: String,
    pub description: String,
    pub created_by: UserId,
}

/// A version together with its line list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionContent {
    pub version: BomVersion,
    pub lines: Vec<BomLine>,
}

pub struct VersionLifecycleManager<R, B> {
    repo: R,
    bus: B,
    max_depth: usize,
}

fn decide(version: &BomVersion, command: &VersionCommand) -> DomainResult<(BomVersion, Vec<VersionEvent>)> {
    let events = version.handle(command)?;
    let mut next = version.clone();
    next.apply_all(&events);
    Ok((next, events))
}

impl<R, B> VersionLifecycleManager<R, B>
where
    R: BomRepository,
    B: EventBus<EventEnvelope<VersionEvent>>,
    B::Error: core::fmt::Debug,
{
    pub fn new(repo: R, bus: B) -> Self {
        Self {
            repo,
            bus,
            max_depth: loomerp_bom::DEFAULT_MAX_DEPTH,
        }
    }

    /// Depth bound used by the eager cycle guard on sub-assembly lines.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn create_bom(&self, new: NewBom) -> DomainResult<Bom> {
        let bom = Bom::new(
            BomId::new(AggregateId::new()),
            new.code,
            new.name,
            new.product_style,
            Utc::now(),
        )?;
        self.repo.insert_bom(bom.clone())?;
        info!(bom_id = %bom.id, code = %bom.code, "bom created");
        Ok(bom)
    }

    pub fn bom(&self, bom_id: BomId) -> DomainResult<Bom> {
        self.repo.bom(bom_id)
    }

    /// Create a DRAFT version seeded with the ACTIVE version's lines (if any).
    pub fn create_version(&self, new: NewVersion) -> DomainResult<VersionContent> {
        self.repo.bom(new.bom_id)?;

        let version_id = BomVersionId::new(AggregateId::new());
        let command = VersionCommand::CreateVersion(CreateVersion {
            version_id,
            bom_id: new.bom_id,
            label: new.label,
            description: new.description,
            created_by: new.created_by,
            occurred_at: Utc::now(),
        });
        let (version, events) = decide(&BomVersion::empty(version_id, new.bom_id), &command)?;

        let lines = match self.repo.active_version(new.bom_id)? {
            Some(active) => self.repo.lines(active.id_typed())?,
            None => Vec::new(),
        };
        self.repo.insert_version(version.clone(), lines.clone())?;
        info!(
            bom_id = %new.bom_id,
            version_id = %version_id,
            label = version.label(),
            lines = lines.len(),
            "bom version created"
        );
        self.publish(&version, 0, events);
        Ok(VersionContent { version, lines })
    }

    pub fn submit_for_approval(
        &self,
        version_id: BomVersionId,
        approvers: Vec<UserId>,
        expected: Option<u64>,
    ) -> DomainResult<BomVersion> {
        self.transition(
            expected,
            VersionCommand::SubmitForApproval(SubmitForApproval {
                version_id,
                approvers,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn approve(
        &self,
        version_id: BomVersionId,
        actor: UserId,
        comment: Option<String>,
        expected: Option<u64>,
    ) -> DomainResult<BomVersion> {
        self.transition(
            expected,
            VersionCommand::Approve(Approve {
                version_id,
                actor,
                comment,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn reject(
        &self,
        version_id: BomVersionId,
        actor: UserId,
        comment: Option<String>,
        expected: Option<u64>,
    ) -> DomainResult<BomVersion> {
        self.transition(
            expected,
            VersionCommand::Reject(Reject {
                version_id,
                actor,
                comment,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Make an APPROVED version ACTIVE and supersede the previous ACTIVE one in the same
    /// commit.
    pub fn activate(&self, version_id: BomVersionId, expected: Option<u64>) -> DomainResult<BomVersion> {
        let (current, write_expectation) = self.load_for_write(version_id, expected)?;
        let now = Utc::now();
        let (activated, events) = decide(
            &current,
            &VersionCommand::Activate(Activate {
                version_id,
                occurred_at: now,
            }),
        )?;

        let superseded = match self.repo.active_version(current.bom_id())? {
            Some(previous) => {
                let command = VersionCommand::Supersede(Supersede {
                    version_id: previous.id_typed(),
                    superseded_by: version_id,
                    occurred_at: now,
                });
                let (next, events) = decide(&previous, &command)?;
                Some((previous.version(), next, events))
            }
            None => None,
        };

        self.repo
            .commit_activation(
                activated.clone(),
                write_expectation,
                superseded
                    .as_ref()
                    .map(|(revision, next, _)| (next.clone(), ExpectedVersion::Exact(*revision))),
            )
            .map_err(|err| self.rejected_write(version_id, err))?;

        info!(
            bom_id = %activated.bom_id(),
            version_id = %version_id,
            from = %current.status(),
            to = %activated.status(),
            "bom version activated"
        );
        self.publish(&activated, current.version(), events);
        if let Some((revision, next, events)) = superseded {
            info!(
                bom_id = %next.bom_id(),
                version_id = %next.id_typed(),
                superseded_by = %version_id,
                "bom version superseded"
            );
            self.publish(&next, revision, events);
        }
        Ok(activated)
    }

    pub fn add_line(
        &self,
        version_id: BomVersionId,
        line: BomLine,
        expected: Option<u64>,
    ) -> DomainResult<VersionContent> {
        let (current, write_expectation) = self.load_for_write(version_id, expected)?;
        current.ensure_editable()?;
        line.validate()?;

        let mut lines = self.repo.lines(version_id)?;
        if lines.iter().any(|existing| existing.line_no == line.line_no) {
            return Err(DomainError::invalid_input(format!(
                "line {} already exists in bom version {version_id}",
                line.line_no
            )));
        }
        self.guard_sub_bom(current.bom_id(), &line)?;

        lines.push(line.clone());
        self.revise(current, write_expectation, lines, LineChange::Added { line })
    }

    /// Replace line `line_no`; the stored line number is kept.
    pub fn update_line(
        &self,
        version_id: BomVersionId,
        line_no: u32,
        mut line: BomLine,
        expected: Option<u64>,
    ) -> DomainResult<VersionContent> {
        let (current, write_expectation) = self.load_for_write(version_id, expected)?;
        current.ensure_editable()?;
        line.line_no = line_no;
        line.validate()?;

        let mut lines = self.repo.lines(version_id)?;
        let slot = lines
            .iter_mut()
            .find(|existing| existing.line_no == line_no)
            .ok_or_else(|| DomainError::not_found(EntityKind::BomLine, format!("{version_id}#{line_no}")))?;
        *slot = line.clone();
        self.guard_sub_bom(current.bom_id(), &line)?;

        self.revise(current, write_expectation, lines, LineChange::Updated { line })
    }

    pub fn remove_line(
        &self,
        version_id: BomVersionId,
        line_no: u32,
        expected: Option<u64>,
    ) -> DomainResult<VersionContent> {
        let (current, write_expectation) = self.load_for_write(version_id, expected)?;
        current.ensure_editable()?;

        let mut lines = self.repo.lines(version_id)?;
        let before = lines.len();
        lines.retain(|existing| existing.line_no != line_no);
        if lines.len() == before {
            return Err(DomainError::not_found(
                EntityKind::BomLine,
                format!("{version_id}#{line_no}"),
            ));
        }

        self.revise(current, write_expectation, lines, LineChange::Removed { line_no })
    }

    /// The ACTIVE version of a BOM.
    pub fn current_version(&self, bom_id: BomId) -> DomainResult<BomVersion> {
        let bom = self.repo.bom(bom_id)?;
        self.repo
            .active_version(bom_id)?
            .ok_or_else(|| DomainError::not_found(EntityKind::ActiveVersion, bom.code))
    }

    pub fn get_version(&self, version_id: BomVersionId) -> DomainResult<VersionContent> {
        let version = self.repo.version(version_id)?;
        let lines = self.repo.lines(version_id)?;
        Ok(VersionContent { version, lines })
    }

    /// All versions of a BOM, oldest first.
    pub fn list_versions(&self, bom_id: BomId) -> DomainResult<Vec<BomVersion>> {
        self.repo.versions_of(bom_id)
    }

    fn load_for_write(
        &self,
        version_id: BomVersionId,
        expected: Option<u64>,
    ) -> DomainResult<(BomVersion, ExpectedVersion)> {
        let current = self.repo.version(version_id)?;
        if let Some(expected) = expected {
            ExpectedVersion::Exact(expected)
                .check(EntityKind::BomVersion, version_id, current.version())
                .inspect_err(|_| {
                    warn!(
                        version_id = %version_id,
                        expected,
                        actual = current.version(),
                        "stale bom version revision"
                    )
                })?;
        }
        let revision = current.version();
        Ok((current, ExpectedVersion::Exact(revision)))
    }

    fn transition(&self, expected: Option<u64>, command: VersionCommand) -> DomainResult<BomVersion> {
        let version_id = command.version_id();
        let (current, write_expectation) = self.load_for_write(version_id, expected)?;
        let (next, events) = decide(&current, &command)?;
        if events.is_empty() {
            debug!(version_id = %version_id, "bom version command was a no-op");
            return Ok(next);
        }

        self.repo
            .save_version(next.clone(), None, write_expectation)
            .map_err(|err| self.rejected_write(version_id, err))?;
        info!(
            version_id = %version_id,
            from = %current.status(),
            to = %next.status(),
            revision = next.version(),
            "bom version transition"
        );
        self.publish(&next, current.version(), events);
        Ok(next)
    }

    fn revise(
        &self,
        current: BomVersion,
        write_expectation: ExpectedVersion,
        lines: Vec<BomLine>,
        change: LineChange,
    ) -> DomainResult<VersionContent> {
        let version_id = current.id_typed();
        let line_no = change.line_no();
        let command = VersionCommand::ReviseLines(ReviseLines {
            version_id,
            change,
            occurred_at: Utc::now(),
        });
        let (next, events) = decide(&current, &command)?;

        self.repo
            .save_version(next.clone(), Some(lines.clone()), write_expectation)
            .map_err(|err| self.rejected_write(version_id, err))?;
        debug!(version_id = %version_id, line_no, lines = lines.len(), "bom version lines revised");
        self.publish(&next, current.version(), events);
        Ok(VersionContent {
            version: next,
            lines,
        })
    }

    /// Reject a sub-assembly line that would close a cycle through `owner_id`.
    ///
    /// The referenced BOM is checked at its ACTIVE content; a BOM without an ACTIVE
    /// version has no content to check yet.
    fn guard_sub_bom(&self, owner_id: BomId, line: &BomLine) -> DomainResult<()> {
        let Some(child_id) = line.sub_bom_id else {
            return Ok(());
        };
        let owner = self.repo.bom(owner_id)?;
        self.repo.bom(child_id)?;
        if child_id == owner_id {
            return Err(DomainError::CyclicReference {
                path: vec![owner.code.clone(), owner.code],
            });
        }

        let loaded = self.repo.read_consistent(|view| {
            TreeLoader::new(view)
                .with_max_depth(self.max_depth)
                .load(child_id, None)
        });
        match loaded {
            Ok(tree) => match tree.path_to(owner_id) {
                Some(rest) => {
                    let mut path = vec![owner.code];
                    path.extend(rest);
                    Err(DomainError::CyclicReference { path })
                }
                None => Ok(()),
            },
            Err(DomainError::NotFound {
                entity: EntityKind::ActiveVersion,
                ..
            }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn rejected_write(&self, version_id: BomVersionId, err: RepositoryError) -> DomainError {
        if let RepositoryError::Conflict { .. } = &err {
            warn!(version_id = %version_id, error = %err, "bom version write lost a concurrent update");
        }
        err.into()
    }

    fn publish(&self, version: &BomVersion, base_revision: u64, events: Vec<VersionEvent>) {
        let aggregate_id = version.id_typed().0;
        for (revision, event) in (base_revision + 1..).zip(events) {
            let envelope = EventEnvelope::wrap(aggregate_id, AGGREGATE_TYPE, revision, event);
            let event_type = envelope.event_type().to_string();
            if let Err(err) = self.bus.publish(envelope) {
                warn!(
                    version_id = %version.id_typed(),
                    event_type = %event_type,
                    error = ?err,
                    "failed to publish bom version event"
                );
            }
        }
    }
}

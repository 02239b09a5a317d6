use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use loomerp_bom::{
    Bom, BomId, BomLine, BomReader, BomVersion, BomVersionId, ConsistentRead, VersionStatus,
};
use loomerp_core::{AggregateRoot, DomainError, DomainResult, EntityKind, ExpectedVersion};

use super::{BomRepository, RepositoryError};

#[derive(Debug, Clone)]
struct StoredVersion {
    version: BomVersion,
    lines: Vec<BomLine>,
}

#[derive(Debug, Default)]
struct State {
    boms: HashMap<BomId, Bom>,
    codes: HashMap<String, BomId>,
    versions: HashMap<BomVersionId, StoredVersion>,
    /// Version ids per BOM in creation order.
    by_bom: HashMap<BomId, Vec<BomVersionId>>,
}

impl State {
    fn active_of(&self, bom_id: BomId) -> Option<&StoredVersion> {
        self.by_bom
            .get(&bom_id)?
            .iter()
            .filter_map(|id| self.versions.get(id))
            .find(|stored| stored.version.status() == VersionStatus::Active)
    }

    fn stored_mut(&mut self, id: BomVersionId) -> Result<&mut StoredVersion, RepositoryError> {
        self.versions.get_mut(&id).ok_or_else(|| RepositoryError::Missing {
            entity: EntityKind::BomVersion,
            id: id.to_string(),
        })
    }

    fn check_revision(&self, id: BomVersionId, expected: ExpectedVersion) -> Result<(), RepositoryError> {
        let stored = self.versions.get(&id).ok_or_else(|| RepositoryError::Missing {
            entity: EntityKind::BomVersion,
            id: id.to_string(),
        })?;
        let actual = stored.version.version();
        if !expected.matches(actual) {
            return Err(RepositoryError::Conflict {
                entity: EntityKind::BomVersion,
                id: id.to_string(),
                expected: expected_revision(expected, actual),
                actual,
            });
        }
        Ok(())
    }
}

fn expected_revision(expected: ExpectedVersion, actual: u64) -> u64 {
    match expected {
        ExpectedVersion::Exact(v) => v,
        ExpectedVersion::Any => actual,
    }
}

fn sorted(mut lines: Vec<BomLine>) -> Vec<BomLine> {
    lines.sort_by_key(|line| line.line_no);
    lines
}

/// In-memory BOM store.
///
/// A single `RwLock` guards all records, so each conditional write (including the
/// two-version activation commit) is applied entirely or not at all. Intended for
/// tests/dev and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryBomRepository {
    state: RwLock<State>,
}

impl InMemoryBomRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every registered header, ordered by code.
    pub fn boms(&self) -> DomainResult<Vec<Bom>> {
        let state = self.read()?;
        let mut boms: Vec<Bom> = state.boms.values().cloned().collect();
        boms.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(boms)
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| DomainError::storage("repository lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, RepositoryError> {
        self.state.write().map_err(|_| RepositoryError::Poisoned)
    }
}

/// Reads served from one locked [`State`].
struct StateView<'a>(&'a State);

impl BomReader for StateView<'_> {
    fn bom(&self, id: BomId) -> DomainResult<Bom> {
        self.0
            .boms
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(EntityKind::Bom, id))
    }

    fn version(&self, id: BomVersionId) -> DomainResult<BomVersion> {
        self.0
            .versions
            .get(&id)
            .map(|stored| stored.version.clone())
            .ok_or_else(|| DomainError::not_found(EntityKind::BomVersion, id))
    }

    fn active_version(&self, bom_id: BomId) -> DomainResult<Option<BomVersion>> {
        Ok(self.0.active_of(bom_id).map(|stored| stored.version.clone()))
    }

    fn versions_of(&self, bom_id: BomId) -> DomainResult<Vec<BomVersion>> {
        let state = self.0;
        if !state.boms.contains_key(&bom_id) {
            return Err(DomainError::not_found(EntityKind::Bom, bom_id));
        }
        Ok(state
            .by_bom
            .get(&bom_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.versions.get(id))
                    .map(|stored| stored.version.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn lines(&self, version_id: BomVersionId) -> DomainResult<Vec<BomLine>> {
        self.0
            .versions
            .get(&version_id)
            .map(|stored| stored.lines.clone())
            .ok_or_else(|| DomainError::not_found(EntityKind::BomVersion, version_id))
    }
}

impl BomReader for InMemoryBomRepository {
    fn bom(&self, id: BomId) -> DomainResult<Bom> {
        let state = self.read()?;
        StateView(&state).bom(id)
    }

    fn version(&self, id: BomVersionId) -> DomainResult<BomVersion> {
        let state = self.read()?;
        StateView(&state).version(id)
    }

    fn active_version(&self, bom_id: BomId) -> DomainResult<Option<BomVersion>> {
        let state = self.read()?;
        StateView(&state).active_version(bom_id)
    }

    fn versions_of(&self, bom_id: BomId) -> DomainResult<Vec<BomVersion>> {
        let state = self.read()?;
        StateView(&state).versions_of(bom_id)
    }

    fn lines(&self, version_id: BomVersionId) -> DomainResult<Vec<BomLine>> {
        let state = self.read()?;
        StateView(&state).lines(version_id)
    }
}

impl ConsistentRead for InMemoryBomRepository {
    /// Holds the read lock for the whole of `read`, so writers wait until it returns.
    fn read_consistent<T, F>(&self, read: F) -> DomainResult<T>
    where
        F: FnOnce(&dyn BomReader) -> DomainResult<T>,
    {
        let state = self.read()?;
        read(&StateView(&state))
    }
}

impl BomRepository for InMemoryBomRepository {
    fn insert_bom(&self, bom: Bom) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        if state.codes.contains_key(&bom.code) {
            return Err(RepositoryError::DuplicateBomCode(bom.code));
        }
        state.codes.insert(bom.code.clone(), bom.id);
        state.by_bom.entry(bom.id).or_default();
        state.boms.insert(bom.id, bom);
        Ok(())
    }

    fn insert_version(&self, version: BomVersion, lines: Vec<BomLine>) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        let bom_id = version.bom_id();
        if !state.boms.contains_key(&bom_id) {
            return Err(RepositoryError::Missing {
                entity: EntityKind::Bom,
                id: bom_id.to_string(),
            });
        }
        let label_taken = state
            .by_bom
            .get(&bom_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.versions.get(id))
            .any(|stored| stored.version.label() == version.label());
        if label_taken {
            return Err(RepositoryError::DuplicateVersionLabel {
                bom_id,
                label: version.label().to_string(),
            });
        }

        let id = version.id_typed();
        state.by_bom.entry(bom_id).or_default().push(id);
        state.versions.insert(
            id,
            StoredVersion {
                version,
                lines: sorted(lines),
            },
        );
        Ok(())
    }

    fn save_version(
        &self,
        version: BomVersion,
        lines: Option<Vec<BomLine>>,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        let id = version.id_typed();
        state.check_revision(id, expected)?;

        let stored = state.stored_mut(id)?;
        stored.version = version;
        if let Some(lines) = lines {
            stored.lines = sorted(lines);
        }
        Ok(())
    }

    fn commit_activation(
        &self,
        activated: BomVersion,
        expected: ExpectedVersion,
        superseded: Option<(BomVersion, ExpectedVersion)>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        let bom_id = activated.bom_id();
        let activated_id = activated.id_typed();
        state.check_revision(activated_id, expected)?;

        let current = state
            .active_of(bom_id)
            .map(|stored| (stored.version.id_typed(), stored.version.version()));
        let claimed = superseded
            .as_ref()
            .map(|(version, exp)| (version.id_typed(), *exp));
        match (current, claimed) {
            (None, None) => {}
            (Some((current_id, _)), Some((claimed_id, exp))) if current_id == claimed_id => {
                state.check_revision(claimed_id, exp)?;
            }
            (current, claimed) => {
                return Err(RepositoryError::Conflict {
                    entity: EntityKind::ActiveVersion,
                    id: bom_id.to_string(),
                    expected: claimed
                        .map(|(_, exp)| expected_revision(exp, 0))
                        .unwrap_or(0),
                    actual: current.map(|(_, revision)| revision).unwrap_or(0),
                });
            }
        }

        if let Some((previous, _)) = superseded {
            let previous_id = previous.id_typed();
            state.stored_mut(previous_id)?.version = previous;
        }
        state.stored_mut(activated_id)?.version = activated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use loomerp_bom::{
        Activate, Approve, CreateVersion, ItemId, SubmitForApproval, Supersede, UnitOfMeasure,
        VersionCommand,
    };
    use loomerp_core::{Aggregate, AggregateId, UserId};
    use rust_decimal_macros::dec;

    fn bom(code: &str) -> Bom {
        Bom::new(BomId::new(AggregateId::new()), code, "Tee", "TS-01", Utc::now()).unwrap()
    }

    fn step(version: &mut BomVersion, cmd: VersionCommand) {
        let events = version.handle(&cmd).unwrap();
        version.apply_all(&events);
    }

    fn draft(bom_id: BomId, label: &str) -> BomVersion {
        let id = BomVersionId::new(AggregateId::new());
        let mut v = BomVersion::empty(id, bom_id);
        step(
            &mut v,
            VersionCommand::CreateVersion(CreateVersion {
                version_id: id,
                bom_id,
                label: label.into(),
                description: String::new(),
                created_by: UserId::new(),
                occurred_at: Utc::now(),
            }),
        );
        v
    }

    fn approved(bom_id: BomId, label: &str) -> BomVersion {
        let mut v = draft(bom_id, label);
        let approver = UserId::new();
        let id = v.id_typed();
        step(
            &mut v,
            VersionCommand::SubmitForApproval(SubmitForApproval {
                version_id: id,
                approvers: vec![approver],
                occurred_at: Utc::now(),
            }),
        );
        step(
            &mut v,
            VersionCommand::Approve(Approve {
                version_id: id,
                actor: approver,
                comment: None,
                occurred_at: Utc::now(),
            }),
        );
        v
    }

    fn activated(mut v: BomVersion) -> BomVersion {
        let id = v.id_typed();
        step(
            &mut v,
            VersionCommand::Activate(Activate {
                version_id: id,
                occurred_at: Utc::now(),
            }),
        );
        v
    }

    fn superseded(mut v: BomVersion, by: BomVersionId) -> BomVersion {
        let id = v.id_typed();
        step(
            &mut v,
            VersionCommand::Supersede(Supersede {
                version_id: id,
                superseded_by: by,
                occurred_at: Utc::now(),
            }),
        );
        v
    }

    fn line(line_no: u32) -> BomLine {
        BomLine {
            line_no,
            item_id: ItemId::new("FAB"),
            uom: UnitOfMeasure::new("m"),
            quantity_per_unit: Some(dec!(1)),
            wastage_percent: dec!(0),
            note: None,
            is_optional: false,
            lead_time_days: None,
            sub_bom_id: None,
        }
    }

    #[test]
    fn bom_codes_are_unique() {
        let repo = InMemoryBomRepository::new();
        repo.insert_bom(bom("TEE")).unwrap();
        assert_eq!(
            repo.insert_bom(bom("TEE")).unwrap_err(),
            RepositoryError::DuplicateBomCode("TEE".into())
        );
    }

    #[test]
    fn version_labels_are_unique_per_bom() {
        let repo = InMemoryBomRepository::new();
        let (a, b) = (bom("A"), bom("B"));
        let (a_id, b_id) = (a.id, b.id);
        repo.insert_bom(a).unwrap();
        repo.insert_bom(b).unwrap();

        repo.insert_version(draft(a_id, "v1"), vec![]).unwrap();
        repo.insert_version(draft(b_id, "v1"), vec![]).unwrap();
        assert!(matches!(
            repo.insert_version(draft(a_id, "v1"), vec![]).unwrap_err(),
            RepositoryError::DuplicateVersionLabel { .. }
        ));
        assert_eq!(repo.versions_of(a_id).unwrap().len(), 1);
    }

    #[test]
    fn lines_come_back_in_line_order() {
        let repo = InMemoryBomRepository::new();
        let tee = bom("TEE");
        let tee_id = tee.id;
        repo.insert_bom(tee).unwrap();
        let v = draft(tee_id, "v1");
        let id = v.id_typed();
        repo.insert_version(v, vec![line(3), line(1), line(2)]).unwrap();

        let order: Vec<u32> = repo.lines(id).unwrap().iter().map(|l| l.line_no).collect();
        assert_eq!(order, [1, 2, 3]);
    }

    #[test]
    fn stale_save_is_rejected() {
        let repo = InMemoryBomRepository::new();
        let tee = bom("TEE");
        let tee_id = tee.id;
        repo.insert_bom(tee).unwrap();
        let v = draft(tee_id, "v1");
        let read = v.version();
        repo.insert_version(v.clone(), vec![]).unwrap();

        repo.save_version(v.clone(), Some(vec![line(1)]), ExpectedVersion::Exact(read))
            .unwrap();
        let err = repo
            .save_version(v, Some(vec![line(2)]), ExpectedVersion::Exact(read + 1))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict { expected, actual, .. } if expected == read + 1 && actual == read));
    }

    #[test]
    fn activation_swaps_the_active_version_atomically() {
        let repo = InMemoryBomRepository::new();
        let tee = bom("TEE");
        let tee_id = tee.id;
        repo.insert_bom(tee).unwrap();

        let v1 = approved(tee_id, "v1");
        repo.insert_version(v1.clone(), vec![]).unwrap();
        repo.commit_activation(activated(v1.clone()), ExpectedVersion::Exact(v1.version()), None)
            .unwrap();
        let v1_active = repo.version(v1.id_typed()).unwrap();

        let v2 = approved(tee_id, "v2");
        repo.insert_version(v2.clone(), vec![]).unwrap();
        repo.commit_activation(
            activated(v2.clone()),
            ExpectedVersion::Exact(v2.version()),
            Some((
                superseded(v1_active.clone(), v2.id_typed()),
                ExpectedVersion::Exact(v1_active.version()),
            )),
        )
        .unwrap();

        let active = repo.active_version(tee_id).unwrap().unwrap();
        assert_eq!(active.id_typed(), v2.id_typed());
        assert_eq!(
            repo.version(v1.id_typed()).unwrap().status(),
            VersionStatus::Superseded
        );
    }

    #[test]
    fn consistent_read_is_not_interleaved_with_an_activation() {
        use std::sync::{Arc, mpsc};
        use std::time::Duration;

        let repo = Arc::new(InMemoryBomRepository::new());
        let tee = bom("TEE");
        let tee_id = tee.id;
        repo.insert_bom(tee).unwrap();
        let v1 = approved(tee_id, "v1");
        repo.insert_version(v1.clone(), vec![line(1)]).unwrap();
        repo.commit_activation(activated(v1.clone()), ExpectedVersion::Exact(v1.version()), None)
            .unwrap();
        let v1_active = repo.version(v1.id_typed()).unwrap();
        let v2 = approved(tee_id, "v2");
        repo.insert_version(v2.clone(), vec![line(1), line(2)]).unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let (seen, writer) = repo
            .read_consistent(|view| {
                let before = view.active_version(tee_id)?.map(|v| v.id_typed());
                let writer = {
                    let repo = Arc::clone(&repo);
                    let v2 = v2.clone();
                    let v1_active = v1_active.clone();
                    std::thread::spawn(move || {
                        let result = repo.commit_activation(
                            activated(v2.clone()),
                            ExpectedVersion::Exact(v2.version()),
                            Some((
                                superseded(v1_active.clone(), v2.id_typed()),
                                ExpectedVersion::Exact(v1_active.version()),
                            )),
                        );
                        done_tx.send(()).unwrap();
                        result
                    })
                };
                assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());

                let after = view.active_version(tee_id)?.map(|v| v.id_typed());
                let lines = view.lines(v1.id_typed())?.len();
                Ok(((before, after, lines), writer))
            })
            .unwrap();

        assert_eq!(seen, (Some(v1.id_typed()), Some(v1.id_typed()), 1));
        writer.join().unwrap().unwrap();
        assert_eq!(
            repo.active_version(tee_id).unwrap().map(|v| v.id_typed()),
            Some(v2.id_typed())
        );
    }

    #[test]
    fn activation_against_an_unseen_active_version_writes_nothing() {
        let repo = InMemoryBomRepository::new();
        let tee = bom("TEE");
        let tee_id = tee.id;
        repo.insert_bom(tee).unwrap();

        let v1 = approved(tee_id, "v1");
        let v2 = approved(tee_id, "v2");
        repo.insert_version(v1.clone(), vec![]).unwrap();
        repo.insert_version(v2.clone(), vec![]).unwrap();

        repo.commit_activation(activated(v1.clone()), ExpectedVersion::Exact(v1.version()), None)
            .unwrap();
        // v2 was decided while nothing was active.
        let err = repo
            .commit_activation(activated(v2.clone()), ExpectedVersion::Exact(v2.version()), None)
            .unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Conflict {
                entity: EntityKind::ActiveVersion,
                ..
            }
        ));
        assert_eq!(
            repo.version(v2.id_typed()).unwrap().status(),
            VersionStatus::Approved
        );
        assert_eq!(
            repo.active_version(tee_id).unwrap().unwrap().id_typed(),
            v1.id_typed()
        );
    }
}

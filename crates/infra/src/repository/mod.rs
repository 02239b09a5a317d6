//! BOM persistence abstraction.
//!
//! Reads go through [`loomerp_bom::BomReader`], and multi-read walks through
//! [`ConsistentRead`]. Every write is conditional on the revision the caller
//! read (`ExpectedVersion`), so a stale read loses instead of overwriting.

mod in_memory;

pub use in_memory::InMemoryBomRepository;

use thiserror::Error;

use loomerp_bom::{Bom, BomId, BomLine, BomVersion, ConsistentRead};
use loomerp_core::{DomainError, EntityKind, ExpectedVersion};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The stored revision differs from the expected one.
    #[error("revision conflict on {entity} {id}: expected {expected}, found {actual}")]
    Conflict {
        entity: EntityKind,
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error("bom code '{0}' is already taken")]
    DuplicateBomCode(String),

    #[error("bom {bom_id} already has a version labelled '{label}'")]
    DuplicateVersionLabel { bom_id: BomId, label: String },

    #[error("{entity} {id} does not exist")]
    Missing { entity: EntityKind, id: String },

    #[error("repository lock poisoned")]
    Poisoned,
}

impl From<RepositoryError> for DomainError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict {
                entity,
                id,
                expected,
                actual,
            } => DomainError::ConcurrentModification {
                entity,
                id,
                expected,
                actual,
            },
            RepositoryError::DuplicateBomCode(code) => DomainError::DuplicateBomCode { code },
            RepositoryError::DuplicateVersionLabel { bom_id, label } => {
                DomainError::DuplicateVersionLabel {
                    bom_id: bom_id.to_string(),
                    label,
                }
            }
            RepositoryError::Missing { entity, id } => DomainError::NotFound { entity, id },
            RepositoryError::Poisoned => DomainError::storage("repository lock poisoned"),
        }
    }
}

/// Write side of BOM storage.
pub trait BomRepository: ConsistentRead {
    /// Register a header. Codes are unique.
    fn insert_bom(&self, bom: Bom) -> Result<(), RepositoryError>;

    /// Register a newly created version with its initial lines. Labels are unique per BOM.
    fn insert_version(&self, version: BomVersion, lines: Vec<BomLine>) -> Result<(), RepositoryError>;

    /// Replace a version (and, when given, its lines) if its stored revision matches.
    fn save_version(
        &self,
        version: BomVersion,
        lines: Option<Vec<BomLine>>,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError>;

    /// Store an activation and the supersession of the previously ACTIVE version as one unit.
    ///
    /// `superseded` must name the version that is ACTIVE in storage at commit time (or be
    /// `None` when nothing is); otherwise the whole commit is rejected as a conflict and
    /// nothing is written.
    fn commit_activation(
        &self,
        activated: BomVersion,
        expected: ExpectedVersion,
        superseded: Option<(BomVersion, ExpectedVersion)>,
    ) -> Result<(), RepositoryError>;
}

impl<R> BomRepository for std::sync::Arc<R>
where
    R: BomRepository + ?Sized,
{
    fn insert_bom(&self, bom: Bom) -> Result<(), RepositoryError> {
        (**self).insert_bom(bom)
    }

    fn insert_version(&self, version: BomVersion, lines: Vec<BomLine>) -> Result<(), RepositoryError> {
        (**self).insert_version(version, lines)
    }

    fn save_version(
        &self,
        version: BomVersion,
        lines: Option<Vec<BomLine>>,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError> {
        (**self).save_version(version, lines, expected)
    }

    fn commit_activation(
        &self,
        activated: BomVersion,
        expected: ExpectedVersion,
        superseded: Option<(BomVersion, ExpectedVersion)>,
    ) -> Result<(), RepositoryError> {
        (**self).commit_activation(activated, expected, superseded)
    }
}

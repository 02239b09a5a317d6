//! Domain error model.
//!
//! Every failure the engine can surface is a variant here, carrying enough structure
//! (entity kind, identifier, offending value) for a caller to render a precise message.
//! Nothing is defaulted or swallowed inside the engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Kinds of records an error can refer to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Bom,
    BomLine,
    BomVersion,
    /// The ACTIVE version of a BOM (absent when nothing has been activated yet).
    ActiveVersion,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Bom => "bom",
            EntityKind::BomLine => "bom line",
            EntityKind::BomVersion => "bom version",
            EntityKind::ActiveVersion => "active version",
        }
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a [`DomainError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed or out-of-range input; rejected before any work is done.
    InputValidation,
    /// The request is well formed but the current domain state forbids it.
    DomainState,
    /// Master data is missing or inconsistent.
    DataIntegrity,
    /// A stale read lost a race; the caller may re-read and retry.
    Concurrency,
    /// The backing store failed.
    Infrastructure,
}

/// Domain-level error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Client input was malformed (missing field, blank name, unparsable number).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A well-formed but negative production quantity.
    #[error("invalid quantity {quantity}: production quantity must be zero or positive")]
    InvalidQuantity { quantity: Decimal },

    /// An approval round was requested without any approvers.
    #[error("bom version {version_id} cannot be submitted without approvers")]
    EmptyApproverList { version_id: String },

    /// An identifier failed to parse.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A domain invariant on stored data was violated (e.g. line quantity <= 0).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A referenced record does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: String },

    /// Expanding a sub-BOM would revisit a BOM already on the current path.
    ///
    /// `path` lists BOM identifiers from the root down to (and including) the repeated one.
    #[error("cyclic bom reference: {}", path.join(" -> "))]
    CyclicReference { path: Vec<String> },

    /// The BOM graph is deeper than the configured maximum.
    #[error("bom {bom_id} exceeds the maximum tree depth of {max_depth}")]
    MaxDepthExceeded { bom_id: String, max_depth: usize },

    /// A lifecycle action is not permitted from the version's current status.
    #[error("bom version {version_id}: cannot {action} while {status}")]
    InvalidStateTransition {
        version_id: String,
        status: String,
        action: String,
    },

    /// Line content can only change while the owning version is a draft.
    #[error("bom version {version_id} is locked ({status}); lines can only change in draft")]
    VersionLocked { version_id: String, status: String },

    /// The acting user is not a designated approver of the version.
    #[error("user {actor} is not a designated approver of bom version {version_id}")]
    UnauthorizedApprover { version_id: String, actor: String },

    /// Version labels are unique per BOM.
    #[error("bom {bom_id} already has a version labelled '{label}'")]
    DuplicateVersionLabel { bom_id: String, label: String },

    /// BOM codes are globally unique.
    #[error("a bom with code '{code}' already exists")]
    DuplicateBomCode { code: String },

    /// The item catalog has no unit cost for an item required by a cost calculation.
    #[error("no unit cost found for item {item_id}")]
    ItemCostNotFound { item_id: String },

    /// An optimistic write lost against a concurrent modification.
    #[error("{entity} {id} was modified concurrently (expected revision {expected}, found {actual})")]
    ConcurrentModification {
        entity: EntityKind,
        id: String,
        expected: u64,
        actual: u64,
    },

    /// The backing store failed (poisoned lock, lost connection, ...).
    #[error("storage failure: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DomainError::InvalidInput(_)
            | DomainError::InvalidQuantity { .. }
            | DomainError::EmptyApproverList { .. }
            | DomainError::InvalidId(_) => ErrorCategory::InputValidation,

            DomainError::CyclicReference { .. }
            | DomainError::MaxDepthExceeded { .. }
            | DomainError::InvalidStateTransition { .. }
            | DomainError::VersionLocked { .. }
            | DomainError::UnauthorizedApprover { .. }
            | DomainError::DuplicateVersionLabel { .. }
            | DomainError::DuplicateBomCode { .. } => ErrorCategory::DomainState,

            DomainError::NotFound { .. }
            | DomainError::ItemCostNotFound { .. }
            | DomainError::InvariantViolation(_) => ErrorCategory::DataIntegrity,

            DomainError::ConcurrentModification { .. } => ErrorCategory::Concurrency,

            DomainError::Storage(_) => ErrorCategory::Infrastructure,
        }
    }

    /// Whether re-reading and repeating the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Concurrency
    }
}

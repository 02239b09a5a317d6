//! BOM domain module.
//!
//! Pure, deterministic logic for garment bills of materials: the line model, the
//! collaborator contracts it reads through, tree loading with cycle detection, explosion,
//! cost and lead-time roll-ups, and the version approval lifecycle (no IO, no HTTP, no
//! storage).

pub mod catalog;
pub mod cost;
pub mod explosion;
pub mod lead_time;
pub mod model;
pub mod reader;
pub mod tree;
pub mod version;

#[cfg(test)]
mod testing;

pub use catalog::{CatalogItem, ItemCatalog};
pub use cost::{CostBreakdown, CostLine, calculate_cost};
pub use explosion::{ExplodeOptions, RequiredItem, explode, explode_with};
pub use lead_time::{LeadTime, LeadTimeSource, LeadTimeStep, calculate_lead_time};
pub use model::{Bom, BomId, BomLine, BomVersionId, ItemId, UnitOfMeasure, validate_production_quantity};
pub use reader::{BomReader, ConsistentRead};
pub use tree::{BomTree, DEFAULT_MAX_DEPTH, TreeLine, TreeLoader, load_tree};
pub use version::{
    Activate, ApprovalDecision, ApprovalRecord, Approve, BomVersion, CreateVersion, LineChange,
    Reject, ReviseLines, SubmitForApproval, Supersede, VersionAction, VersionCommand,
    VersionEvent, VersionStatus, transition,
};

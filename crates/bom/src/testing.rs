//! In-memory fixtures shared by this crate's unit tests.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;

use loomerp_core::{Aggregate, AggregateId, DomainError, DomainResult, EntityKind, UserId};

use crate::catalog::{CatalogItem, ItemCatalog};
use crate::model::{Bom, BomId, BomLine, BomVersionId, ItemId, UnitOfMeasure};
use crate::reader::BomReader;
use crate::version::{
    Activate, Approve, BomVersion, CreateVersion, SubmitForApproval, VersionCommand, VersionStatus,
};

#[derive(Debug, Default)]
pub struct FixtureReader {
    boms: HashMap<BomId, Bom>,
    versions: HashMap<BomVersionId, BomVersion>,
    lines: HashMap<BomVersionId, Vec<BomLine>>,
}

impl FixtureReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a BOM with a single ACTIVE version holding `lines`.
    pub fn add_active(&mut self, code: &str, lines: Vec<BomLine>) -> BomId {
        let bom_id = BomId::new(AggregateId::new());
        let bom = Bom::new(bom_id, code, format!("{code} name"), "STYLE", Utc::now()).unwrap();
        self.boms.insert(bom_id, bom);

        let version = version_in(bom_id, "v1", VersionStatus::Active);
        self.lines.insert(version.id_typed(), lines);
        self.versions.insert(version.id_typed(), version);
        bom_id
    }

    /// Register a BOM header with no versions at all.
    pub fn add_unreleased(&mut self, code: &str) -> BomId {
        let bom_id = BomId::new(AggregateId::new());
        let bom = Bom::new(bom_id, code, format!("{code} name"), "STYLE", Utc::now()).unwrap();
        self.boms.insert(bom_id, bom);
        bom_id
    }

    /// Add a DRAFT version to an existing BOM.
    pub fn add_draft(&mut self, bom_id: BomId, label: &str, lines: Vec<BomLine>) -> BomVersionId {
        let version = version_in(bom_id, label, VersionStatus::Draft);
        let id = version.id_typed();
        self.lines.insert(id, lines);
        self.versions.insert(id, version);
        id
    }

    pub fn active_version_id(&self, bom_id: BomId) -> BomVersionId {
        self.versions
            .values()
            .find(|v| v.bom_id() == bom_id && v.status() == VersionStatus::Active)
            .map(|v| v.id_typed())
            .unwrap()
    }

    /// Replace the lines of a BOM's active version.
    pub fn set_active_lines(&mut self, bom_id: BomId, lines: Vec<BomLine>) {
        let id = self.active_version_id(bom_id);
        self.lines.insert(id, lines);
    }
}

impl BomReader for FixtureReader {
    fn bom(&self, id: BomId) -> DomainResult<Bom> {
        self.boms
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(EntityKind::Bom, id))
    }

    fn version(&self, id: BomVersionId) -> DomainResult<BomVersion> {
        self.versions
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(EntityKind::BomVersion, id))
    }

    fn active_version(&self, bom_id: BomId) -> DomainResult<Option<BomVersion>> {
        Ok(self
            .versions
            .values()
            .find(|v| v.bom_id() == bom_id && v.status() == VersionStatus::Active)
            .cloned())
    }

    fn versions_of(&self, bom_id: BomId) -> DomainResult<Vec<BomVersion>> {
        Ok(self
            .versions
            .values()
            .filter(|v| v.bom_id() == bom_id)
            .cloned()
            .collect())
    }

    fn lines(&self, version_id: BomVersionId) -> DomainResult<Vec<BomLine>> {
        Ok(self.lines.get(&version_id).cloned().unwrap_or_default())
    }
}

/// Drive a fresh version through the lifecycle up to `target`.
pub fn version_in(bom_id: BomId, label: &str, target: VersionStatus) -> BomVersion {
    let id = BomVersionId::new(AggregateId::new());
    let approver = UserId::new();
    let mut version = BomVersion::empty(id, bom_id);

    let mut step = |cmd: VersionCommand| {
        let events = version.handle(&cmd).unwrap();
        version.apply_all(&events);
    };

    step(VersionCommand::CreateVersion(CreateVersion {
        version_id: id,
        bom_id,
        label: label.to_string(),
        description: String::new(),
        created_by: approver,
        occurred_at: Utc::now(),
    }));
    if target == VersionStatus::Draft {
        return version;
    }
    step(VersionCommand::SubmitForApproval(SubmitForApproval {
        version_id: id,
        approvers: vec![approver],
        occurred_at: Utc::now(),
    }));
    step(VersionCommand::Approve(Approve {
        version_id: id,
        actor: approver,
        comment: None,
        occurred_at: Utc::now(),
    }));
    step(VersionCommand::Activate(Activate {
        version_id: id,
        occurred_at: Utc::now(),
    }));
    version
}

pub fn raw(line_no: u32, item: &str, qty: Decimal, wastage: Decimal) -> BomLine {
    BomLine {
        line_no,
        item_id: ItemId::new(item),
        uom: UnitOfMeasure::new("pcs"),
        quantity_per_unit: Some(qty),
        wastage_percent: wastage,
        note: None,
        is_optional: false,
        lead_time_days: None,
        sub_bom_id: None,
    }
}

pub fn sub(line_no: u32, item: &str, qty: Option<Decimal>, bom_id: BomId) -> BomLine {
    BomLine {
        line_no,
        item_id: ItemId::new(item),
        uom: UnitOfMeasure::new("pcs"),
        quantity_per_unit: qty,
        wastage_percent: Decimal::ZERO,
        note: None,
        is_optional: false,
        lead_time_days: None,
        sub_bom_id: Some(bom_id),
    }
}

pub fn with_lead_time(mut line: BomLine, days: u32) -> BomLine {
    line.lead_time_days = Some(days);
    line
}

pub fn optional(mut line: BomLine) -> BomLine {
    line.is_optional = true;
    line
}

#[derive(Debug, Default)]
pub struct FixtureCatalog {
    items: HashMap<ItemId, CatalogItem>,
    pub lookups: std::sync::Mutex<Vec<ItemId>>,
    pub batches: std::sync::Mutex<Vec<Vec<ItemId>>>,
}

impl FixtureCatalog {
    pub fn with(mut self, item: &str, unit_cost: Decimal) -> Self {
        let item_id = ItemId::new(item);
        self.items.insert(
            item_id.clone(),
            CatalogItem {
                item_id,
                unit_cost,
                base_uom: UnitOfMeasure::new("pcs"),
            },
        );
        self
    }
}

impl ItemCatalog for FixtureCatalog {
    fn item(&self, item_id: &ItemId) -> DomainResult<Option<CatalogItem>> {
        self.lookups.lock().unwrap().push(item_id.clone());
        Ok(self.items.get(item_id).cloned())
    }

    fn unit_costs(&self, item_ids: &[ItemId]) -> DomainResult<HashMap<ItemId, Decimal>> {
        self.batches.lock().unwrap().push(item_ids.to_vec());
        item_ids
            .iter()
            .map(|item_id| Ok((item_id.clone(), self.unit_cost(item_id)?)))
            .collect()
    }
}

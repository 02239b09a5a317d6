//! Read-side BOM engine: resolves the authoritative content and runs the aggregators.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use loomerp_bom::{
    BomId, BomTree, BomVersionId, ConsistentRead, CostBreakdown, ExplodeOptions, ItemCatalog,
    LeadTime, RequiredItem, TreeLoader, calculate_cost, calculate_lead_time, explode_with,
    validate_production_quantity,
};
use loomerp_core::DomainResult;

/// Explosion result together with the content it was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explosion {
    pub bom_id: BomId,
    pub version_id: BomVersionId,
    pub version_label: String,
    pub quantity: Decimal,
    pub items: Vec<RequiredItem>,
}

/// Stateless facade over tree loading and the explosion, cost and lead-time roll-ups.
///
/// Every call loads its own tree from one consistent view of the store; concurrent calls
/// share nothing mutable.
#[derive(Debug, Clone)]
pub struct BomEngine<R, C> {
    reader: R,
    catalog: C,
    max_depth: usize,
}

impl<R, C> BomEngine<R, C>
where
    R: ConsistentRead,
    C: ItemCatalog,
{
    pub fn new(reader: R, catalog: C) -> Self {
        Self {
            reader,
            catalog,
            max_depth: loomerp_bom::DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn load_tree(&self, bom_id: BomId, version_id: Option<BomVersionId>) -> DomainResult<Arc<BomTree>> {
        let tree = self.reader.read_consistent(|view| {
            TreeLoader::new(view)
                .with_max_depth(self.max_depth)
                .load(bom_id, version_id)
        })?;
        debug!(
            bom_id = %bom_id,
            version_id = %tree.version_id,
            depth = tree.depth(),
            boms = tree.bom_count(),
            "bom tree loaded"
        );
        Ok(tree)
    }

    pub fn explode(
        &self,
        bom_id: BomId,
        version_id: Option<BomVersionId>,
        quantity: Decimal,
        options: ExplodeOptions,
    ) -> DomainResult<Explosion> {
        let quantity = validate_production_quantity(quantity)?;
        let tree = self.load_tree(bom_id, version_id)?;
        let items = explode_with(&tree, quantity, options)?;
        info!(
            bom_id = %bom_id,
            version_id = %tree.version_id,
            quantity = %quantity,
            items = items.len(),
            "bom exploded"
        );
        Ok(Explosion {
            bom_id,
            version_id: tree.version_id,
            version_label: tree.version_label.clone(),
            quantity,
            items,
        })
    }

    pub fn cost(
        &self,
        bom_id: BomId,
        version_id: Option<BomVersionId>,
        quantity: Decimal,
        include_optional: bool,
    ) -> DomainResult<CostBreakdown> {
        let quantity = validate_production_quantity(quantity)?;
        let tree = self.load_tree(bom_id, version_id)?;
        let cost = calculate_cost(&tree, quantity, &self.catalog, include_optional)?;
        info!(
            bom_id = %bom_id,
            version_id = %tree.version_id,
            quantity = %quantity,
            include_optional,
            total = %cost.total_material_cost,
            "bom cost calculated"
        );
        Ok(cost)
    }

    pub fn lead_time(&self, bom_id: BomId, version_id: Option<BomVersionId>) -> DomainResult<LeadTime> {
        let tree = self.load_tree(bom_id, version_id)?;
        let lead_time = calculate_lead_time(&tree);
        info!(
            bom_id = %bom_id,
            version_id = %tree.version_id,
            days = lead_time.critical_path_days,
            "bom lead time calculated"
        );
        Ok(lead_time)
    }
}

//! Multi-level explosion of a [`BomTree`] into flat item requirements.
//!
//! The walk is depth-first with an accumulating multiplier. Every line contributes
//! `multiplier * quantity_per_unit * (1 + wastage / 100)`; a sub-assembly line passes that
//! amount down as the child's multiplier, so wastage compounds across levels. Leaf
//! requirements are summed per item in first-appearance (pre-order) order.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use loomerp_core::{DomainError, DomainResult};

use crate::model::{ItemId, UnitOfMeasure, validate_production_quantity};
use crate::tree::{BomTree, TreeLine};

/// Separator between the `CODE#line` segments of a source path.
pub const PATH_SEPARATOR: &str = " > ";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExplodeOptions {
    /// Walk optional lines (and everything below optional sub-assemblies).
    pub include_optional: bool,
}

impl Default for ExplodeOptions {
    fn default() -> Self {
        Self {
            include_optional: true,
        }
    }
}

/// Aggregated requirement for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequiredItem {
    pub item_id: ItemId,
    /// Unit of measure of the first occurrence.
    pub uom: UnitOfMeasure,
    pub required_qty: Decimal,
    /// True only when every contributing occurrence is optional.
    pub is_optional: bool,
    /// Wastage of the first occurrence's own line.
    pub wastage_percent: Decimal,
    /// Level of the first occurrence; root lines are level 1.
    pub depth: usize,
    /// Path of the first occurrence, e.g. `"SHIRT#2 > COLLAR#1"`.
    pub source_path: String,
    /// Every contributing path, in pre-order.
    pub source_paths: Vec<String>,
}

/// Explode `tree` for `quantity` finished units, including optional lines.
pub fn explode(tree: &BomTree, quantity: Decimal) -> DomainResult<Vec<RequiredItem>> {
    explode_with(tree, quantity, ExplodeOptions::default())
}

pub fn explode_with(
    tree: &BomTree,
    quantity: Decimal,
    options: ExplodeOptions,
) -> DomainResult<Vec<RequiredItem>> {
    let quantity = validate_production_quantity(quantity)?;
    let mut walk = Walk {
        options,
        trail: Vec::new(),
        items: Vec::new(),
        index: HashMap::new(),
    };
    walk.node(tree, quantity, false, 1)?;

    let mut items = walk.items;
    for item in &mut items {
        item.required_qty = item.required_qty.normalize();
    }
    Ok(items)
}

/// Quantity a line requires for `multiplier` units of its parent.
pub(crate) fn line_requirement(multiplier: Decimal, line: &TreeLine) -> DomainResult<Decimal> {
    multiplier
        .checked_mul(line.quantity_per_unit)
        .and_then(|qty| qty.checked_mul(line.wastage_factor()))
        .ok_or_else(|| {
            DomainError::invariant(format!(
                "requirement for line {} ({}) overflows",
                line.line_no, line.item_id
            ))
        })
}

struct Walk {
    options: ExplodeOptions,
    trail: Vec<String>,
    items: Vec<RequiredItem>,
    index: HashMap<ItemId, usize>,
}

impl Walk {
    fn node(
        &mut self,
        node: &BomTree,
        multiplier: Decimal,
        inherited_optional: bool,
        depth: usize,
    ) -> DomainResult<()> {
        for line in &node.lines {
            let optional = inherited_optional || line.is_optional;
            if optional && !self.options.include_optional {
                continue;
            }
            let qty = line_requirement(multiplier, line)?;
            self.trail.push(format!("{}#{}", node.bom_code, line.line_no));
            match &line.sub_tree {
                Some(child) => self.node(child, qty, optional, depth + 1)?,
                None => self.record(line, qty, optional, depth)?,
            }
            self.trail.pop();
        }
        Ok(())
    }

    fn record(&mut self, line: &TreeLine, qty: Decimal, optional: bool, depth: usize) -> DomainResult<()> {
        let path = self.trail.join(PATH_SEPARATOR);
        match self.index.get(&line.item_id) {
            Some(&at) => {
                let item = &mut self.items[at];
                item.required_qty = item.required_qty.checked_add(qty).ok_or_else(|| {
                    DomainError::invariant(format!("total requirement for {} overflows", line.item_id))
                })?;
                item.is_optional &= optional;
                item.source_paths.push(path);
            }
            None => {
                self.index.insert(line.item_id.clone(), self.items.len());
                self.items.push(RequiredItem {
                    item_id: line.item_id.clone(),
                    uom: line.uom.clone(),
                    required_qty: qty,
                    is_optional: optional,
                    wastage_percent: line.wastage_percent,
                    depth,
                    source_path: path.clone(),
                    source_paths: vec![path],
                });
            }
        }
        Ok(())
    }
}

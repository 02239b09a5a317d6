//! BOM tree loading.
//!
//! A [`BomTree`] is the fully resolved, immutable content graph of one BOM version: every
//! sub-assembly line carries its child tree. Loading walks the stored reference graph with
//! an explicit ancestor path, so a cycle is reported before the repeated BOM is expanded.
//! Shared sub-assemblies are loaded once and shared through `Arc`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use loomerp_core::{DomainError, DomainResult, EntityKind};

use crate::model::{Bom, BomId, BomLine, BomVersionId, ItemId, UnitOfMeasure};
use crate::reader::BomReader;
use crate::version::BomVersion;

/// Default guard against pathological nesting.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Resolved content of one BOM version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BomTree {
    pub bom_id: BomId,
    pub bom_code: String,
    pub version_id: BomVersionId,
    pub version_label: String,
    /// Ordered by line number.
    pub lines: Vec<TreeLine>,
    #[serde(skip)]
    reachable: BTreeSet<BomId>,
}

/// One resolved line. `quantity_per_unit` already has the sub-assembly default applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub uom: UnitOfMeasure,
    pub quantity_per_unit: Decimal,
    pub wastage_percent: Decimal,
    pub lead_time_days: Option<u32>,
    pub is_optional: bool,
    pub note: Option<String>,
    pub sub_tree: Option<Arc<BomTree>>,
}

impl TreeLine {
    /// Resolve a stored line, attaching the already loaded child tree for assembly lines.
    pub fn resolve(line: &BomLine, sub_tree: Option<Arc<BomTree>>) -> DomainResult<Self> {
        line.validate()
            .map_err(|err| DomainError::invariant(format!("stored line is invalid: {err}")))?;
        Ok(Self {
            line_no: line.line_no,
            item_id: line.item_id.clone(),
            uom: line.uom.clone(),
            quantity_per_unit: line.effective_quantity_per_unit()?,
            wastage_percent: line.wastage_percent,
            lead_time_days: line.lead_time_days,
            is_optional: line.is_optional,
            note: line.note.clone(),
            sub_tree,
        })
    }

    pub fn is_assembly(&self) -> bool {
        self.sub_tree.is_some()
    }

    /// `1 + wastage / 100`.
    pub fn wastage_factor(&self) -> Decimal {
        Decimal::ONE + self.wastage_percent / Decimal::ONE_HUNDRED
    }
}

impl BomTree {
    pub fn new(
        bom_id: BomId,
        bom_code: impl Into<String>,
        version_id: BomVersionId,
        version_label: impl Into<String>,
        mut lines: Vec<TreeLine>,
    ) -> Self {
        lines.sort_by_key(|line| line.line_no);
        let mut reachable = BTreeSet::new();
        for child in lines.iter().filter_map(|line| line.sub_tree.as_ref()) {
            reachable.insert(child.bom_id);
            reachable.extend(child.reachable.iter().copied());
        }
        Self {
            bom_id,
            bom_code: bom_code.into(),
            version_id,
            version_label: version_label.into(),
            lines,
            reachable,
        }
    }

    /// Whether `bom_id` appears anywhere below this node.
    pub fn references(&self, bom_id: BomId) -> bool {
        self.reachable.contains(&bom_id)
    }

    /// Number of levels, counting the root as one.
    pub fn depth(&self) -> usize {
        1 + self
            .lines
            .iter()
            .filter_map(|line| line.sub_tree.as_ref())
            .map(|child| child.depth())
            .max()
            .unwrap_or(0)
    }

    /// Distinct BOMs in the tree, including the root.
    pub fn bom_count(&self) -> usize {
        1 + self.reachable.len()
    }

    /// First node `level` levels below this one, in line order. Level zero is this node.
    pub fn first_at_level(&self, level: usize) -> Option<&BomTree> {
        if level == 0 {
            return Some(self);
        }
        self.lines
            .iter()
            .filter_map(|line| line.sub_tree.as_deref())
            .find_map(|child| child.first_at_level(level - 1))
    }

    /// BOM codes from this node down to the first node for `bom_id` (both included).
    pub fn path_to(&self, bom_id: BomId) -> Option<Vec<String>> {
        if self.bom_id == bom_id {
            return Some(vec![self.bom_code.clone()]);
        }
        if !self.references(bom_id) {
            return None;
        }
        self.lines
            .iter()
            .filter_map(|line| line.sub_tree.as_ref())
            .find_map(|child| child.path_to(bom_id))
            .map(|mut rest| {
                rest.insert(0, self.bom_code.clone());
                rest
            })
    }
}

/// Loads [`BomTree`]s through a [`BomReader`].
pub struct TreeLoader<'r, R: ?Sized> {
    reader: &'r R,
    max_depth: usize,
}

struct LoadContext {
    /// Ancestors of the node being expanded, root first.
    path: Vec<(BomId, String)>,
    memo: HashMap<BomId, Arc<BomTree>>,
}

impl LoadContext {
    fn cycle_through(&self, repeated: &str, extra: Option<&str>) -> DomainError {
        let mut path: Vec<String> = self.path.iter().map(|(_, code)| code.clone()).collect();
        if let Some(extra) = extra {
            path.push(extra.to_string());
        }
        path.push(repeated.to_string());
        DomainError::CyclicReference { path }
    }
}

impl<'r, R> TreeLoader<'r, R>
where
    R: BomReader + ?Sized,
{
    pub fn new(reader: &'r R) -> Self {
        Self {
            reader,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Load `bom_id` at `version_id`, or at its ACTIVE version when none is given.
    ///
    /// Sub-BOMs always resolve to their ACTIVE version.
    pub fn load(&self, bom_id: BomId, version_id: Option<BomVersionId>) -> DomainResult<Arc<BomTree>> {
        let bom = self.reader.bom(bom_id)?;
        let version = self.resolve_version(&bom, version_id)?;
        let mut ctx = LoadContext {
            path: Vec::new(),
            memo: HashMap::new(),
        };
        self.expand(&bom, &version, &mut ctx)
    }

    /// The version whose content represents `bom` for this load.
    pub fn resolve_version(&self, bom: &Bom, requested: Option<BomVersionId>) -> DomainResult<BomVersion> {
        match requested {
            Some(version_id) => {
                let version = self.reader.version(version_id)?;
                if version.bom_id() != bom.id {
                    return Err(DomainError::not_found(EntityKind::BomVersion, version_id));
                }
                Ok(version)
            }
            None => self
                .reader
                .active_version(bom.id)?
                .ok_or_else(|| DomainError::not_found(EntityKind::ActiveVersion, &bom.code)),
        }
    }

    fn expand(&self, bom: &Bom, version: &BomVersion, ctx: &mut LoadContext) -> DomainResult<Arc<BomTree>> {
        if ctx.path.len() >= self.max_depth {
            return Err(DomainError::MaxDepthExceeded {
                bom_id: bom.code.clone(),
                max_depth: self.max_depth,
            });
        }
        ctx.path.push((bom.id, bom.code.clone()));
        let result = self.expand_lines(bom, version, ctx);
        ctx.path.pop();
        result
    }

    fn expand_lines(&self, bom: &Bom, version: &BomVersion, ctx: &mut LoadContext) -> DomainResult<Arc<BomTree>> {
        let stored = self.reader.lines(version.id_typed())?;
        let mut lines = Vec::with_capacity(stored.len());
        for line in &stored {
            let sub_tree = match line.sub_bom_id {
                Some(child_id) => Some(self.child(child_id, ctx)?),
                None => None,
            };
            lines.push(TreeLine::resolve(line, sub_tree)?);
        }
        Ok(Arc::new(BomTree::new(
            bom.id,
            bom.code.clone(),
            version.id_typed(),
            version.label(),
            lines,
        )))
    }

    fn child(&self, child_id: BomId, ctx: &mut LoadContext) -> DomainResult<Arc<BomTree>> {
        if let Some((_, code)) = ctx.path.iter().find(|(id, _)| *id == child_id) {
            return Err(ctx.cycle_through(code, None));
        }

        if let Some(tree) = ctx.memo.get(&child_id) {
            if let Some((_, code)) = ctx.path.iter().find(|(id, _)| tree.references(*id)) {
                return Err(ctx.cycle_through(code, Some(&tree.bom_code)));
            }
            // A reused subtree must fit below the current path exactly as a fresh load would.
            let room = self.max_depth.saturating_sub(ctx.path.len());
            if let Some(too_deep) = tree.first_at_level(room) {
                return Err(DomainError::MaxDepthExceeded {
                    bom_id: too_deep.bom_code.clone(),
                    max_depth: self.max_depth,
                });
            }
            return Ok(Arc::clone(tree));
        }

        let bom = self.reader.bom(child_id)?;
        let version = self.resolve_version(&bom, None)?;
        let tree = self.expand(&bom, &version, ctx)?;
        ctx.memo.insert(child_id, Arc::clone(&tree));
        Ok(tree)
    }
}

/// Load with the default depth guard.
pub fn load_tree<R>(reader: &R, bom_id: BomId, version_id: Option<BomVersionId>) -> DomainResult<Arc<BomTree>>
where
    R: BomReader + ?Sized,
{
    TreeLoader::new(reader).load(bom_id, version_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixtureReader, raw, sub};
    use rust_decimal_macros::dec;

    #[test]
    fn loads_nested_tree_in_line_order() {
        let mut reader = FixtureReader::new();
        let b2 = reader.add_active("B2", vec![raw(1, "THR", dec!(2), dec!(0))]);
        let b1 = reader.add_active(
            "B1",
            vec![sub(2, "SEMI-B2", None, b2), raw(1, "FAB", dec!(1.5), dec!(10))],
        );

        let tree = load_tree(&reader, b1, None).unwrap();
        assert_eq!(tree.bom_code, "B1");
        assert_eq!(tree.lines[0].item_id, ItemId::new("FAB"));
        assert_eq!(tree.lines[1].quantity_per_unit, Decimal::ONE);
        let child = tree.lines[1].sub_tree.as_ref().unwrap();
        assert_eq!(child.bom_code, "B2");
        assert!(tree.references(b2));
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.path_to(b2), Some(vec!["B1".to_string(), "B2".to_string()]));
        assert_eq!(tree.path_to(BomId::new(loomerp_core::AggregateId::new())), None);
        assert_eq!(tree.bom_count(), 2);
    }

    #[test]
    fn direct_self_reference_is_a_cycle() {
        let mut reader = FixtureReader::new();
        let b1 = reader.add_active("B1", vec![]);
        reader.set_active_lines(b1, vec![sub(1, "SELF", None, b1)]);

        let err = load_tree(&reader, b1, None).unwrap_err();
        assert_eq!(
            err,
            DomainError::CyclicReference {
                path: vec!["B1".into(), "B1".into()]
            }
        );
    }

    #[test]
    fn deep_cycle_is_detected_before_expansion() {
        let mut reader = FixtureReader::new();
        let b1 = reader.add_active("B1", vec![]);
        let b4 = reader.add_active("B4", vec![sub(1, "S1", None, b1)]);
        let b3 = reader.add_active("B3", vec![sub(1, "S4", None, b4)]);
        let b2 = reader.add_active("B2", vec![sub(1, "S3", None, b3)]);
        reader.set_active_lines(b1, vec![raw(1, "FAB", dec!(1), dec!(0)), sub(2, "S2", None, b2)]);

        let err = load_tree(&reader, b1, None).unwrap_err();
        assert_eq!(
            err,
            DomainError::CyclicReference {
                path: vec!["B1".into(), "B2".into(), "B3".into(), "B4".into(), "B1".into()]
            }
        );
    }

    #[test]
    fn shared_sub_assembly_is_loaded_once() {
        let mut reader = FixtureReader::new();
        let collar = reader.add_active("COLLAR", vec![raw(1, "FAB", dec!(0.2), dec!(0))]);
        let body = reader.add_active("BODY", vec![sub(1, "COLLAR", None, collar)]);
        let shirt = reader.add_active(
            "SHIRT",
            vec![sub(1, "COLLAR", None, collar), sub(2, "BODY", None, body)],
        );

        let tree = load_tree(&reader, shirt, None).unwrap();
        let direct = tree.lines[0].sub_tree.as_ref().unwrap();
        let nested = tree.lines[1].sub_tree.as_ref().unwrap().lines[0]
            .sub_tree
            .as_ref()
            .unwrap();
        assert!(Arc::ptr_eq(direct, nested));
        assert_eq!(tree.bom_count(), 3);
    }

    #[test]
    fn depth_guard_stops_long_chains() {
        let mut reader = FixtureReader::new();
        let c = reader.add_active("C", vec![raw(1, "THR", dec!(1), dec!(0))]);
        let b = reader.add_active("B", vec![sub(1, "C", None, c)]);
        let a = reader.add_active("A", vec![sub(1, "B", None, b)]);

        assert!(TreeLoader::new(&reader).with_max_depth(3).load(a, None).is_ok());
        let err = TreeLoader::new(&reader).with_max_depth(2).load(a, None).unwrap_err();
        assert_eq!(
            err,
            DomainError::MaxDepthExceeded {
                bom_id: "C".into(),
                max_depth: 2
            }
        );
    }

    #[test]
    fn depth_guard_does_not_depend_on_line_order() {
        let mut reader = FixtureReader::new();
        let c = reader.add_active("C", vec![raw(1, "THR", dec!(1), dec!(0))]);
        let x2 = reader.add_active("X2", vec![sub(1, "C", None, c)]);
        let x1 = reader.add_active("X1", vec![sub(1, "X2", None, x2)]);
        let shallow_first = reader.add_active(
            "A",
            vec![sub(1, "C", None, c), sub(2, "X1", None, x1)],
        );
        let deep_first = reader.add_active(
            "B",
            vec![sub(1, "X1", None, x1), sub(2, "C", None, c)],
        );

        let expected = DomainError::MaxDepthExceeded {
            bom_id: "C".into(),
            max_depth: 3,
        };
        for root in [shallow_first, deep_first] {
            let err = TreeLoader::new(&reader).with_max_depth(3).load(root, None).unwrap_err();
            assert_eq!(err, expected);

            let tree = TreeLoader::new(&reader).with_max_depth(4).load(root, None).unwrap();
            assert_eq!(tree.depth(), 4);
        }
    }

    #[test]
    fn loaded_tree_serializes_nested_sub_trees() {
        let mut reader = FixtureReader::new();
        let b2 = reader.add_active("B2", vec![raw(1, "THR", dec!(2), dec!(0))]);
        let b1 = reader.add_active("B1", vec![sub(1, "SEMI-B2", None, b2)]);

        let tree = load_tree(&reader, b1, None).unwrap();
        let json = serde_json::to_value(tree.as_ref()).unwrap();
        assert_eq!(json["bom_code"], "B1");
        assert_eq!(json["lines"][0]["sub_tree"]["bom_code"], "B2");
        assert_eq!(json["lines"][0]["sub_tree"]["lines"][0]["item_id"], "THR");
        assert!(json["lines"][0]["sub_tree"]["lines"][0]["sub_tree"].is_null());
        assert!(json.get("reachable").is_none());
    }

    #[test]
    fn explicit_version_applies_to_root_only() {
        let mut reader = FixtureReader::new();
        let b2 = reader.add_active("B2", vec![raw(1, "THR", dec!(2), dec!(0))]);
        let b1 = reader.add_active("B1", vec![raw(1, "FAB", dec!(1), dec!(0))]);
        let draft = reader.add_draft(b1, "v2", vec![sub(1, "B2", None, b2)]);

        let tree = load_tree(&reader, b1, Some(draft)).unwrap();
        assert_eq!(tree.version_id, draft);
        assert_eq!(tree.version_label, "v2");
        let child = tree.lines[0].sub_tree.as_ref().unwrap();
        assert_eq!(child.version_id, reader.active_version_id(b2));
    }

    #[test]
    fn version_of_another_bom_is_not_found() {
        let mut reader = FixtureReader::new();
        let b1 = reader.add_active("B1", vec![]);
        let b2 = reader.add_active("B2", vec![]);
        let foreign = reader.active_version_id(b2);

        let err = load_tree(&reader, b1, Some(foreign)).unwrap_err();
        assert!(matches!(
            err,
            DomainError::NotFound {
                entity: EntityKind::BomVersion,
                ..
            }
        ));
    }

    #[test]
    fn sub_bom_without_active_version_is_not_found() {
        let mut reader = FixtureReader::new();
        let unreleased = reader.add_unreleased("COLLAR");
        let parent = reader.add_active("SHIRT", vec![sub(1, "COLLAR", None, unreleased)]);

        assert_eq!(
            load_tree(&reader, parent, None).unwrap_err(),
            DomainError::not_found(EntityKind::ActiveVersion, "COLLAR")
        );
    }

    #[test]
    fn unknown_sub_bom_is_not_found() {
        let mut reader = FixtureReader::new();
        let ghost = BomId::new(loomerp_core::AggregateId::new());
        let parent = reader.add_active("TOP", vec![sub(1, "GHOST", None, ghost)]);
        assert!(matches!(
            load_tree(&reader, parent, None).unwrap_err(),
            DomainError::NotFound {
                entity: EntityKind::Bom,
                ..
            }
        ));
    }

    #[test]
    fn corrupt_stored_line_is_an_invariant_violation() {
        let mut reader = FixtureReader::new();
        let b1 = reader.add_active("B1", vec![raw(1, "FAB", dec!(0), dec!(0))]);
        assert!(matches!(
            load_tree(&reader, b1, None).unwrap_err(),
            DomainError::InvariantViolation(_)
        ));
    }
}

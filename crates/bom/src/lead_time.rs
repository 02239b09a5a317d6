//! Critical-path lead time.
//!
//! Sibling lines are procured or produced in parallel, so a node takes the longest of its
//! lines rather than their sum. A raw line contributes its own lead time (zero when unset);
//! a sub-assembly line contributes the larger of its own lead time and its child's.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{BomId, BomVersionId, ItemId};
use crate::tree::{BomTree, TreeLine};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadTimeSource {
    /// The line's own lead time.
    Own,
    /// The sub-assembly's critical path, which exceeds the line's own lead time.
    SubAssembly,
}

/// One level of the critical chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadTimeStep {
    pub bom_id: BomId,
    pub bom_code: String,
    pub line_no: u32,
    pub item_id: ItemId,
    pub days: u32,
    pub source: LeadTimeSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadTime {
    pub bom_id: BomId,
    pub version_id: BomVersionId,
    pub critical_path_days: u32,
    /// The chain that achieved the maximum, root level first.
    pub breakdown: Vec<LeadTimeStep>,
}

pub fn calculate_lead_time(tree: &BomTree) -> LeadTime {
    let mut memo = HashMap::new();
    let critical_path_days = node_days(tree, &mut memo);

    let mut breakdown = Vec::new();
    let mut node = tree;
    while let Some((line, days, source)) = critical_line(node, &mut memo) {
        breakdown.push(LeadTimeStep {
            bom_id: node.bom_id,
            bom_code: node.bom_code.clone(),
            line_no: line.line_no,
            item_id: line.item_id.clone(),
            days,
            source,
        });
        match (source, &line.sub_tree) {
            (LeadTimeSource::SubAssembly, Some(child)) => node = child,
            _ => break,
        }
    }

    LeadTime {
        bom_id: tree.bom_id,
        version_id: tree.version_id,
        critical_path_days,
        breakdown,
    }
}

fn node_days(node: &BomTree, memo: &mut HashMap<BomId, u32>) -> u32 {
    if let Some(&days) = memo.get(&node.bom_id) {
        return days;
    }
    let days = node
        .lines
        .iter()
        .map(|line| line_days(line, memo).0)
        .max()
        .unwrap_or(0);
    memo.insert(node.bom_id, days);
    days
}

fn line_days(line: &TreeLine, memo: &mut HashMap<BomId, u32>) -> (u32, LeadTimeSource) {
    let own = line.lead_time_days.unwrap_or(0);
    match &line.sub_tree {
        Some(child) => {
            let below = node_days(child, memo);
            if below > own {
                (below, LeadTimeSource::SubAssembly)
            } else {
                (own, LeadTimeSource::Own)
            }
        }
        None => (own, LeadTimeSource::Own),
    }
}

/// First line (in line order) achieving the node's maximum.
fn critical_line<'t>(
    node: &'t BomTree,
    memo: &mut HashMap<BomId, u32>,
) -> Option<(&'t TreeLine, u32, LeadTimeSource)> {
    let mut best: Option<(&TreeLine, u32, LeadTimeSource)> = None;
    for line in &node.lines {
        let (days, source) = line_days(line, memo);
        if best.is_none_or(|(_, top, _)| days > top) {
            best = Some((line, days, source));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixtureReader, raw, sub, with_lead_time};
    use crate::tree::load_tree;
    use rust_decimal_macros::dec;

    #[test]
    fn parallel_siblings_take_the_max() {
        let mut reader = FixtureReader::new();
        let tee = reader.add_active(
            "TEE",
            vec![
                with_lead_time(raw(1, "FAB", dec!(1), dec!(0)), 5),
                with_lead_time(raw(2, "THR", dec!(1), dec!(0)), 8),
                with_lead_time(raw(3, "LABEL", dec!(1), dec!(0)), 3),
            ],
        );
        let tree = load_tree(&reader, tee, None).unwrap();

        let lead = calculate_lead_time(&tree);
        assert_eq!(lead.critical_path_days, 8);
        assert_eq!(lead.breakdown.len(), 1);
        assert_eq!(lead.breakdown[0].line_no, 2);
        assert_eq!(lead.breakdown[0].source, LeadTimeSource::Own);
    }

    #[test]
    fn sub_assembly_contributes_the_larger_of_own_and_child() {
        let mut reader = FixtureReader::new();
        let collar = reader.add_active(
            "COLLAR",
            vec![with_lead_time(raw(1, "INTERLINING", dec!(1), dec!(0)), 12)],
        );
        let shirt = reader.add_active(
            "SHIRT",
            vec![
                with_lead_time(raw(1, "FAB", dec!(1), dec!(0)), 10),
                with_lead_time(sub(2, "COLLAR", None, collar), 4),
            ],
        );
        let tree = load_tree(&reader, shirt, None).unwrap();

        let lead = calculate_lead_time(&tree);
        assert_eq!(lead.critical_path_days, 12);
        let chain: Vec<(&str, u32, u32, LeadTimeSource)> = lead
            .breakdown
            .iter()
            .map(|s| (s.bom_code.as_str(), s.line_no, s.days, s.source))
            .collect();
        assert_eq!(
            chain,
            [
                ("SHIRT", 2, 12, LeadTimeSource::SubAssembly),
                ("COLLAR", 1, 12, LeadTimeSource::Own),
            ]
        );
    }

    #[test]
    fn own_lead_time_wins_over_faster_sub_assembly() {
        let mut reader = FixtureReader::new();
        let pocket = reader.add_active(
            "POCKET",
            vec![with_lead_time(raw(1, "FAB", dec!(1), dec!(0)), 2)],
        );
        let shirt = reader.add_active("SHIRT", vec![with_lead_time(sub(1, "POCKET", None, pocket), 6)]);
        let tree = load_tree(&reader, shirt, None).unwrap();

        let lead = calculate_lead_time(&tree);
        assert_eq!(lead.critical_path_days, 6);
        assert_eq!(lead.breakdown.len(), 1);
        assert_eq!(lead.breakdown[0].source, LeadTimeSource::Own);
    }

    #[test]
    fn ties_resolve_to_the_first_line() {
        let mut reader = FixtureReader::new();
        let tee = reader.add_active(
            "TEE",
            vec![
                with_lead_time(raw(2, "THR", dec!(1), dec!(0)), 7),
                with_lead_time(raw(1, "FAB", dec!(1), dec!(0)), 7),
            ],
        );
        let tree = load_tree(&reader, tee, None).unwrap();
        assert_eq!(calculate_lead_time(&tree).breakdown[0].line_no, 1);
    }

    #[test]
    fn unset_lead_times_count_as_zero() {
        let mut reader = FixtureReader::new();
        let tee = reader.add_active("TEE", vec![raw(1, "FAB", dec!(1), dec!(0))]);
        let tree = load_tree(&reader, tee, None).unwrap();
        assert_eq!(calculate_lead_time(&tree).critical_path_days, 0);

        let empty = reader.add_active("EMPTY", vec![]);
        let tree = load_tree(&reader, empty, None).unwrap();
        let lead = calculate_lead_time(&tree);
        assert_eq!(lead.critical_path_days, 0);
        assert!(lead.breakdown.is_empty());
    }
}

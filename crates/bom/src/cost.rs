//! Material cost roll-up.
//!
//! Cost is priced after explosion, against each item's aggregated quantity, so a shared
//! component is looked up and billed once.

use rust_decimal::Decimal;
use serde::Serialize;

use loomerp_core::{DomainError, DomainResult};

use crate::catalog::ItemCatalog;
use crate::explosion::{ExplodeOptions, explode_with};
use crate::model::{BomId, BomVersionId, ItemId, UnitOfMeasure};
use crate::tree::BomTree;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostLine {
    pub item_id: ItemId,
    pub uom: UnitOfMeasure,
    pub required_qty: Decimal,
    pub unit_cost: Decimal,
    pub line_cost: Decimal,
    pub is_optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostBreakdown {
    pub bom_id: BomId,
    pub version_id: BomVersionId,
    pub quantity: Decimal,
    pub total_material_cost: Decimal,
    /// `None` for a zero quantity.
    pub cost_per_unit: Option<Decimal>,
    pub lines: Vec<CostLine>,
}

/// Price `quantity` units of `tree` against `catalog`.
///
/// With `include_optional == false` optional lines are left out of both the explosion and
/// the total. Every price is read in one [`ItemCatalog::unit_costs`] call before any line
/// is costed. A catalog miss fails the whole calculation.
pub fn calculate_cost<C>(
    tree: &BomTree,
    quantity: Decimal,
    catalog: &C,
    include_optional: bool,
) -> DomainResult<CostBreakdown>
where
    C: ItemCatalog + ?Sized,
{
    let required = explode_with(tree, quantity, ExplodeOptions { include_optional })?;
    let item_ids: Vec<ItemId> = required.iter().map(|item| item.item_id.clone()).collect();
    let prices = catalog.unit_costs(&item_ids)?;

    let mut total = Decimal::ZERO;
    let mut lines = Vec::with_capacity(required.len());
    for item in required {
        let unit_cost = prices
            .get(&item.item_id)
            .copied()
            .ok_or_else(|| DomainError::ItemCostNotFound {
                item_id: item.item_id.to_string(),
            })?;
        let line_cost = item
            .required_qty
            .checked_mul(unit_cost)
            .ok_or_else(|| overflow(&item.item_id))?
            .normalize();
        total = total.checked_add(line_cost).ok_or_else(|| overflow(&item.item_id))?;
        lines.push(CostLine {
            item_id: item.item_id,
            uom: item.uom,
            required_qty: item.required_qty,
            unit_cost,
            line_cost,
            is_optional: item.is_optional,
        });
    }

    let cost_per_unit = if quantity.is_zero() {
        None
    } else {
        total.checked_div(quantity).map(|unit| unit.normalize())
    };

    Ok(CostBreakdown {
        bom_id: tree.bom_id,
        version_id: tree.version_id,
        quantity,
        total_material_cost: total.normalize(),
        cost_per_unit,
        lines,
    })
}

fn overflow(item_id: &ItemId) -> DomainError {
    DomainError::invariant(format!("material cost for {item_id} overflows"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixtureCatalog, FixtureReader, optional, raw, sub};
    use crate::tree::load_tree;
    use rust_decimal_macros::dec;

    #[test]
    fn two_level_scenario_costs_2050() {
        let mut reader = FixtureReader::new();
        let b2 = reader.add_active("B2", vec![raw(1, "THR", dec!(2), dec!(0))]);
        let b1 = reader.add_active(
            "B1",
            vec![raw(1, "FAB", dec!(1.5), dec!(10)), sub(2, "SEMI-B2", None, b2)],
        );
        let tree = load_tree(&reader, b1, None).unwrap();
        let catalog = FixtureCatalog::default().with("FAB", dec!(10)).with("THR", dec!(2));

        let cost = calculate_cost(&tree, dec!(100), &catalog, true).unwrap();
        assert_eq!(cost.total_material_cost, dec!(2050));
        assert_eq!(cost.cost_per_unit, Some(dec!(20.5)));
        assert_eq!(cost.lines[0].line_cost, dec!(1650));
        assert_eq!(cost.lines[1].line_cost, dec!(400));
    }

    #[test]
    fn shared_item_is_priced_once() {
        let mut reader = FixtureReader::new();
        let collar = reader.add_active("COLLAR", vec![raw(1, "FAB", dec!(0.5), dec!(0))]);
        let shirt = reader.add_active(
            "SHIRT",
            vec![raw(1, "FAB", dec!(1), dec!(0)), sub(2, "COLLAR", None, collar)],
        );
        let tree = load_tree(&reader, shirt, None).unwrap();
        let catalog = FixtureCatalog::default().with("FAB", dec!(4));

        let cost = calculate_cost(&tree, dec!(10), &catalog, true).unwrap();
        assert_eq!(cost.lines.len(), 1);
        assert_eq!(cost.lines[0].required_qty, dec!(15));
        assert_eq!(cost.total_material_cost, dec!(60));
        assert_eq!(catalog.lookups.lock().unwrap().len(), 1);
    }

    #[test]
    fn all_prices_are_read_in_one_batch() {
        let mut reader = FixtureReader::new();
        let b2 = reader.add_active(
            "B2",
            vec![raw(1, "THR", dec!(2), dec!(0)), raw(2, "FAB", dec!(0.5), dec!(0))],
        );
        let b1 = reader.add_active(
            "B1",
            vec![raw(1, "FAB", dec!(1.5), dec!(10)), sub(2, "SEMI-B2", None, b2)],
        );
        let tree = load_tree(&reader, b1, None).unwrap();
        let catalog = FixtureCatalog::default().with("FAB", dec!(10)).with("THR", dec!(2));

        calculate_cost(&tree, dec!(100), &catalog, true).unwrap();
        assert_eq!(
            *catalog.batches.lock().unwrap(),
            vec![vec![ItemId::new("FAB"), ItemId::new("THR")]]
        );
    }

    #[test]
    fn missing_catalog_entry_fails_the_whole_calculation() {
        let mut reader = FixtureReader::new();
        let tee = reader.add_active(
            "TEE",
            vec![raw(1, "FAB", dec!(1), dec!(0)), raw(2, "DYE", dec!(0.1), dec!(0))],
        );
        let tree = load_tree(&reader, tee, None).unwrap();
        let catalog = FixtureCatalog::default().with("FAB", dec!(4));

        assert_eq!(
            calculate_cost(&tree, dec!(1), &catalog, true).unwrap_err(),
            DomainError::ItemCostNotFound {
                item_id: "DYE".into()
            }
        );
    }

    #[test]
    fn optional_lines_can_be_excluded_from_the_total() {
        let mut reader = FixtureReader::new();
        let tee = reader.add_active(
            "TEE",
            vec![raw(1, "FAB", dec!(1), dec!(0)), optional(raw(2, "TAG", dec!(1), dec!(0)))],
        );
        let tree = load_tree(&reader, tee, None).unwrap();
        let catalog = FixtureCatalog::default().with("FAB", dec!(3));

        let without = calculate_cost(&tree, dec!(2), &catalog, false).unwrap();
        assert_eq!(without.total_material_cost, dec!(6));
        assert_eq!(without.lines.len(), 1);

        let err = calculate_cost(&tree, dec!(2), &catalog, true).unwrap_err();
        assert!(matches!(err, DomainError::ItemCostNotFound { .. }));

        let catalog = catalog.with("TAG", dec!(0.5));
        let with = calculate_cost(&tree, dec!(2), &catalog, true).unwrap();
        assert_eq!(with.total_material_cost, dec!(7));
        assert!(with.lines[1].is_optional);
    }

    #[test]
    fn zero_quantity_has_no_unit_cost() {
        let mut reader = FixtureReader::new();
        let tee = reader.add_active("TEE", vec![raw(1, "FAB", dec!(1), dec!(0))]);
        let tree = load_tree(&reader, tee, None).unwrap();
        let catalog = FixtureCatalog::default().with("FAB", dec!(3));

        let cost = calculate_cost(&tree, Decimal::ZERO, &catalog, true).unwrap();
        assert!(cost.total_material_cost.is_zero());
        assert_eq!(cost.cost_per_unit, None);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig { cases: 48, ..ProptestConfig::default() })]

            #[test]
            fn total_is_the_sum_of_line_costs(
                q in 0u32..5_000,
                fab_cost in 1u32..10_000,
                thr_cost in 1u32..10_000,
            ) {
                let mut reader = FixtureReader::new();
                let b2 = reader.add_active("B2", vec![raw(1, "THR", dec!(2), dec!(5))]);
                let b1 = reader.add_active(
                    "B1",
                    vec![raw(1, "FAB", dec!(1.5), dec!(10)), sub(2, "SEMI", None, b2)],
                );
                let tree = load_tree(&reader, b1, None).unwrap();
                let catalog = FixtureCatalog::default()
                    .with("FAB", Decimal::new(fab_cost.into(), 2))
                    .with("THR", Decimal::new(thr_cost.into(), 2));

                let cost = calculate_cost(&tree, Decimal::from(q), &catalog, true).unwrap();
                let sum: Decimal = cost.lines.iter().map(|l| l.line_cost).sum();
                prop_assert_eq!(cost.total_material_cost, sum);
            }
        }
    }
}

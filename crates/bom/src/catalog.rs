//! Item catalog collaborator contract.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use loomerp_core::{DomainError, DomainResult};

use crate::model::{ItemId, UnitOfMeasure};

/// Costing view of an item master record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub item_id: ItemId,
    pub unit_cost: Decimal,
    pub base_uom: UnitOfMeasure,
}

/// Read-only item lookup. Must not change during a single aggregation call.
pub trait ItemCatalog: Send + Sync {
    fn item(&self, item_id: &ItemId) -> DomainResult<Option<CatalogItem>>;

    /// Unit cost, failing with `ItemCostNotFound` when the item is unknown.
    fn unit_cost(&self, item_id: &ItemId) -> DomainResult<Decimal> {
        self.item(item_id)?
            .map(|item| item.unit_cost)
            .ok_or_else(|| DomainError::ItemCostNotFound {
                item_id: item_id.to_string(),
            })
    }

    /// Unit costs of `item_ids` as of one point in time.
    ///
    /// Fails with `ItemCostNotFound` for the first unknown item. Stores that can change
    /// underneath should override this to read every price from one view.
    fn unit_costs(&self, item_ids: &[ItemId]) -> DomainResult<HashMap<ItemId, Decimal>> {
        item_ids
            .iter()
            .map(|item_id| Ok((item_id.clone(), self.unit_cost(item_id)?)))
            .collect()
    }
}

impl<C> ItemCatalog for Arc<C>
where
    C: ItemCatalog + ?Sized,
{
    fn item(&self, item_id: &ItemId) -> DomainResult<Option<CatalogItem>> {
        (**self).item(item_id)
    }

    fn unit_cost(&self, item_id: &ItemId) -> DomainResult<Decimal> {
        (**self).unit_cost(item_id)
    }

    fn unit_costs(&self, item_ids: &[ItemId]) -> DomainResult<HashMap<ItemId, Decimal>> {
        (**self).unit_costs(item_ids)
    }
}

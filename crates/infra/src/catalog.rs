//! In-memory item catalog adapter.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard};

use rust_decimal::Decimal;

use loomerp_bom::{CatalogItem, ItemCatalog, ItemId, UnitOfMeasure};
use loomerp_core::{DomainError, DomainResult};

#[derive(Debug, Default)]
pub struct InMemoryItemCatalog {
    items: RwLock<HashMap<ItemId, CatalogItem>>,
}

impl InMemoryItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an item's costing record.
    pub fn upsert(&self, item_id: ItemId, unit_cost: Decimal, base_uom: UnitOfMeasure) -> DomainResult<CatalogItem> {
        if item_id.as_str().trim().is_empty() {
            return Err(DomainError::invalid_input("item id cannot be empty"));
        }
        if unit_cost < Decimal::ZERO {
            return Err(DomainError::invalid_input(format!(
                "unit cost of {item_id} cannot be negative (got {unit_cost})"
            )));
        }
        if base_uom.as_str().trim().is_empty() {
            return Err(DomainError::invalid_input("base unit of measure cannot be empty"));
        }

        let item = CatalogItem {
            item_id: item_id.clone(),
            unit_cost,
            base_uom,
        };
        self.items
            .write()
            .map_err(|_| DomainError::storage("catalog lock poisoned"))?
            .insert(item_id, item.clone());
        Ok(item)
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, HashMap<ItemId, CatalogItem>>> {
        self.items
            .read()
            .map_err(|_| DomainError::storage("catalog lock poisoned"))
    }
}

impl ItemCatalog for InMemoryItemCatalog {
    fn item(&self, item_id: &ItemId) -> DomainResult<Option<CatalogItem>> {
        Ok(self.read()?.get(item_id).cloned())
    }

    /// Reads every price under one lock, so a concurrent upsert lands before or after.
    fn unit_costs(&self, item_ids: &[ItemId]) -> DomainResult<HashMap<ItemId, Decimal>> {
        let items = self.read()?;
        item_ids
            .iter()
            .map(|item_id| {
                let item = items.get(item_id).ok_or_else(|| DomainError::ItemCostNotFound {
                    item_id: item_id.to_string(),
                })?;
                Ok((item_id.clone(), item.unit_cost))
            })
            .collect()
    }
}

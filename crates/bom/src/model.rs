use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use loomerp_core::{AggregateId, DomainError, DomainResult, Entity, ValueObject};

/// BOM identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BomId(pub AggregateId);

impl BomId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for BomId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// BOM version identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BomVersionId(pub AggregateId);

impl BomVersionId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for BomVersionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Item code from the item master (fabric, trims, thread, packaging, semi-finished goods).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unit of measure code (e.g. "m", "pcs", "cone", "kg").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitOfMeasure(String);

impl UnitOfMeasure {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for UnitOfMeasure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl ValueObject for UnitOfMeasure {}

/// BOM header.
///
/// The header carries identity only; line content belongs to a [`crate::BomVersion`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bom {
    pub id: BomId,
    /// Unique, human-facing code (e.g. "TSHIRT-BASIC-M").
    pub code: String,
    pub name: String,
    /// Style code of the product this BOM builds.
    pub product_style: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Bom {
    /// Build a new, active header after validating its descriptive fields.
    pub fn new(
        id: BomId,
        code: impl Into<String>,
        name: impl Into<String>,
        product_style: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let code = code.into().trim().to_string();
        let name = name.into().trim().to_string();
        if code.is_empty() {
            return Err(DomainError::invalid_input("bom code cannot be empty"));
        }
        if name.is_empty() {
            return Err(DomainError::invalid_input("bom name cannot be empty"));
        }
        Ok(Self {
            id,
            code,
            name,
            product_style: product_style.into().trim().to_string(),
            active: true,
            created_at,
        })
    }
}

impl Entity for Bom {
    type Id = BomId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// One row of a BOM version.
///
/// A line either consumes a raw item, or (when `sub_bom_id` is set) a sub-assembly
/// built from another BOM. For sub-assembly lines `item_id` names the semi-finished
/// item the sub-BOM produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomLine {
    /// Position within the version; defines deterministic ordering.
    pub line_no: u32,
    pub item_id: ItemId,
    pub uom: UnitOfMeasure,
    /// Required per unit of the parent. Optional only on sub-assembly lines, where it
    /// defaults to one.
    pub quantity_per_unit: Option<Decimal>,
    #[serde(default)]
    pub wastage_percent: Decimal,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(default)]
    pub lead_time_days: Option<u32>,
    #[serde(default)]
    pub sub_bom_id: Option<BomId>,
}

const ONE_HUNDRED: Decimal = Decimal::ONE_HUNDRED;

impl BomLine {
    pub fn is_assembly(&self) -> bool {
        self.sub_bom_id.is_some()
    }

    /// Quantity per parent unit, applying the sub-assembly default of one.
    pub fn effective_quantity_per_unit(&self) -> DomainResult<Decimal> {
        match (self.quantity_per_unit, self.is_assembly()) {
            (Some(q), _) => Ok(q),
            (None, true) => Ok(Decimal::ONE),
            (None, false) => Err(DomainError::invariant(format!(
                "line {} ({}) has no quantity per unit",
                self.line_no, self.item_id
            ))),
        }
    }

    /// `1 + wastage / 100`.
    pub fn wastage_factor(&self) -> Decimal {
        Decimal::ONE + self.wastage_percent / ONE_HUNDRED
    }

    /// Check the line's own attributes (references are checked by the caller).
    pub fn validate(&self) -> DomainResult<()> {
        if self.line_no == 0 {
            return Err(DomainError::invalid_input("line number must be positive"));
        }
        if self.item_id.as_str().trim().is_empty() {
            return Err(DomainError::invalid_input(format!(
                "line {}: item cannot be empty",
                self.line_no
            )));
        }
        if self.uom.as_str().trim().is_empty() {
            return Err(DomainError::invalid_input(format!(
                "line {}: unit of measure cannot be empty",
                self.line_no
            )));
        }
        let qty = self.effective_quantity_per_unit().map_err(|_| {
            DomainError::invalid_input(format!(
                "line {}: quantity per unit is required for raw material lines",
                self.line_no
            ))
        })?;
        if qty <= Decimal::ZERO {
            return Err(DomainError::invalid_input(format!(
                "line {}: quantity per unit must be greater than zero (got {qty})",
                self.line_no
            )));
        }
        if self.wastage_percent < Decimal::ZERO {
            return Err(DomainError::invalid_input(format!(
                "line {}: wastage percent cannot be negative (got {})",
                self.line_no, self.wastage_percent
            )));
        }
        Ok(())
    }
}

impl Entity for BomLine {
    type Id = u32;

    fn id(&self) -> &Self::Id {
        &self.line_no
    }
}

/// Reject negative production quantities; zero is a valid degenerate request.
pub fn validate_production_quantity(quantity: Decimal) -> DomainResult<Decimal> {
    if quantity < Decimal::ZERO {
        return Err(DomainError::InvalidQuantity { quantity });
    }
    Ok(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw_line(qty: Option<Decimal>, wastage: Decimal) -> BomLine {
        BomLine {
            line_no: 1,
            item_id: ItemId::new("FAB"),
            uom: UnitOfMeasure::new("m"),
            quantity_per_unit: qty,
            wastage_percent: wastage,
            note: None,
            is_optional: false,
            lead_time_days: None,
            sub_bom_id: None,
        }
    }

    #[test]
    fn raw_line_requires_positive_quantity() {
        assert!(raw_line(Some(dec!(1.5)), dec!(10)).validate().is_ok());
        assert!(matches!(
            raw_line(Some(Decimal::ZERO), dec!(0)).validate(),
            Err(DomainError::InvalidInput(_))
        ));
        assert!(matches!(
            raw_line(None, dec!(0)).validate(),
            Err(DomainError::InvalidInput(_))
        ));
    }

    #[test]
    fn assembly_line_defaults_quantity_to_one() {
        let mut line = raw_line(None, dec!(0));
        line.sub_bom_id = Some(BomId::new(AggregateId::new()));
        assert!(line.validate().is_ok());
        assert_eq!(line.effective_quantity_per_unit().unwrap(), Decimal::ONE);
    }

    #[test]
    fn wastage_must_not_be_negative() {
        assert!(raw_line(Some(dec!(1)), dec!(-0.5)).validate().is_err());
        assert!(raw_line(Some(dec!(1)), dec!(0)).validate().is_ok());
        assert!(raw_line(Some(dec!(1)), dec!(99.99)).validate().is_ok());
        assert!(raw_line(Some(dec!(1)), dec!(100)).validate().is_ok());
        assert!(raw_line(Some(dec!(1)), dec!(150)).validate().is_ok());
    }

    #[test]
    fn wastage_factor_is_exact() {
        assert_eq!(raw_line(Some(dec!(1)), dec!(10)).wastage_factor(), dec!(1.10));
        assert_eq!(raw_line(Some(dec!(1)), dec!(2.5)).wastage_factor(), dec!(1.025));
    }

    #[test]
    fn negative_production_quantity_is_rejected() {
        assert_eq!(validate_production_quantity(dec!(0)).unwrap(), dec!(0));
        assert_eq!(
            validate_production_quantity(dec!(-1)).unwrap_err(),
            DomainError::InvalidQuantity { quantity: dec!(-1) }
        );
    }

    #[test]
    fn bom_header_rejects_blank_code() {
        let err = Bom::new(BomId::new(AggregateId::new()), "  ", "Tee", "TS-01", Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }
}

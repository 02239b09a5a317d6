use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use loomerp_bom::{
    ApprovalRecord, Bom, BomId, BomLine, BomVersion, BomVersionId, ItemId, UnitOfMeasure,
    VersionStatus,
};
use loomerp_core::{AggregateRoot, UserId};
use loomerp_infra::VersionContent;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateBomRequest {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub product_style: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateVersionRequest {
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub created_by: String,
}

/// Line content. `line_no` is required when adding and ignored when updating.
#[derive(Debug, Deserialize)]
pub struct LineRequest {
    pub line_no: Option<u32>,
    pub item_id: String,
    pub uom: String,
    pub quantity_per_unit: Option<Decimal>,
    #[serde(default)]
    pub wastage_percent: Decimal,
    pub note: Option<String>,
    #[serde(default)]
    pub is_optional: bool,
    pub lead_time_days: Option<u32>,
    pub sub_bom_id: Option<BomId>,
    pub expected_revision: Option<u64>,
}

impl LineRequest {
    pub fn into_line(self, line_no: u32) -> (BomLine, Option<u64>) {
        (
            BomLine {
                line_no,
                item_id: ItemId::new(self.item_id.trim()),
                uom: UnitOfMeasure::new(self.uom.trim()),
                quantity_per_unit: self.quantity_per_unit,
                wastage_percent: self.wastage_percent,
                note: self.note,
                is_optional: self.is_optional,
                lead_time_days: self.lead_time_days,
                sub_bom_id: self.sub_bom_id,
            },
            self.expected_revision,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub approvers: Vec<String>,
    pub expected_revision: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub actor: String,
    pub comment: Option<String>,
    pub expected_revision: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RevisionQuery {
    pub expected_revision: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertItemRequest {
    pub unit_cost: Decimal,
    pub base_uom: String,
}

/// Query string of the explosion and cost endpoints; `quantity` is parsed by hand so a
/// missing or malformed value maps to `invalid_input`.
#[derive(Debug, Default, Deserialize)]
pub struct CalculationQuery {
    pub quantity: Option<String>,
    pub version_id: Option<String>,
    pub include_optional: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VersionQuery {
    pub version_id: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct BomResponse {
    pub id: BomId,
    pub code: String,
    pub name: String,
    pub product_style: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Bom> for BomResponse {
    fn from(bom: Bom) -> Self {
        Self {
            id: bom.id,
            code: bom.code,
            name: bom.name,
            product_style: bom.product_style,
            active: bom.active,
            created_at: bom.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub id: BomVersionId,
    pub bom_id: BomId,
    pub label: String,
    pub description: String,
    pub status: VersionStatus,
    pub revision: u64,
    pub created_by: Option<UserId>,
    pub created_at: Option<DateTime<Utc>>,
    pub approvers: Vec<UserId>,
    pub decisions: Vec<ApprovalRecord>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub effective_from: Option<DateTime<Utc>>,
    pub superseded_by: Option<BomVersionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<BomLine>>,
}

impl From<&BomVersion> for VersionResponse {
    fn from(version: &BomVersion) -> Self {
        Self {
            id: version.id_typed(),
            bom_id: version.bom_id(),
            label: version.label().to_string(),
            description: version.description().to_string(),
            status: version.status(),
            revision: version.version(),
            created_by: version.created_by(),
            created_at: version.created_at(),
            approvers: version.approvers().to_vec(),
            decisions: version.decisions().to_vec(),
            submitted_at: version.submitted_at(),
            effective_from: version.effective_from(),
            superseded_by: version.superseded_by(),
            lines: None,
        }
    }
}

impl From<VersionContent> for VersionResponse {
    fn from(content: VersionContent) -> Self {
        Self {
            lines: Some(content.lines),
            ..Self::from(&content.version)
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assets::{AssetListing, BatchReport, ItemFailure, OperationStage};
use crate::entity::business_asset;

/// Response DTO for a single business image.
#[derive(Serialize, utoipa::ToSchema)]
pub struct AssetResponse {
    /// Asset ID (UUIDv7).
    #[schema(example = "01936f0e-1234-7abc-8000-000000000001")]
    pub id: Uuid,
    pub business_id: Uuid,
    /// Public URL of the stored image.
    #[schema(example = "https://cdn.example.com/businesses/0193.../joes-pizza-logo-0193....png")]
    pub url: String,
    #[schema(example = "Joe's Pizza logo")]
    pub alt_text: String,
    pub is_primary: bool,
    /// Gallery position. The primary image always has 0.
    #[schema(example = 3)]
    pub sort_order: i32,
    #[schema(example = "image/png")]
    pub content_type: String,
    /// Stored size in bytes, after compression.
    #[schema(example = 482133)]
    pub size: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    #[schema(example = "storefront.png")]
    pub original_filename: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<business_asset::Model> for AssetResponse {
    fn from(model: business_asset::Model) -> Self {
        Self {
            id: model.id,
            business_id: model.business_id,
            url: model.url,
            alt_text: model.alt_text,
            is_primary: model.is_primary,
            sort_order: model.sort_order,
            content_type: model.content_type,
            size: model.size,
            width: model.width,
            height: model.height,
            original_filename: model.original_filename,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// All images of one business: the primary image first, then the gallery.
#[derive(Serialize, utoipa::ToSchema)]
pub struct AssetListResponse {
    pub business_id: Uuid,
    pub primary_id: Option<Uuid>,
    pub assets: Vec<AssetResponse>,
    pub total: u64,
    /// Non-fatal problems encountered while completing the operation.
    pub warnings: Vec<String>,
}

impl From<AssetListing> for AssetListResponse {
    fn from(listing: AssetListing) -> Self {
        let total = listing.assets.len() as u64;
        Self {
            business_id: listing.business_id,
            primary_id: listing.primary_id,
            assets: listing.assets.into_iter().map(AssetResponse::from).collect(),
            total,
            warnings: listing.warnings,
        }
    }
}

/// One batch item that did not complete.
#[derive(Serialize, utoipa::ToSchema)]
pub struct BatchFailureResponse {
    /// File name or asset ID.
    #[schema(example = "menu.bmp")]
    pub item: String,
    pub stage: OperationStage,
    #[schema(example = "VALIDATION_REJECTED")]
    pub code: String,
    pub reason: String,
}

impl From<ItemFailure> for BatchFailureResponse {
    fn from(failure: ItemFailure) -> Self {
        Self {
            item: failure.item,
            stage: failure.stage,
            code: failure.code.to_string(),
            reason: failure.reason,
        }
    }
}

/// Result of a gallery upload or bulk delete.
#[derive(Serialize, utoipa::ToSchema)]
pub struct BatchResponse {
    /// `PARTIAL_BATCH_FAILURE` when at least one item failed, absent otherwise.
    #[schema(example = "PARTIAL_BATCH_FAILURE")]
    pub code: Option<String>,
    /// IDs of items that completed (new asset IDs for uploads).
    pub succeeded: Vec<Uuid>,
    pub failures: Vec<BatchFailureResponse>,
    /// Catalog state after the batch.
    pub listing: AssetListResponse,
}

impl From<BatchReport> for BatchResponse {
    fn from(report: BatchReport) -> Self {
        Self {
            code: report
                .is_partial()
                .then(|| "PARTIAL_BATCH_FAILURE".to_string()),
            succeeded: report.succeeded,
            failures: report.failures.into_iter().map(Into::into).collect(),
            listing: report.listing.into(),
        }
    }
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateAltTextRequest {
    /// New alt text. Trimmed; at most 500 characters.
    #[schema(example = "Wood-fired oven at the Main St. location")]
    pub alt_text: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct BulkDeleteRequest {
    /// Gallery assets to delete. 1-100 unique IDs from one business.
    pub asset_ids: Vec<Uuid>,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct OrphanSweepQuery {
    /// Restrict the sweep to one business.
    pub business_id: Option<Uuid>,
}

use std::fmt;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use super::error::AssetError;
use crate::entity::business_asset;

/// Where an operation was when it finished or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OperationStage {
    Validating,
    Storing,
    Cataloging,
    Reconciling,
    Done,
}

impl OperationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Storing => "storing",
            Self::Cataloging => "cataloging",
            Self::Reconciling => "reconciling",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for OperationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog view of one business after an operation.
///
/// `assets` is in display order: the primary image first, then the gallery
/// by `sort_order`.
#[derive(Debug, Clone)]
pub struct AssetListing {
    pub business_id: Uuid,
    pub assets: Vec<business_asset::Model>,
    pub primary_id: Option<Uuid>,
    /// Non-fatal problems, e.g. a displaced primary that could not be removed.
    pub warnings: Vec<String>,
}

impl AssetListing {
    /// Arrange catalog rows for display.
    ///
    /// If more than one row carries the primary flag, the most recently
    /// flagged one is shown as primary and the others fall back into the
    /// gallery.
    pub fn from_rows(
        business_id: Uuid,
        mut rows: Vec<business_asset::Model>,
        warnings: Vec<String>,
    ) -> Self {
        let flagged = rows.iter().filter(|row| row.is_primary).count();
        if flagged > 1 {
            warn!(%business_id, flagged, "Business has more than one primary image");
        }

        let primary_index = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.is_primary)
            .max_by_key(|(_, row)| (row.primary_since, row.updated_at))
            .map(|(index, _)| index);
        let primary = primary_index.map(|index| rows.remove(index));

        rows.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });

        let primary_id = primary.as_ref().map(|p| p.id);
        let assets = primary.into_iter().chain(rows).collect();

        Self {
            business_id,
            assets,
            primary_id,
            warnings,
        }
    }

    pub fn primary(&self) -> Option<&business_asset::Model> {
        self.primary_id
            .and_then(|id| self.assets.iter().find(|asset| asset.id == id))
    }

    pub fn gallery(&self) -> impl Iterator<Item = &business_asset::Model> {
        let primary_id = self.primary_id;
        self.assets
            .iter()
            .filter(move |asset| Some(asset.id) != primary_id)
    }
}

/// One item of a batch that did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// File name or asset id the failure refers to.
    pub item: String,
    pub stage: OperationStage,
    pub code: &'static str,
    pub reason: String,
}

impl ItemFailure {
    pub fn new(item: impl Into<String>, error: &AssetError) -> Self {
        Self {
            item: item.into(),
            stage: error.stage(),
            code: error.code(),
            reason: error.public_message(),
        }
    }
}

/// Outcome of a batch operation. Items are independent: one failure never
/// rolls back the others.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub listing: AssetListing,
    pub succeeded: Vec<Uuid>,
    pub failures: Vec<ItemFailure>,
}

impl BatchReport {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

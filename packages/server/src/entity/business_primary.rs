use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-business pointer to the current primary asset.
///
/// Swaps compare-and-set this row inside the same transaction that flips the
/// `is_primary` flags, so two sessions cannot both win a promotion.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "business_primary")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub business_id: Uuid,

    #[sea_orm(unique)]
    pub asset_id: Uuid,

    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

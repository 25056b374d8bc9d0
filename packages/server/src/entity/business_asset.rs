use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "business_asset")]
pub struct Model {
    /// UUIDv7 primary key, assigned at insert.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning business. Never changes.
    pub business_id: Uuid,

    /// Object store key (`businesses/{business_id}/...`).
    #[sea_orm(unique)]
    pub object_key: String,

    /// Public URL resolved at upload time.
    pub url: String,

    pub alt_text: String,

    /// At most one row per business may carry this flag.
    pub is_primary: bool,

    /// Gallery position; only meaningful among non-primary rows.
    pub sort_order: i32,

    pub content_type: String,

    /// Stored size in bytes, after compression.
    pub size: i64,

    pub width: Option<i32>,
    pub height: Option<i32>,

    /// Filename as uploaded, for display only.
    pub original_filename: String,

    /// When the row was last flagged primary. Breaks ties if several rows
    /// ever carry the flag.
    pub primary_since: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

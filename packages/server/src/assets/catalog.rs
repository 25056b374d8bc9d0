use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::sea_query::{Expr, NullOrdering, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, Order, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::entity::{business_asset, business_primary};

/// Fields supplied by the caller when cataloging a stored object.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub business_id: Uuid,
    pub object_key: String,
    pub url: String,
    pub alt_text: String,
    pub sort_order: i32,
    pub content_type: String,
    pub size: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub original_filename: String,
}

/// Result of a primary swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    Swapped,
    /// The primary pointer no longer matched what the caller read, or the
    /// incoming row disappeared. Nothing was changed.
    Lost,
}

/// Persistent index of business assets.
///
/// Generic over the connection so the same operations run on a pool or
/// inside a transaction.
pub struct AssetCatalog<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> AssetCatalog<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Insert a non-primary row.
    pub async fn insert(&self, asset: NewAsset) -> Result<business_asset::Model, DbErr> {
        let now = Utc::now();
        business_asset::ActiveModel {
            id: Set(Uuid::now_v7()),
            business_id: Set(asset.business_id),
            object_key: Set(asset.object_key),
            url: Set(asset.url),
            alt_text: Set(asset.alt_text),
            is_primary: Set(false),
            sort_order: Set(asset.sort_order),
            content_type: Set(asset.content_type),
            size: Set(asset.size),
            width: Set(asset.width),
            height: Set(asset.height),
            original_filename: Set(asset.original_filename),
            primary_since: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.conn)
        .await
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<business_asset::Model>, DbErr> {
        business_asset::Entity::find_by_id(id).one(self.conn).await
    }

    /// Fetch several rows at once, keyed by id. Unknown ids are absent.
    pub async fn find_many(
        &self,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, business_asset::Model>, DbErr> {
        let rows = business_asset::Entity::find()
            .filter(business_asset::Column::Id.is_in(ids.iter().copied()))
            .all(self.conn)
            .await?;
        Ok(rows.into_iter().map(|row| (row.id, row)).collect())
    }

    /// Every row for a business, unordered beyond a stable tiebreak.
    pub async fn list_for_business(
        &self,
        business_id: Uuid,
    ) -> Result<Vec<business_asset::Model>, DbErr> {
        business_asset::Entity::find()
            .filter(business_asset::Column::BusinessId.eq(business_id))
            .order_by_asc(business_asset::Column::SortOrder)
            .order_by_asc(business_asset::Column::CreatedAt)
            .all(self.conn)
            .await
    }

    /// The flagged row, most recently flagged first if there are several.
    /// Rows without a `primary_since` rank last on every backend, matching
    /// `AssetListing::from_rows`.
    pub async fn find_primary(
        &self,
        business_id: Uuid,
    ) -> Result<Option<business_asset::Model>, DbErr> {
        business_asset::Entity::find()
            .filter(business_asset::Column::BusinessId.eq(business_id))
            .filter(business_asset::Column::IsPrimary.eq(true))
            .order_by_with_nulls(
                business_asset::Column::PrimarySince,
                Order::Desc,
                NullOrdering::Last,
            )
            .order_by_desc(business_asset::Column::UpdatedAt)
            .one(self.conn)
            .await
    }

    /// Highest `sort_order` in use for a business, 0 when it has no assets.
    pub async fn max_sort_order(&self, business_id: Uuid) -> Result<i32, DbErr> {
        let max: Option<Option<i32>> = business_asset::Entity::find()
            .select_only()
            .column_as(business_asset::Column::SortOrder.max(), "max_sort_order")
            .filter(business_asset::Column::BusinessId.eq(business_id))
            .into_tuple()
            .one(self.conn)
            .await?;
        Ok(max.flatten().unwrap_or(0))
    }

    /// Returns `false` if the row does not exist.
    pub async fn update_alt_text(&self, id: Uuid, alt_text: &str) -> Result<bool, DbErr> {
        let result = business_asset::Entity::update_many()
            .col_expr(business_asset::Column::AltText, Expr::value(alt_text))
            .col_expr(business_asset::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(business_asset::Column::Id.eq(id))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Delete a row and, if it was the primary, the pointer to it.
    ///
    /// Returns `false` if the row was already gone.
    pub async fn delete(&self, asset: &business_asset::Model) -> Result<bool, DbErr> {
        let result = business_asset::Entity::delete_by_id(asset.id)
            .exec(self.conn)
            .await?;

        business_primary::Entity::delete_many()
            .filter(business_primary::Column::BusinessId.eq(asset.business_id))
            .filter(business_primary::Column::AssetId.eq(asset.id))
            .exec(self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Object keys referenced by the catalog, optionally for one business.
    pub async fn referenced_keys(&self, business_id: Option<Uuid>) -> Result<HashSet<String>, DbErr> {
        let mut query = business_asset::Entity::find()
            .select_only()
            .column(business_asset::Column::ObjectKey);
        if let Some(business_id) = business_id {
            query = query.filter(business_asset::Column::BusinessId.eq(business_id));
        }
        let keys: Vec<String> = query.into_tuple().all(self.conn).await?;
        Ok(keys.into_iter().collect())
    }

    /// Asset id the primary pointer currently holds.
    pub async fn primary_pointer(&self, business_id: Uuid) -> Result<Option<Uuid>, DbErr> {
        Ok(business_primary::Entity::find_by_id(business_id)
            .one(self.conn)
            .await?
            .map(|pointer| pointer.asset_id))
    }

    /// Make `incoming` the primary image of `business_id`.
    ///
    /// `expected` is the pointer value the caller read. The pointer is
    /// compare-and-set against it first, so of two concurrent swaps from the
    /// same starting point only one can succeed. Flags are cleared before the
    /// incoming row is flagged; the partial unique index on `is_primary`
    /// rejects the reverse order.
    ///
    /// Run inside a transaction and roll back on [`SwapOutcome::Lost`].
    pub async fn swap_primary(
        &self,
        business_id: Uuid,
        expected: Option<Uuid>,
        incoming: Uuid,
    ) -> Result<SwapOutcome, DbErr> {
        let now = Utc::now();

        match expected {
            Some(current) => {
                let result = business_primary::Entity::update_many()
                    .col_expr(business_primary::Column::AssetId, Expr::value(incoming))
                    .col_expr(business_primary::Column::UpdatedAt, Expr::value(now))
                    .filter(business_primary::Column::BusinessId.eq(business_id))
                    .filter(business_primary::Column::AssetId.eq(current))
                    .exec(self.conn)
                    .await?;
                if result.rows_affected == 0 {
                    return Ok(SwapOutcome::Lost);
                }
            }
            None => {
                let pointer = business_primary::ActiveModel {
                    business_id: Set(business_id),
                    asset_id: Set(incoming),
                    updated_at: Set(now),
                };
                let inserted = business_primary::Entity::insert(pointer)
                    .on_conflict(
                        OnConflict::column(business_primary::Column::BusinessId)
                            .do_nothing()
                            .to_owned(),
                    )
                    .exec_without_returning(self.conn)
                    .await?;
                if inserted == 0 {
                    return Ok(SwapOutcome::Lost);
                }
            }
        }

        business_asset::Entity::update_many()
            .col_expr(business_asset::Column::IsPrimary, Expr::value(false))
            .col_expr(business_asset::Column::UpdatedAt, Expr::value(now))
            .filter(business_asset::Column::BusinessId.eq(business_id))
            .filter(business_asset::Column::IsPrimary.eq(true))
            .filter(business_asset::Column::Id.ne(incoming))
            .exec(self.conn)
            .await?;

        let flagged = business_asset::Entity::update_many()
            .col_expr(business_asset::Column::IsPrimary, Expr::value(true))
            .col_expr(business_asset::Column::SortOrder, Expr::value(0))
            .col_expr(business_asset::Column::PrimarySince, Expr::value(Some(now)))
            .col_expr(business_asset::Column::UpdatedAt, Expr::value(now))
            .filter(business_asset::Column::Id.eq(incoming))
            .filter(business_asset::Column::BusinessId.eq(business_id))
            .exec(self.conn)
            .await?;
        if flagged.rows_affected == 0 {
            return Ok(SwapOutcome::Lost);
        }

        Ok(SwapOutcome::Swapped)
    }
}

use std::time::Duration;

use sea_orm::sea_query::{Index, PostgresQueryBuilder, SqliteQueryBuilder};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::entity::business_asset;

pub async fn init_db(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.url.clone());

    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .sqlx_logging(config.sqlx_logging);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("server::entity::*")
        .sync(&db)
        .await?;
    ensure_indexes(&db).await?;

    Ok(db)
}

/// Ensure catalog indexes exist.
///
/// Schema sync creates tables and unique columns only; the partial unique
/// index and the gallery ordering index are created here.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Backstop for the primary invariant: two flagged rows for one business
    // fail at the storage layer even if application sequencing is bypassed.
    db.execute_unprepared(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_business_asset_single_primary \
         ON business_asset (business_id) WHERE is_primary",
    )
    .await?;
    info!("Ensured index idx_business_asset_single_primary exists");

    // SELECT ... FROM business_asset WHERE business_id = ? ORDER BY sort_order
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_business_asset_gallery_order")
        .table(business_asset::Entity)
        .col(business_asset::Column::BusinessId)
        .col(business_asset::Column::SortOrder)
        .to_owned();
    let sql = match db.get_database_backend() {
        DbBackend::Sqlite => stmt.to_string(SqliteQueryBuilder),
        _ => stmt.to_string(PostgresQueryBuilder),
    };
    db.execute_unprepared(&sql).await?;
    info!("Ensured index idx_business_asset_gallery_order exists");

    Ok(())
}

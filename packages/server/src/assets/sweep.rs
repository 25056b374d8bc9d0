use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::storage::{BlobStore, ObjectRef};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::catalog::AssetCatalog;
use super::error::AssetError;
use super::report::OperationStage;
use crate::config::SweeperConfig;

/// Counts from one orphan sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct SweepReport {
    /// Stored objects examined.
    pub scanned: usize,
    /// Objects with no catalog row and older than the grace period.
    pub orphaned: usize,
    pub deleted: usize,
    pub failed: usize,
    /// Unreferenced objects left alone because they are still inside the
    /// grace period.
    pub skipped_recent: usize,
}

/// Delete stored objects that no catalog row references.
///
/// The store is listed before the catalog is read, so a row committed in
/// between still protects its object. Objects younger than `grace_period`
/// are skipped; they may belong to an upload that has stored its bytes but
/// not yet written its row.
pub async fn sweep_orphans(
    db: &DatabaseConnection,
    store: &dyn BlobStore,
    business_id: Option<Uuid>,
    grace_period: Duration,
) -> Result<SweepReport, AssetError> {
    let prefix = match business_id {
        Some(id) => ObjectRef::partition_prefix(id),
        None => ObjectRef::namespace_prefix(),
    };
    let objects = store
        .list(&prefix)
        .await
        .map_err(AssetError::storage(OperationStage::Reconciling))?;
    let referenced = AssetCatalog::new(db)
        .referenced_keys(business_id)
        .await
        .map_err(AssetError::catalog(OperationStage::Reconciling))?;

    let cutoff = Utc::now()
        - chrono::Duration::from_std(grace_period).unwrap_or_else(|_| chrono::Duration::zero());

    let mut report = SweepReport {
        scanned: objects.len(),
        ..Default::default()
    };

    for object in objects {
        if referenced.contains(object.key.as_str()) {
            continue;
        }
        if object.last_modified > cutoff {
            report.skipped_recent += 1;
            continue;
        }

        report.orphaned += 1;
        match store.delete(&object.key).await {
            Ok(_) => {
                info!(key = %object.key, size = object.size, "Deleted orphaned object");
                report.deleted += 1;
            }
            Err(e) => {
                warn!(key = %object.key, error = %e, "Failed to delete orphaned object");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Run the orphan sweep as a background task.
pub async fn run_orphan_sweeper(
    db: DatabaseConnection,
    store: Arc<dyn BlobStore>,
    config: SweeperConfig,
) {
    let grace_period = Duration::from_secs(config.grace_period_secs);

    info!(
        interval_secs = config.interval_secs,
        grace_period_secs = config.grace_period_secs,
        "Starting orphan sweeper"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.interval_secs));

    loop {
        interval.tick().await;

        match sweep_orphans(&db, store.as_ref(), None, grace_period).await {
            Ok(report) if report.orphaned > 0 => info!(
                scanned = report.scanned,
                deleted = report.deleted,
                failed = report.failed,
                "Orphan sweep finished"
            ),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Orphan sweep failed"),
        }
    }
}

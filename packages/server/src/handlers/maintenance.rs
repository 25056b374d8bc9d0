use std::time::Duration;

use axum::extract::{Query, State};
use tracing::instrument;

use crate::assets::SweepReport;
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::asset::OrphanSweepQuery;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/maintenance/orphan-sweep",
    tag = "Maintenance",
    operation_id = "sweepOrphans",
    summary = "Delete stored images no catalog entry references",
    description = "Runs the same sweep as the background task. Objects younger than the \
        configured grace period are left alone.",
    params(OrphanSweepQuery),
    responses(
        (status = 200, description = "Sweep finished", body = SweepReport),
        (status = 502, description = "Object store failure (STORAGE_FAILURE)", body = ErrorBody),
        (status = 503, description = "Catalog failure (CATALOG_FAILURE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query), fields(business_id = ?query.business_id))]
pub async fn sweep_orphans(
    State(state): State<AppState>,
    Query(query): Query<OrphanSweepQuery>,
) -> Result<AppJson<SweepReport>, AppError> {
    let grace_period = Duration::from_secs(state.config.sweeper.grace_period_secs);
    let report = state
        .assets
        .sweep_orphans(query.business_id, grace_period)
        .await?;
    Ok(AppJson(report))
}

use common::MediaConfig;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(business_routes(&config.media))
        .merge(asset_routes())
        .merge(maintenance_routes())
}

fn business_routes(media: &MediaConfig) -> OpenApiRouter<AppState> {
    let list = OpenApiRouter::new().routes(routes!(handlers::asset::list_assets));

    let logo = OpenApiRouter::new()
        .routes(routes!(handlers::asset::upload_logo))
        .layer(handlers::asset::logo_body_limit(media));

    let gallery = OpenApiRouter::new()
        .routes(routes!(handlers::asset::upload_gallery))
        .layer(handlers::asset::gallery_body_limit(media));

    list.merge(logo).merge(gallery)
}

fn asset_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::asset::update_alt_text,
            handlers::asset::delete_asset
        ))
        .routes(routes!(handlers::asset::promote_asset))
        .routes(routes!(handlers::asset::bulk_delete_assets))
}

fn maintenance_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::maintenance::sweep_orphans))
}

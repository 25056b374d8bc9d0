//! Catalog behaviour that only a server database shows: sessions that race
//! each other, and NULL ordering.

use std::time::Duration;

use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, TransactionTrait};
use uuid::Uuid;

use crate::common::{TestContext, png_file, small_png};
use server::assets::{AssetCatalog, AssetError, SwapOutcome};
use server::entity::business_asset;

/// Upload `gallery` images, plus a logo first when `with_logo` is set.
async fn seed(ctx: &TestContext, business: Uuid, with_logo: bool, gallery: u8) -> (Option<Uuid>, Vec<Uuid>) {
    let logo = if with_logo {
        ctx.assets
            .upload_logo(business, "Shop", png_file("logo.png", small_png(200)))
            .await
            .unwrap()
            .primary_id
    } else {
        None
    };
    let files = (0..gallery)
        .map(|i| png_file(&format!("g{i}.png"), small_png(i)))
        .collect();
    let report = ctx.assets.upload_gallery(business, "Shop", files).await.unwrap();
    (logo, report.succeeded)
}

#[tokio::test]
async fn lifecycle_keeps_catalog_and_store_in_step() {
    let Some(ctx) = TestContext::postgres().await else {
        return;
    };
    let business = Uuid::now_v7();
    let (logo, gallery) = seed(&ctx, business, true, 4).await;

    let listing = ctx.assets.promote_to_primary(gallery[0]).await.unwrap();
    assert_eq!(listing.primary_id, Some(gallery[0]));
    assert!(listing.assets.iter().all(|a| Some(a.id) != logo));

    ctx.assets.delete_asset(gallery[1]).await.unwrap();
    let report = ctx
        .assets
        .bulk_delete_assets(&[gallery[2], gallery[0]])
        .await
        .unwrap();
    assert_eq!(report.succeeded, vec![gallery[2]]);
    assert_eq!(report.failures.len(), 1);

    let listing = ctx
        .assets
        .update_alt_text(gallery[3], "  Patio at dusk ")
        .await
        .unwrap();
    let ids: Vec<_> = listing.assets.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![gallery[0], gallery[3]]);
    assert_eq!(listing.assets[1].alt_text, "Patio at dusk");

    assert_eq!(ctx.primary_count(business).await, 1);
    ctx.assert_consistent(business).await;
}

#[tokio::test]
async fn racing_swaps_from_one_pointer_let_one_win() {
    let Some(ctx) = TestContext::postgres().await else {
        return;
    };
    let business = Uuid::now_v7();
    let (logo, gallery) = seed(&ctx, business, true, 2).await;

    // Both sessions read the pointer before either writes.
    let first = ctx.db.begin().await.unwrap();
    let second = ctx.db.begin().await.unwrap();
    let seen_first = AssetCatalog::new(&first).primary_pointer(business).await.unwrap();
    let seen_second = AssetCatalog::new(&second).primary_pointer(business).await.unwrap();
    assert_eq!(seen_first, logo);
    assert_eq!(seen_second, logo);

    let outcome = AssetCatalog::new(&first)
        .swap_primary(business, seen_first, gallery[0])
        .await
        .unwrap();
    assert_eq!(outcome, SwapOutcome::Swapped);

    // The second swap waits on the first session's pointer row lock.
    let incoming = gallery[1];
    let loser = tokio::spawn(async move {
        let outcome = AssetCatalog::new(&second)
            .swap_primary(business, seen_second, incoming)
            .await;
        (second, outcome)
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    first.commit().await.unwrap();

    let (second, outcome) = loser.await.unwrap();
    assert_eq!(outcome.unwrap(), SwapOutcome::Lost);
    second.rollback().await.unwrap();

    let listing = ctx.assets.list_assets(business).await.unwrap();
    assert_eq!(listing.primary_id, Some(gallery[0]));
    assert_eq!(ctx.primary_count(business).await, 1);
}

#[tokio::test]
async fn racing_first_pointer_inserts_let_one_win() {
    let Some(ctx) = TestContext::postgres().await else {
        return;
    };
    let business = Uuid::now_v7();
    let (_, gallery) = seed(&ctx, business, false, 2).await;

    let first = ctx.db.begin().await.unwrap();
    let second = ctx.db.begin().await.unwrap();
    let outcome = AssetCatalog::new(&first)
        .swap_primary(business, None, gallery[0])
        .await
        .unwrap();
    assert_eq!(outcome, SwapOutcome::Swapped);

    let incoming = gallery[1];
    let loser = tokio::spawn(async move {
        let outcome = AssetCatalog::new(&second)
            .swap_primary(business, None, incoming)
            .await;
        (second, outcome)
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    first.commit().await.unwrap();

    let (second, outcome) = loser.await.unwrap();
    assert_eq!(outcome.unwrap(), SwapOutcome::Lost);
    second.rollback().await.unwrap();

    assert_eq!(
        AssetCatalog::new(&ctx.db).primary_pointer(business).await.unwrap(),
        Some(gallery[0])
    );
    assert_eq!(ctx.primary_count(business).await, 1);
}

#[tokio::test]
async fn concurrent_promotions_leave_exactly_one_primary() {
    let Some(ctx) = TestContext::postgres().await else {
        return;
    };

    for with_logo in [true, false] {
        let business = Uuid::now_v7();
        let (_, gallery) = seed(&ctx, business, with_logo, 2).await;

        let (a, b) = tokio::join!(
            ctx.assets.promote_to_primary(gallery[0]),
            ctx.assets.promote_to_primary(gallery[1]),
        );

        let outcomes = [a, b];
        let winners: Vec<_> = outcomes
            .iter()
            .filter_map(|outcome| outcome.as_ref().ok())
            .collect();
        assert!(!winners.is_empty(), "both promotions failed: {outcomes:?}");
        for outcome in &outcomes {
            if let Err(err) = outcome {
                assert!(matches!(err, AssetError::Conflict(_)), "got {err:?}");
            }
        }

        assert_eq!(ctx.primary_count(business).await, 1);
        let listing = ctx.assets.list_assets(business).await.unwrap();
        let primary = listing.primary_id.unwrap();
        assert!(gallery.contains(&primary));
        assert_eq!(
            AssetCatalog::new(&ctx.db).primary_pointer(business).await.unwrap(),
            Some(primary)
        );
        ctx.assert_consistent(business).await;
    }
}

#[tokio::test]
async fn second_primary_flag_is_refused_by_the_catalog() {
    let Some(ctx) = TestContext::postgres().await else {
        return;
    };
    let business = Uuid::now_v7();
    let (logo, gallery) = seed(&ctx, business, true, 1).await;

    let result = business_asset::Entity::update_many()
        .col_expr(business_asset::Column::IsPrimary, Expr::value(true))
        .filter(business_asset::Column::Id.eq(gallery[0]))
        .exec(&ctx.db)
        .await;

    assert!(result.is_err(), "a second primary row was accepted");
    assert_eq!(ctx.primary_count(business).await, 1);
    let listing = ctx.assets.list_assets(business).await.unwrap();
    assert_eq!(listing.primary_id, logo);
}

#[tokio::test]
async fn undated_primary_flag_ranks_after_dated_one() {
    let Some(ctx) = TestContext::postgres().await else {
        return;
    };
    let business = Uuid::now_v7();
    let (dated, _undated) = ctx.plant_duplicate_primaries(business).await;

    let chosen = AssetCatalog::new(&ctx.db)
        .find_primary(business)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(chosen.id, dated);
    let listing = ctx.assets.list_assets(business).await.unwrap();
    assert_eq!(listing.primary_id, Some(dated));
}

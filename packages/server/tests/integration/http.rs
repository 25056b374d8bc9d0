use reqwest::header;
use reqwest::multipart::{Form, Part};
use serde_json::json;
use uuid::Uuid;

use crate::common::{TestApp, image_part, noisy_png, routes, small_png};

mod uploads {
    use super::*;

    #[tokio::test]
    async fn logo_upload_is_served_with_cache_headers() {
        let app = TestApp::spawn().await;
        let business = Uuid::now_v7();
        let bytes = small_png(7);

        let form = Form::new()
            .text("business_name", "Joe's Pizza")
            .part("file", image_part("logo.png", bytes.clone(), "image/png"));
        let res = app.post_form(&routes::logo(business), form).await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["total"], 1);
        let asset = &res.body["assets"][0];
        assert_eq!(asset["is_primary"], true);
        assert_eq!(asset["sort_order"], 0);
        assert_eq!(asset["alt_text"], "Joe's Pizza logo");
        assert_eq!(asset["width"], 8);
        assert_eq!(res.body["primary_id"], asset["id"]);

        let url = asset["url"].as_str().unwrap();
        assert!(url.starts_with(&app.url("/media/businesses/")));
        let image = app.client.get(url).send().await.unwrap();
        assert_eq!(image.status(), 200);
        assert_eq!(image.headers()[header::CONTENT_TYPE], "image/png");
        assert!(
            image.headers()[header::CACHE_CONTROL]
                .to_str()
                .unwrap()
                .contains("immutable")
        );
        let etag = image.headers()[header::ETAG].clone();
        assert_eq!(image.bytes().await.unwrap().as_ref(), bytes.as_slice());

        let cached = app
            .client
            .get(url)
            .header(header::IF_NONE_MATCH, etag)
            .send()
            .await
            .unwrap();
        assert_eq!(cached.status(), 304);
    }

    #[tokio::test]
    async fn unsupported_type_is_rejected_with_422() {
        let app = TestApp::spawn().await;
        let form = Form::new()
            .text("business_name", "Shop")
            .part("file", image_part("scan.bmp", vec![0x42, 0x4d, 1, 2], "image/bmp"));

        let res = app.post_form(&routes::logo(Uuid::now_v7()), form).await;

        assert_eq!(res.status, 422, "{}", res.text);
        assert_eq!(res.body["code"], "VALIDATION_REJECTED");
        assert!(res.body["message"].as_str().unwrap().contains("scan.bmp"));
        assert_eq!(app.ctx.store.put_count(), 0);
    }

    #[tokio::test]
    async fn oversized_logo_is_rejected_with_422() {
        let app = TestApp::spawn().await;
        let form = Form::new()
            .text("business_name", "Shop")
            .part("file", image_part("big.png", vec![0; 300 * 1024], "image/png"));

        let res = app.post_form(&routes::logo(Uuid::now_v7()), form).await;

        assert_eq!(res.status, 422, "{}", res.text);
        assert_eq!(res.body["code"], "VALIDATION_REJECTED");
    }

    #[tokio::test]
    async fn missing_business_name_is_a_bad_request() {
        let app = TestApp::spawn().await;
        let form = Form::new().part("file", image_part("logo.png", small_png(1), "image/png"));

        let res = app.post_form(&routes::logo(Uuid::now_v7()), form).await;

        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn two_logo_files_are_a_bad_request() {
        let app = TestApp::spawn().await;
        let form = Form::new()
            .text("business_name", "Shop")
            .part("file", image_part("a.png", small_png(1), "image/png"))
            .part("file", image_part("b.png", small_png(2), "image/png"));

        let res = app.post_form(&routes::logo(Uuid::now_v7()), form).await;

        assert_eq!(res.status, 400, "{}", res.text);
    }

    #[tokio::test]
    async fn storage_outage_is_a_bad_gateway() {
        let app = TestApp::spawn().await;
        app.ctx.store.set_fail_puts(true);
        let form = Form::new()
            .text("business_name", "Shop")
            .part("file", image_part("logo.png", small_png(1), "image/png"));

        let res = app.post_form(&routes::logo(Uuid::now_v7()), form).await;

        assert_eq!(res.status, 502, "{}", res.text);
        assert_eq!(res.body["code"], "STORAGE_FAILURE");
        assert!(!res.body["message"].as_str().unwrap().contains("injected"));
    }

    #[tokio::test]
    async fn catalog_outage_is_service_unavailable() {
        let app = TestApp::spawn().await;
        let business = Uuid::now_v7();
        app.ctx.break_catalog_inserts().await;
        let form = Form::new()
            .text("business_name", "Shop")
            .part("file", image_part("logo.png", small_png(1), "image/png"));

        let res = app.post_form(&routes::logo(business), form).await;

        assert_eq!(res.status, 503, "{}", res.text);
        assert_eq!(res.body["code"], "CATALOG_FAILURE");
        assert_eq!(res.body["message"], "Catalog failure while cataloging");
        assert!(app.ctx.rows(business).await.is_empty());
        assert_eq!(app.ctx.stored_keys(business).await.len(), 1);
    }

    #[tokio::test]
    async fn gallery_part_without_usable_filename_fails_alone() {
        let app = TestApp::spawn().await;
        let business = Uuid::now_v7();
        let unnamed = Part::bytes(small_png(2)).mime_str("image/png").unwrap();
        let form = Form::new()
            .text("business_name", "Shop")
            .part("files", image_part("one.png", small_png(1), "image/png"))
            .part("files", unnamed)
            .part("files", image_part("..", small_png(3), "image/png"));

        let res = app.post_form(&routes::gallery(business), form).await;

        assert_eq!(res.status, 207, "{}", res.text);
        assert_eq!(res.body["succeeded"].as_array().unwrap().len(), 1);
        let failures = res.body["failures"].as_array().unwrap();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0]["item"], "files part 2");
        assert_eq!(failures[1]["item"], "..");
        for failure in failures {
            assert_eq!(failure["code"], "VALIDATION_ERROR");
            assert_eq!(failure["stage"], "validating");
        }
        assert_eq!(app.ctx.store.put_count(), 1);
        app.ctx.assert_consistent(business).await;
    }

    #[tokio::test]
    async fn gallery_of_only_unusable_parts_is_multi_status() {
        let app = TestApp::spawn().await;
        let business = Uuid::now_v7();
        let form = Form::new()
            .text("business_name", "Shop")
            .part("files", Part::bytes(small_png(1)).mime_str("image/png").unwrap());

        let res = app.post_form(&routes::gallery(business), form).await;

        assert_eq!(res.status, 207, "{}", res.text);
        assert!(res.body["succeeded"].as_array().unwrap().is_empty());
        assert_eq!(res.body["failures"][0]["item"], "files part 1");
        assert_eq!(res.body["listing"]["total"], 0);
        assert_eq!(app.ctx.store.put_count(), 0);
    }

    #[tokio::test]
    async fn too_many_gallery_parts_are_refused_before_storing() {
        let app = TestApp::spawn().await;
        let business = Uuid::now_v7();
        let form = (0..6u8).fold(Form::new().text("business_name", "Shop"), |form, i| {
            form.part("files", image_part(&format!("{i}.png"), small_png(i), "image/png"))
        });

        let res = app.post_form(&routes::gallery(business), form).await;

        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert_eq!(app.ctx.store.put_count(), 0);
        assert!(app.ctx.rows(business).await.is_empty());
    }

    #[tokio::test]
    async fn oversized_gallery_part_fails_alone() {
        let app = TestApp::spawn().await;
        let business = Uuid::now_v7();
        let form = Form::new()
            .text("business_name", "Shop")
            .part("files", image_part("huge.png", vec![0; 600 * 1024], "image/png"))
            .part("files", image_part("ok.png", small_png(1), "image/png"));

        let res = app.post_form(&routes::gallery(business), form).await;

        assert_eq!(res.status, 207, "{}", res.text);
        assert_eq!(res.body["succeeded"].as_array().unwrap().len(), 1);
        let failure = &res.body["failures"][0];
        assert_eq!(failure["item"], "huge.png");
        assert_eq!(failure["code"], "VALIDATION_REJECTED");
        assert!(failure["reason"].as_str().unwrap().contains("the limit is"));
        assert_eq!(app.ctx.store.put_count(), 1);
    }

    #[tokio::test]
    async fn partial_gallery_failure_is_multi_status() {
        let app = TestApp::spawn().await;
        let business = Uuid::now_v7();
        let form = Form::new()
            .text("business_name", "Shop")
            .part("files", image_part("one.png", small_png(1), "image/png"))
            .part("files", image_part("menu.pdf", vec![1, 2, 3], "application/pdf"))
            .part("files", image_part("big.png", noisy_png(200, 120), "image/png"));

        let res = app.post_form(&routes::gallery(business), form).await;

        assert_eq!(res.status, 207, "{}", res.text);
        assert_eq!(res.body["code"], "PARTIAL_BATCH_FAILURE");
        assert_eq!(res.body["succeeded"].as_array().unwrap().len(), 2);
        let failure = &res.body["failures"][0];
        assert_eq!(failure["item"], "menu.pdf");
        assert_eq!(failure["stage"], "validating");
        assert_eq!(failure["code"], "VALIDATION_REJECTED");
        assert_eq!(res.body["listing"]["total"], 2);
        app.ctx.assert_consistent(business).await;
    }

    #[tokio::test]
    async fn complete_gallery_upload_is_ok() {
        let app = TestApp::spawn().await;
        let business = Uuid::now_v7();
        let form = Form::new()
            .text("business_name", "Shop")
            .part("files[]", image_part("a.png", small_png(1), "image/png"))
            .part("files[]", image_part("b.png", small_png(2), "image/png"));

        let res = app.post_form(&routes::gallery(business), form).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert!(res.body["code"].is_null());
        assert!(res.body["failures"].as_array().unwrap().is_empty());

        let listed = app.get(&routes::assets(business)).await;
        assert_eq!(listed.status, 200);
        assert_eq!(listed.body["total"], 2);
        assert!(listed.body["primary_id"].is_null());
        assert_eq!(listed.body["assets"][0]["original_filename"], "a.png");
        assert_eq!(listed.body["assets"][1]["sort_order"], 2);
    }
}

mod management {
    use super::*;

    #[tokio::test]
    async fn promote_swaps_primary() {
        let app = TestApp::spawn().await;
        let business = Uuid::now_v7();
        let logo_id = app.upload_logo(business, "logo.png", small_png(1)).await;
        let form = Form::new()
            .text("business_name", "Shop")
            .part("files", image_part("g.png", small_png(2), "image/png"));
        let gallery = app.post_form(&routes::gallery(business), form).await;
        let gallery_id = gallery.body["succeeded"][0].as_str().unwrap().to_string();

        let res = app
            .post_json(&routes::promote(&gallery_id), &json!({}))
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["primary_id"], gallery_id.as_str());
        assert_eq!(res.body["total"], 1);
        assert!(
            res.body["assets"]
                .as_array()
                .unwrap()
                .iter()
                .all(|a| a["id"] != logo_id.as_str())
        );
    }

    #[tokio::test]
    async fn promote_unknown_asset_is_not_found() {
        let app = TestApp::spawn().await;
        let res = app
            .post_json(&routes::promote(&Uuid::now_v7().to_string()), &json!({}))
            .await;
        assert_eq!(res.status, 404, "{}", res.text);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn alt_text_can_be_edited() {
        let app = TestApp::spawn().await;
        let id = app
            .upload_logo(Uuid::now_v7(), "logo.png", small_png(1))
            .await;

        let res = app
            .patch_json(&routes::asset(&id), &json!({ "alt_text": "  Our sign  " }))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["assets"][0]["alt_text"], "Our sign");

        let res = app
            .patch_json(&routes::asset(&id), &json!({ "alt_text": "x".repeat(501) }))
            .await;
        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn delete_removes_asset_and_bytes() {
        let app = TestApp::spawn().await;
        let business = Uuid::now_v7();
        let id = app.upload_logo(business, "logo.png", small_png(1)).await;

        let res = app
            .client
            .delete(app.url(&routes::asset(&id)))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);

        assert!(app.ctx.rows(business).await.is_empty());
        assert!(app.ctx.stored_keys(business).await.is_empty());
    }

    #[tokio::test]
    async fn bulk_delete_reports_primary_as_failure() {
        let app = TestApp::spawn().await;
        let business = Uuid::now_v7();
        let logo_id = app.upload_logo(business, "logo.png", small_png(1)).await;
        let form = Form::new()
            .text("business_name", "Shop")
            .part("files", image_part("g.png", small_png(2), "image/png"));
        let gallery = app.post_form(&routes::gallery(business), form).await;
        let gallery_id = gallery.body["succeeded"][0].clone();

        let res = app
            .post_json(
                routes::BULK_DELETE,
                &json!({ "asset_ids": [gallery_id, logo_id] }),
            )
            .await;

        assert_eq!(res.status, 207, "{}", res.text);
        assert_eq!(res.body["succeeded"], json!([gallery_id]));
        assert_eq!(res.body["failures"][0]["item"], logo_id.as_str());
        assert_eq!(res.body["listing"]["primary_id"], logo_id.as_str());
    }

    #[tokio::test]
    async fn bulk_delete_rejects_malformed_json() {
        let app = TestApp::spawn().await;
        let res = app
            .client
            .post(app.url(routes::BULK_DELETE))
            .header(header::CONTENT_TYPE, "application/json")
            .body("{\"asset_ids\": [\"not-a-uuid\"]}")
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 400);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn bulk_delete_requires_json_content_type() {
        let app = TestApp::spawn().await;
        let res = app
            .client
            .post(app.url(routes::BULK_DELETE))
            .body("{\"asset_ids\": []}")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400);
    }
}

mod service {
    use super::*;

    #[tokio::test]
    async fn unknown_media_key_is_not_found() {
        let app = TestApp::spawn().await;
        let key = format!("/media/businesses/{}/ghost-abc.png", Uuid::now_v7());

        let res = app.get(&key).await;
        assert_eq!(res.status, 404, "{}", res.text);

        let res = app.get("/media/elsewhere/secret.png").await;
        assert_eq!(res.status, 404, "{}", res.text);
    }

    #[tokio::test]
    async fn orphan_sweep_endpoint_reports_counts() {
        let app = TestApp::spawn().await;
        let business = Uuid::now_v7();
        app.upload_logo(business, "logo.png", small_png(1)).await;

        let res = app
            .post_json(
                &format!("{}?business_id={business}", routes::ORPHAN_SWEEP),
                &json!({}),
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["scanned"], 1);
        assert_eq!(res.body["orphaned"], 0);
        assert_eq!(res.body["deleted"], 0);
    }

    #[tokio::test]
    async fn openapi_document_lists_media_routes() {
        let app = TestApp::spawn().await;
        let res = app.get(routes::OPENAPI).await;

        assert_eq!(res.status, 200);
        let paths = res.body["paths"].as_object().unwrap();
        for path in [
            "/api/v1/businesses/{business_id}/assets",
            "/api/v1/businesses/{business_id}/logo",
            "/api/v1/businesses/{business_id}/gallery",
            "/api/v1/assets/{asset_id}",
            "/api/v1/assets/{asset_id}/promote",
            "/api/v1/assets/bulk-delete",
            "/api/v1/maintenance/orphan-sweep",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
    }
}

use common::storage::ContentHash;
use serde_json::json;

use crate::common::{TestApp, routes};

const NOTES: &[u8] = b"meeting notes: ship on friday";

mod authentication {
    use super::*;

    #[tokio::test]
    async fn listing_requires_a_token() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::FILES).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }

    #[tokio::test]
    async fn forged_token_is_rejected() {
        let app = TestApp::spawn().await;
        let forged = vault_server::utils::jwt::sign("u1", "wrong-secret", chrono::Duration::hours(1))
            .unwrap();

        let res = app.get_with_token(routes::FILES, &forged).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn session_cookie_is_accepted() {
        let app = TestApp::spawn().await;
        let token = app.token_for("u1");

        let res = app.get_with_cookie(routes::FILES, &token).await;

        assert_eq!(res.status, 200, "{}", res.text);
    }
}

mod upload {
    use super::*;

    #[tokio::test]
    async fn direct_upload_creates_a_file() {
        let app = TestApp::spawn().await;
        let token = app.token_for("u1");

        let file = app.upload_file(&token, "notes.txt", NOTES).await;

        assert_eq!(file["filename"], "notes.txt");
        assert_eq!(file["size"], NOTES.len());
        assert_eq!(file["media_type"], "text/plain");
        assert_eq!(file["is_public"], false);
        assert_eq!(file["content_hash"], ContentHash::compute(NOTES).to_hex());
    }

    #[tokio::test]
    async fn second_upload_of_same_bytes_is_a_duplicate() {
        let app = TestApp::spawn().await;
        let token = app.token_for("u1");
        app.upload_file(&token, "notes.txt", NOTES).await;

        let res = app
            .post_with_token(
                routes::UPLOAD_URL,
                &json!({
                    "filename": "notes-copy.txt",
                    "size": NOTES.len(),
                    "content_hash": ContentHash::compute(NOTES).to_hex(),
                }),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["is_duplicate"], true);
        assert!(res.body["upload_url"].is_null());
        assert_eq!(res.body["file"]["filename"], "notes-copy.txt");
        assert_eq!(app.store.object_count(), 1);
    }

    #[tokio::test]
    async fn completing_without_bytes_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.token_for("u1");
        let hash = ContentHash::compute(NOTES);

        let res = app
            .post_with_token(
                routes::COMPLETE,
                &json!({
                    "filename": "notes.txt",
                    "blob_key": hash.blob_key(),
                    "content_hash": hash.to_hex(),
                }),
                &token,
            )
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_error() {
        let app = TestApp::spawn().await;
        let token = app.token_for("u1");

        let res = app
            .post_with_token(routes::UPLOAD_URL, &json!({"filename": 42}), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn over_quota_is_413() {
        let app = TestApp::spawn_with_storage(vault_server::config::StorageConfig {
            default_quota_mb: 1,
            ..Default::default()
        })
        .await;
        let token = app.token_for("u1");

        let res = app
            .post_with_token(
                routes::UPLOAD_URL,
                &json!({
                    "filename": "huge.bin",
                    "size": 2 * 1024 * 1024,
                    "content_hash": ContentHash::compute(b"huge").to_hex(),
                }),
                &token,
            )
            .await;

        assert_eq!(res.status, 413);
        assert_eq!(res.body["code"], "STORAGE_QUOTA_EXCEEDED");
    }
}

mod batch {
    use super::*;

    #[tokio::test]
    async fn prepare_then_complete() {
        let app = TestApp::spawn().await;
        let token = app.token_for("u1");
        app.upload_file(&token, "notes.txt", NOTES).await;
        let fresh = b"fresh bytes";
        let fresh_hash = ContentHash::compute(fresh);

        let prepared = app
            .post_with_token(
                routes::BATCH_PREPARE,
                &json!({"files": [
                    {"filename": "again.txt", "size": NOTES.len(), "content_hash": ContentHash::compute(NOTES).to_hex()},
                    {"filename": "fresh.txt", "size": fresh.len(), "content_hash": fresh_hash.to_hex()},
                ]}),
                &token,
            )
            .await;

        assert_eq!(prepared.status, 200, "{}", prepared.text);
        assert_eq!(prepared.body["items"][0]["status"], "duplicate");
        assert_eq!(prepared.body["items"][1]["status"], "upload_required");
        assert_eq!(prepared.body["quota_check"]["quota_available"], true);
        assert_eq!(prepared.body["quota_check"]["total_size_required"], fresh.len());

        let blob_key = prepared.body["items"][1]["blob_key"].as_str().unwrap();
        app.store.simulate_client_put(blob_key, fresh);

        let completed = app
            .post_with_token(
                routes::BATCH_COMPLETE,
                &json!({
                    "batch_id": prepared.body["batch_id"],
                    "files": [
                        {"filename": "fresh.txt", "blob_key": blob_key, "content_hash": fresh_hash.to_hex()},
                        {"filename": "ghost.txt", "blob_key": ContentHash::compute(b"ghost").blob_key(), "content_hash": ContentHash::compute(b"ghost").to_hex()},
                    ],
                }),
                &token,
            )
            .await;

        assert_eq!(completed.status, 200, "{}", completed.text);
        assert_eq!(completed.body["batch_id"], prepared.body["batch_id"]);
        assert_eq!(completed.body["succeeded"], 1);
        assert_eq!(completed.body["failed"], 1);
        assert_eq!(completed.body["items"][0]["success"], true);
        assert_eq!(completed.body["items"][1]["error_code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.token_for("u1");
        let files: Vec<_> = (0..11)
            .map(|i| {
                let bytes = format!("file {i}");
                json!({
                    "filename": format!("f{i}.txt"),
                    "size": bytes.len(),
                    "content_hash": ContentHash::compute(bytes.as_bytes()).to_hex(),
                })
            })
            .collect();

        let res = app
            .post_with_token(routes::BATCH_PREPARE, &json!({"files": files}), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod manage {
    use super::*;

    #[tokio::test]
    async fn list_get_and_delete() {
        let app = TestApp::spawn().await;
        let token = app.token_for("u1");
        let file = app.upload_file(&token, "notes.txt", NOTES).await;
        let id = file["id"].as_str().unwrap();

        let list = app.get_with_token(routes::FILES, &token).await;
        assert_eq!(list.status, 200, "{}", list.text);
        assert_eq!(list.body["data"].as_array().unwrap().len(), 1);
        assert_eq!(list.body["pagination"]["total"], 1);
        assert_eq!(list.body["has_more"], false);

        let one = app.get_with_token(&routes::file(id), &token).await;
        assert_eq!(one.status, 200);
        assert_eq!(one.id(), id);

        let deleted = app.delete_with_token(&routes::file(id), &token).await;
        assert_eq!(deleted.status, 204);
        assert!(app.store.object_count() == 0);

        let gone = app.get_with_token(&routes::file(id), &token).await;
        assert_eq!(gone.status, 404);
    }

    #[tokio::test]
    async fn other_users_see_not_found() {
        let app = TestApp::spawn().await;
        let owner = app.token_for("owner");
        let other = app.token_for("other");
        let file = app.upload_file(&owner, "notes.txt", NOTES).await;
        let id = file["id"].as_str().unwrap();

        for res in [
            app.get_with_token(&routes::file(id), &other).await,
            app.get_with_token(&routes::file_download(id), &other).await,
            app.delete_with_token(&routes::file(id), &other).await,
        ] {
            assert_eq!(res.status, 404, "{}", res.text);
            assert_eq!(res.body["code"], "NOT_FOUND");
        }
    }

    #[tokio::test]
    async fn bad_page_size_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.token_for("u1");

        let res = app
            .get_with_token(&format!("{}?per_page=500", routes::FILES), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn private_download_is_presigned() {
        let app = TestApp::spawn().await;
        let token = app.token_for("u1");
        let file = app.upload_file(&token, "notes.txt", NOTES).await;

        let res = app
            .get_with_token(&routes::file_download(file["id"].as_str().unwrap()), &token)
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["is_public"], false);
        assert_eq!(res.body["expires_in"], 60);
        assert!(res.body["url"].as_str().unwrap().contains("X-Method=GET"));
    }
}

mod visibility {
    use super::*;

    #[tokio::test]
    async fn toggle_returns_share_link() {
        let app = TestApp::spawn().await;
        let token = app.token_for("u1");
        let file = app.upload_file(&token, "notes.txt", NOTES).await;
        let id = file["id"].as_str().unwrap();

        let private = app.get_with_token(&routes::file_share_link(id), &token).await;
        assert_eq!(private.status, 400);

        let res = app
            .patch_with_token(&routes::file_visibility(id), &json!({}), &token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["is_public"], true);
        let short_id = res.body["share"]["short_id"].as_str().unwrap();
        assert_eq!(res.body["share"]["share_link"], format!("/share/{short_id}"));
        assert_eq!(
            res.body["share"]["share_url"],
            format!("https://vault.test/share/{short_id}")
        );

        let link = app.get_with_token(&routes::file_share_link(id), &token).await;
        assert_eq!(link.status, 200);
        assert_eq!(link.body["short_id"], short_id);

        let back = app
            .patch_with_token(&routes::file_visibility(id), &json!({}), &token)
            .await;
        assert_eq!(back.body["is_public"], false);
        assert!(back.body["share"].is_null());
    }
}
